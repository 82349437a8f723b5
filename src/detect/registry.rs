use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};

use crate::detect::result::Detection;
use crate::frame::FrameView;

use super::backend::DetectorBackend;

/// Registry of detector backends keyed by name.
///
/// Backends are wrapped in `Mutex` because `DetectorBackend::detect` takes `&mut self`.
pub struct BackendRegistry {
    backends: HashMap<String, Arc<Mutex<dyn DetectorBackend>>>,
    default_name: Option<String>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self {
            backends: HashMap::new(),
            default_name: None,
        }
    }

    /// Register a backend. The first registered backend becomes the default.
    pub fn register<B: DetectorBackend + 'static>(&mut self, backend: B) {
        let name = backend.name().to_string();
        if self.default_name.is_none() {
            self.default_name = Some(name.clone());
        }
        self.backends.insert(name, Arc::new(Mutex::new(backend)));
    }

    /// Set default backend by name.
    pub fn set_default(&mut self, name: &str) -> Result<()> {
        if !self.backends.contains_key(name) {
            return Err(anyhow!("backend '{}' not registered", name));
        }
        self.default_name = Some(name.to_string());
        Ok(())
    }

    /// Get a handle to a backend by name.
    pub fn get(&self, name: &str) -> Option<SharedBackend> {
        self.backends.get(name).cloned().map(SharedBackend)
    }

    /// Get the default backend.
    pub fn default_backend(&self) -> Option<SharedBackend> {
        self.default_name.as_ref().and_then(|name| self.get(name))
    }

    /// Resolve a backend by name, falling back to the default when `name` is `None`.
    pub fn select(&self, name: Option<&str>) -> Result<SharedBackend> {
        match name {
            Some(name) => self
                .get(name)
                .ok_or_else(|| anyhow!("backend '{}' not registered", name)),
            None => self
                .default_backend()
                .ok_or_else(|| anyhow!("no detector backend registered")),
        }
    }

    /// List registered backends, sorted by name.
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.backends.keys().cloned().collect();
        names.sort();
        names
    }
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Cloneable handle to a registered backend. Usable anywhere a backend is.
#[derive(Clone)]
pub struct SharedBackend(Arc<Mutex<dyn DetectorBackend>>);

impl DetectorBackend for SharedBackend {
    fn name(&self) -> &'static str {
        match self.0.lock() {
            Ok(guard) => guard.name(),
            Err(poisoned) => poisoned.into_inner().name(),
        }
    }

    fn detect(&mut self, frame: FrameView<'_>) -> Result<Vec<Detection>> {
        let mut guard = self
            .0
            .lock()
            .map_err(|_| anyhow!("backend lock poisoned"))?;
        guard.detect(frame)
    }

    fn warm_up(&mut self) -> Result<()> {
        let mut guard = self
            .0
            .lock()
            .map_err(|_| anyhow!("backend lock poisoned"))?;
        guard.warm_up()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::ScriptedBackend;
    use crate::frame::Frame;

    #[test]
    fn first_registered_backend_is_default() {
        let mut registry = BackendRegistry::new();
        registry.register(ScriptedBackend::new(vec![]));
        assert_eq!(registry.list(), vec!["scripted".to_string()]);
        let backend = registry.select(None).unwrap();
        assert_eq!(backend.name(), "scripted");
    }

    #[test]
    fn unknown_backend_is_an_error() {
        let mut registry = BackendRegistry::new();
        assert!(registry.select(None).is_err());
        registry.register(ScriptedBackend::new(vec![]));
        assert!(registry.select(Some("tract")).is_err());
        assert!(registry.set_default("tract").is_err());
    }

    #[test]
    fn shared_handle_runs_detection() {
        let mut registry = BackendRegistry::new();
        registry.register(ScriptedBackend::demo());
        let mut backend = registry.select(Some("scripted")).unwrap();
        let frame = Frame::filled(8, 8, 0, [0, 0, 0]).unwrap();
        let detections = backend.detect(frame.view()).unwrap();
        assert!(!detections.is_empty());
    }
}
