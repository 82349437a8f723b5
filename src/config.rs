use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::alert::AlertMode;
use crate::announce::{AnnouncerSettings, DEFAULT_SPEECH_RATE};
use crate::ingest::CameraConfig;
use crate::sampler::DEFAULT_FRAME_INTERVAL;
use crate::session::{DetectorErrorPolicy, SessionKind, SessionSettings};
use crate::storage::DEFAULT_SAVE_DIR;

const DEFAULT_CAMERA_INDEX: u32 = 0;
const DEFAULT_CAMERA_WIDTH: u32 = 640;
const DEFAULT_CAMERA_HEIGHT: u32 = 480;
const DEFAULT_DETECTOR_BACKEND: &str = "tract";
const DEFAULT_MODEL_PATH: &str = "best.onnx";
const DEFAULT_INPUT_SIZE: u32 = 640;
const DEFAULT_MIN_CONFIDENCE: f32 = 0.25;
const DEFAULT_IOU_THRESHOLD: f32 = 0.45;
const DEFAULT_TTS_PROGRAM: &str = "espeak-ng";
const DEFAULT_TTS_ARGS: [&str; 5] = ["-s", "{rate}", "-a", "{amplitude}", "{text}"];
const DEFAULT_SPEECH_VOLUME: f32 = 1.0;

#[derive(Debug, Deserialize, Default)]
struct VisionAlertConfigFile {
    save_dir: Option<PathBuf>,
    sampler: Option<SamplerConfigFile>,
    live: Option<LiveConfigFile>,
    upload: Option<UploadConfigFile>,
    detector: Option<DetectorConfigFile>,
    speech: Option<SpeechConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct SamplerConfigFile {
    interval: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct LiveConfigFile {
    camera_index: Option<u32>,
    device: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    alerts: Option<AlertMode>,
}

#[derive(Debug, Deserialize, Default)]
struct UploadConfigFile {
    alerts: Option<AlertMode>,
}

#[derive(Debug, Deserialize, Default)]
struct DetectorConfigFile {
    backend: Option<String>,
    model_path: Option<PathBuf>,
    input_size: Option<u32>,
    min_confidence: Option<f32>,
    iou_threshold: Option<f32>,
    on_error: Option<DetectorErrorPolicy>,
}

#[derive(Debug, Deserialize, Default)]
struct SpeechConfigFile {
    engine: Option<SpeechEngineKind>,
    program: Option<String>,
    args: Option<Vec<String>>,
    rate: Option<u32>,
    volume: Option<f32>,
    workers: Option<usize>,
    queue_capacity: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct VisionAlertConfig {
    pub save_dir: PathBuf,
    pub frame_interval: u32,
    pub live: LiveSettings,
    pub upload: UploadSettings,
    pub detector: DetectorSettings,
    pub speech: SpeechSettings,
}

#[derive(Debug, Clone)]
pub struct LiveSettings {
    pub camera_index: u32,
    /// Overrides the device derived from `camera_index` (e.g. a `stub://` feed).
    pub device: Option<String>,
    pub width: u32,
    pub height: u32,
    pub mode: AlertMode,
}

#[derive(Debug, Clone)]
pub struct UploadSettings {
    pub mode: AlertMode,
}

#[derive(Debug, Clone)]
pub struct DetectorSettings {
    pub backend: String,
    pub model_path: PathBuf,
    pub input_size: u32,
    pub min_confidence: f32,
    pub iou_threshold: f32,
    pub on_error: DetectorErrorPolicy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpeechEngineKind {
    /// Run an external TTS program.
    Command,
    /// Log announcements instead of speaking them.
    Log,
}

#[derive(Debug, Clone)]
pub struct SpeechSettings {
    pub engine: SpeechEngineKind,
    pub program: String,
    pub args: Vec<String>,
    pub rate: u32,
    pub volume: f32,
    pub workers: usize,
    pub queue_capacity: usize,
}

impl VisionAlertConfig {
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("VISION_ALERT_CONFIG").ok();
        Self::load_from(config_path.as_deref().map(Path::new))
    }

    /// Load from an explicit file (or defaults), then apply env overrides.
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let file_cfg = match path {
            Some(path) => Some(read_config_file(path)?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: VisionAlertConfigFile) -> Self {
        let save_dir = file
            .save_dir
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SAVE_DIR));
        let frame_interval = file
            .sampler
            .and_then(|sampler| sampler.interval)
            .unwrap_or(DEFAULT_FRAME_INTERVAL);
        let live_file = file.live.unwrap_or_default();
        let live = LiveSettings {
            camera_index: live_file.camera_index.unwrap_or(DEFAULT_CAMERA_INDEX),
            device: live_file.device,
            width: live_file.width.unwrap_or(DEFAULT_CAMERA_WIDTH),
            height: live_file.height.unwrap_or(DEFAULT_CAMERA_HEIGHT),
            mode: live_file.alerts.unwrap_or(AlertMode::Unthrottled),
        };
        let upload = UploadSettings {
            mode: file
                .upload
                .and_then(|upload| upload.alerts)
                .unwrap_or_else(AlertMode::throttled),
        };
        let detector_file = file.detector.unwrap_or_default();
        let detector = DetectorSettings {
            backend: detector_file
                .backend
                .unwrap_or_else(|| DEFAULT_DETECTOR_BACKEND.to_string()),
            model_path: detector_file
                .model_path
                .unwrap_or_else(|| PathBuf::from(DEFAULT_MODEL_PATH)),
            input_size: detector_file.input_size.unwrap_or(DEFAULT_INPUT_SIZE),
            min_confidence: detector_file
                .min_confidence
                .unwrap_or(DEFAULT_MIN_CONFIDENCE),
            iou_threshold: detector_file.iou_threshold.unwrap_or(DEFAULT_IOU_THRESHOLD),
            on_error: detector_file.on_error.unwrap_or_default(),
        };
        let speech_file = file.speech.unwrap_or_default();
        let defaults = AnnouncerSettings::default();
        let speech = SpeechSettings {
            engine: speech_file.engine.unwrap_or(SpeechEngineKind::Command),
            program: speech_file
                .program
                .unwrap_or_else(|| DEFAULT_TTS_PROGRAM.to_string()),
            args: speech_file
                .args
                .unwrap_or_else(|| DEFAULT_TTS_ARGS.iter().map(|a| a.to_string()).collect()),
            rate: speech_file.rate.unwrap_or(DEFAULT_SPEECH_RATE),
            volume: speech_file.volume.unwrap_or(DEFAULT_SPEECH_VOLUME),
            workers: speech_file.workers.unwrap_or(defaults.workers),
            queue_capacity: speech_file.queue_capacity.unwrap_or(defaults.queue_capacity),
        };
        Self {
            save_dir,
            frame_interval,
            live,
            upload,
            detector,
            speech,
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(dir) = std::env::var("VISION_ALERT_SAVE_DIR") {
            if !dir.trim().is_empty() {
                self.save_dir = PathBuf::from(dir);
            }
        }
        if let Ok(camera) = std::env::var("VISION_ALERT_CAMERA") {
            self.live.camera_index = camera
                .trim()
                .parse()
                .map_err(|_| anyhow!("VISION_ALERT_CAMERA must be a camera index"))?;
        }
        if let Ok(interval) = std::env::var("VISION_ALERT_FRAME_INTERVAL") {
            self.frame_interval = interval
                .trim()
                .parse()
                .map_err(|_| anyhow!("VISION_ALERT_FRAME_INTERVAL must be an integer"))?;
        }
        if let Ok(threshold) = std::env::var("VISION_ALERT_THRESHOLD") {
            let threshold: f32 = threshold
                .trim()
                .parse()
                .map_err(|_| anyhow!("VISION_ALERT_THRESHOLD must be a number"))?;
            self.upload.mode = AlertMode::Throttled { threshold };
        }
        if let Ok(model) = std::env::var("VISION_ALERT_MODEL") {
            if !model.trim().is_empty() {
                self.detector.model_path = PathBuf::from(model);
            }
        }
        if let Ok(program) = std::env::var("VISION_ALERT_TTS") {
            if !program.trim().is_empty() {
                self.speech.program = program;
            }
        }
        Ok(())
    }

    fn validate(&mut self) -> Result<()> {
        if self.frame_interval == 0 {
            return Err(anyhow!("sampler interval must be >= 1"));
        }
        for (name, mode) in [("live", self.live.mode), ("upload", self.upload.mode)] {
            if let AlertMode::Throttled { threshold } = mode {
                if !(0.0..=1.0).contains(&threshold) {
                    return Err(anyhow!(
                        "{} alert threshold {} outside [0, 1]",
                        name,
                        threshold
                    ));
                }
            }
        }
        if !(0.0..=1.0).contains(&self.detector.min_confidence) {
            return Err(anyhow!("detector min_confidence must be within [0, 1]"));
        }
        if !(0.0..=1.0).contains(&self.detector.iou_threshold) {
            return Err(anyhow!("detector iou_threshold must be within [0, 1]"));
        }
        if self.detector.input_size == 0 {
            return Err(anyhow!("detector input_size must be > 0"));
        }
        if self.speech.workers == 0 {
            return Err(anyhow!("speech workers must be >= 1"));
        }
        if self.speech.queue_capacity == 0 {
            return Err(anyhow!("speech queue_capacity must be >= 1"));
        }
        self.speech.volume = self.speech.volume.clamp(0.0, 1.0);
        self.detector.backend = self.detector.backend.trim().to_lowercase();
        Ok(())
    }

    pub fn session_settings(&self, kind: SessionKind) -> SessionSettings {
        let mode = match kind {
            SessionKind::Live => self.live.mode,
            SessionKind::Upload => self.upload.mode,
        };
        SessionSettings {
            frame_interval: self.frame_interval,
            mode,
            on_detector_error: self.detector.on_error,
        }
    }

    pub fn camera_config(&self) -> CameraConfig {
        let mut camera = CameraConfig::for_index(self.live.camera_index);
        if let Some(device) = &self.live.device {
            camera.device = device.clone();
        }
        camera.width = self.live.width;
        camera.height = self.live.height;
        camera
    }

    pub fn announcer_settings(&self) -> AnnouncerSettings {
        AnnouncerSettings {
            workers: self.speech.workers,
            queue_capacity: self.speech.queue_capacity,
        }
    }
}

impl Default for VisionAlertConfig {
    fn default() -> Self {
        Self::from_file(VisionAlertConfigFile::default())
    }
}

fn read_config_file(path: &Path) -> Result<VisionAlertConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    let cfg = if is_toml {
        toml::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::DEFAULT_ALERT_THRESHOLD;

    #[test]
    fn defaults_follow_reference_deployment() {
        let cfg = VisionAlertConfig::default();
        assert_eq!(cfg.save_dir, PathBuf::from("recorded_videos"));
        assert_eq!(cfg.frame_interval, 5);
        assert_eq!(cfg.live.mode, AlertMode::Unthrottled);
        assert_eq!(
            cfg.upload.mode,
            AlertMode::Throttled {
                threshold: DEFAULT_ALERT_THRESHOLD
            }
        );
        assert_eq!(cfg.camera_config().device, "/dev/video0");
        assert_eq!(cfg.speech.rate, 150);
        assert_eq!(cfg.speech.workers, 1);
        assert_eq!(cfg.detector.on_error, DetectorErrorPolicy::Abort);
    }

    #[test]
    fn device_override_wins_over_index() {
        let mut cfg = VisionAlertConfig::default();
        cfg.live.camera_index = 3;
        assert_eq!(cfg.camera_config().device, "/dev/video3");
        cfg.live.device = Some("stub://dashcam".to_string());
        assert_eq!(cfg.camera_config().device, "stub://dashcam");
    }

    #[test]
    fn validation_rejects_out_of_range_values() {
        let mut cfg = VisionAlertConfig::default();
        cfg.frame_interval = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = VisionAlertConfig::default();
        cfg.upload.mode = AlertMode::Throttled { threshold: 1.5 };
        assert!(cfg.validate().is_err());

        let mut cfg = VisionAlertConfig::default();
        cfg.speech.workers = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn session_settings_pick_mode_per_kind() {
        let cfg = VisionAlertConfig::default();
        assert_eq!(
            cfg.session_settings(SessionKind::Live).mode,
            AlertMode::Unthrottled
        );
        assert_eq!(
            cfg.session_settings(SessionKind::Upload).mode,
            AlertMode::throttled()
        );
    }
}
