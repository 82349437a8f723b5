mod backend;
mod backends;
mod registry;
mod result;

pub use backend::DetectorBackend;
pub use backends::ScriptedBackend;
#[cfg(feature = "backend-tract")]
pub use backends::{TractBackend, TractSettings};
pub use registry::{BackendRegistry, SharedBackend};
pub use result::{round_confidence_up, BoundingBox, Detection};
