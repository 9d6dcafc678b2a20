//! Path configuration
//!
//! Configurations arrive already validated from the outside world; this
//! module only models them, resolves which one governs a requested name and
//! decides whether a change can be applied to a live path.

pub mod find;
pub mod path;
pub mod reload;

pub use find::{FoundConf, PathConfs};
pub use path::{
    validate_path_name, CameraConf, CameraTuning, PathConf, PathPattern, RecordFormat,
    RtspTransport, SourceKind, ALL_OTHERS,
};
pub use reload::{can_hot_reload, record_changed};
