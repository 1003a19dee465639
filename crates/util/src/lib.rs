//! Shared helpers for the flowref binaries: settings loading and path handling.

mod path_processing;
pub mod settings;

pub use path_processing::{expand_tilde, resolve_against};
pub use settings::{SETTINGS_PATH_ENV, Settings, SettingsError, default_settings_path};
