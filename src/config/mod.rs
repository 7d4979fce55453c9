//! Configuration module for sidecopy
//!
//! - Platform-aware path resolution for the settings file
//! - User settings persistence (backup root, retention, identity mode)

pub mod paths;
pub mod settings;

pub use paths::SidecopyPaths;
pub use settings::Settings;
