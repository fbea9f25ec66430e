//! Core support for the dummy audio driver: configuration, the settings
//! registry and logging setup

pub mod config;
pub mod error;
pub mod logging;
pub mod settings;

pub use config::Config;
pub use error::{CoreError, Result};
pub use settings::{ProjectSettings, SettingValue};
