//! Build configuration
//!
//! One flat `BuildConfig` with defaults suitable for Windows sandbox traces.
//! It can be loaded from a versioned YAML file:
//!
//! ```yaml
//! version: 1
//! system_directory: 'C:\Windows\SysWOW64'
//! data_preview_len: 32
//! ```

pub mod build_config;
pub mod error;

pub use build_config::{BuildConfig, BuildConfigV1, MAX_DATA_PREVIEW, SUPPORTED_VERSIONS};
pub use error::{ConfigError, ConfigResult};
