//! # sift-settings
//!
//! Layered configuration for sift.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`SiftSettings::default()`]
//! 2. **User file**: `~/.sift/settings.json` (deep-merged over defaults)
//! 3. **Environment variables**: `SIFT_*` overrides (highest priority)
//!
//! The engine never reads settings itself; the binary converts them into
//! explicit pipeline parameters.
//!
//! # Usage
//!
//! ```no_run
//! let settings = sift_settings::load_settings().unwrap_or_default();
//! println!("chunking above {} chars", settings.chunking.activation_threshold);
//! ```

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{deep_merge, load_settings, load_settings_from_path, load_with_env, settings_path};
pub use types::*;
