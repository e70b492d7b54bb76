//! # braid-settings
//!
//! Configuration management with layered sources for the Braid context
//! engine.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults** — [`BraidSettings::default()`]
//! 2. **User file** — `~/.braid/settings.json` (deep-merged over defaults)
//! 3. **Environment variables** — `BRAID_*` overrides (highest priority)
//!
//! All types use camelCase JSON field names and tolerate partial files:
//! missing fields fall back to their defaults during deserialization.
//!
//! # Usage
//!
//! ```no_run
//! use braid_settings::load_settings;
//!
//! let settings = load_settings().unwrap_or_default();
//! println!("context window: {}", settings.budget.context_window);
//! ```

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{deep_merge, load_settings, load_settings_from_path, settings_path};
pub use types::*;
