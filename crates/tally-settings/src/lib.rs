//! # tally-settings
//!
//! Configuration for the tally counter engine, loaded from three layers
//! (in priority order):
//!
//! 1. **Compiled defaults** — [`TallySettings::default()`]
//! 2. **Settings file** — `~/.tally/settings.json` (deep-merged over defaults)
//! 3. **Environment variables** — `TALLY_*` overrides (highest priority)
//!
//! There is no process-wide settings singleton: the binary loads settings
//! once at startup, validates them ([`TallySettings::validate`] — a
//! validation failure is fatal, surfaced before any scheduler starts), and
//! passes the immutable struct into the engine.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{deep_merge, load_settings, load_settings_from_path, settings_path};
pub use types::{ClassifierSettings, CounterMapping, SchedulerSettings, TallySettings};
