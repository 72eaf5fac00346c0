//! Application directory paths.
//!
//! Uses the [`dirs`] crate for platform-appropriate resolution.
//!
//! | Purpose | macOS | Linux |
//! |---------|-------|-------|
//! | Config | `~/Library/Application Support/parlance/` | `~/.config/parlance/` |
//!
//! Set `PARLANCE_CONFIG_DIR` to override [`config_dir`] for tests or custom
//! deployments.

use std::path::PathBuf;

/// Environment variable overriding [`config_dir`].
pub const CONFIG_DIR_ENV: &str = "PARLANCE_CONFIG_DIR";

/// Application config directory.
///
/// Resolves to `dirs::config_dir()/parlance/` by default.
#[must_use]
pub fn config_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os(CONFIG_DIR_ENV) {
        return PathBuf::from(override_dir);
    }
    dirs::config_dir()
        .map(|d| d.join("parlance"))
        .unwrap_or_else(|| PathBuf::from("/tmp/parlance-config"))
}

/// Default configuration file (`config_dir()/config.toml`).
#[must_use]
pub fn config_file() -> PathBuf {
    config_dir().join("config.toml")
}
