//! Default locations for configuration, the header cache snapshot and built
//! PCH files.
//!
//! Each lookup honours an explicit override variable first, then the matching
//! XDG variable, then the platform default from the `dirs` crate.

use std::path::PathBuf;

const APP_DIR: &str = "pchmanager";

/// Base path for persistent data such as the header cache snapshot.
///
/// Precedence: `DATA_DIR`, `XDG_DATA_HOME`, `dirs::data_local_dir()`.
pub fn default_data_dir() -> PathBuf {
  resolve(Some("DATA_DIR"), "XDG_DATA_HOME", dirs::data_local_dir)
}

/// Directory holding `config.toml`.
///
/// Precedence: `CONFIG_DIR`, `XDG_CONFIG_HOME`, `dirs::config_dir()`.
pub fn default_config_dir() -> PathBuf {
  resolve(Some("CONFIG_DIR"), "XDG_CONFIG_HOME", dirs::config_dir)
}

/// Parent of the default PCH build directory.
///
/// Precedence: `XDG_CACHE_HOME`, `dirs::cache_dir()`.
pub fn default_cache_dir() -> PathBuf {
  resolve(None, "XDG_CACHE_HOME", dirs::cache_dir)
}

fn resolve(override_var: Option<&str>, xdg_var: &str, platform: fn() -> Option<PathBuf>) -> PathBuf {
  // The override names the final directory, no app suffix
  if let Some(dir) = override_var.and_then(|var| std::env::var_os(var)) {
    return PathBuf::from(dir);
  }

  let base = std::env::var_os(xdg_var)
    .map(PathBuf::from)
    .or_else(platform)
    .unwrap_or_else(|| PathBuf::from("."));
  base.join(APP_DIR)
}
