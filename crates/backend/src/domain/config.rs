//! Configuration for the PCH manager.
//!
//! Config priority: explicit path > user (~/.config/pchmanager/config.toml) > defaults

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::dirs;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
  #[error("Failed to read config {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
  #[error("Failed to parse config {path}: {source}")]
  Parse {
    path: PathBuf,
    #[source]
    source: toml::de::Error,
  },
}

// ============================================================================
// PCH Configuration
// ============================================================================

/// Precompiled header build settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PchConfig {
  /// Directory the PCH files are written to (default: <cache dir>/pchs)
  pub build_directory: PathBuf,

  /// Directory with headers that are force-included before every PCH
  #[serde(skip_serializing_if = "Option::is_none")]
  pub pre_include_search_path: Option<PathBuf>,

  /// Worker slots for system PCH builds (0 = number of CPUs)
  pub system_slots: usize,

  /// Worker slots for project PCH builds (0 = number of CPUs)
  pub project_slots: usize,
}

impl Default for PchConfig {
  fn default() -> Self {
    Self {
      build_directory: dirs::default_cache_dir().join("pchs"),
      pre_include_search_path: None,
      system_slots: 0,
      project_slots: 0,
    }
  }
}

// ============================================================================
// Queue Configuration
// ============================================================================

/// Actor channel sizing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
  /// Mailbox size of the dispatch actor (default: 256)
  pub message_buffer: usize,

  /// Outbound event channel size (default: 256)
  pub event_buffer: usize,
}

impl Default for QueueConfig {
  fn default() -> Self {
    Self {
      message_buffer: 256,
      event_buffer: 256,
    }
  }
}

// ============================================================================
// Watcher Configuration
// ============================================================================

/// File watcher settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatcherConfig {
  /// Quiet period before a changed file is reported (default: 200)
  pub debounce_ms: u64,

  /// Poll interval for backends without native events (default: 2)
  pub poll_secs: u64,
}

impl Default for WatcherConfig {
  fn default() -> Self {
    Self {
      debounce_ms: 200,
      poll_secs: 2,
    }
  }
}

// ============================================================================
// Storage Configuration
// ============================================================================

/// Header cache store settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
  /// JSON snapshot file; the store stays in memory when unset
  #[serde(skip_serializing_if = "Option::is_none")]
  pub path: Option<PathBuf>,
}

// ============================================================================
// Root Configuration
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
  #[serde(default)]
  pub pch: PchConfig,

  #[serde(default)]
  pub queue: QueueConfig,

  #[serde(default)]
  pub watcher: WatcherConfig,

  #[serde(default)]
  pub storage: StorageConfig,
}

impl Config {
  /// Load config from an explicit path.
  pub fn load(path: &Path) -> Result<Self, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
      path: path.to_path_buf(),
      source,
    })?;

    toml::from_str(&content).map_err(|source| ConfigError::Parse {
      path: path.to_path_buf(),
      source,
    })
  }

  /// Load the user config, falling back to defaults.
  ///
  /// A config file that exists but fails to parse is reported and ignored.
  pub fn load_global() -> Self {
    let Some(path) = Self::user_config_path() else {
      return Self::default();
    };

    if !path.exists() {
      return Self::default();
    }

    match Self::load(&path) {
      Ok(config) => config,
      Err(e) => {
        tracing::warn!(error = %e, "Ignoring invalid config, using defaults");
        Self::default()
      }
    }
  }

  /// Get the user-level config path
  pub fn user_config_path() -> Option<PathBuf> {
    Some(dirs::default_config_dir().join("config.toml"))
  }

  /// Generate a default config file as a string
  pub fn generate_template() -> String {
    let defaults = Self::default();

    format!(
      r#"# PCH manager configuration
# Place in ~/.config/pchmanager/config.toml

# ============================================================================
# Precompiled Headers
# ============================================================================

[pch]
# Directory the PCH files are written to. Files in here that no stored
# record references are deleted when the queue is idle.
build_directory = "{build_directory}"

# Headers force-included before every PCH (uncomment to use):
# pre_include_search_path = "/usr/share/pchmanager/preinclude"

# Worker slots per queue (0 = number of CPUs)
system_slots = {system_slots}
project_slots = {project_slots}

# ============================================================================
# Queue
# ============================================================================

[queue]
message_buffer = {message_buffer}
event_buffer = {event_buffer}

# ============================================================================
# File Watcher
# ============================================================================

[watcher]
debounce_ms = {debounce_ms}
poll_secs = {poll_secs}

# ============================================================================
# Storage
# ============================================================================

[storage]
# Persist PCH records across restarts (uncomment to use):
# path = "{storage_path}"
"#,
      build_directory = defaults.pch.build_directory.display(),
      system_slots = defaults.pch.system_slots,
      project_slots = defaults.pch.project_slots,
      message_buffer = defaults.queue.message_buffer,
      event_buffer = defaults.queue.event_buffer,
      debounce_ms = defaults.watcher.debounce_ms,
      poll_secs = defaults.watcher.poll_secs,
      storage_path = dirs::default_data_dir().join("pch-cache.json").display(),
    )
  }
}

// ============================================================================
// Environment
// ============================================================================

/// Build environment shared by the queue and the dispatched tasks.
///
/// Resolved once from [`Config`] so slot counts are fixed for the lifetime of
/// the schedulers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Environment {
  pub pch_build_directory: PathBuf,
  pub pre_include_search_path: Option<PathBuf>,
  pub system_slots: usize,
  pub project_slots: usize,
}

impl Environment {
  pub fn from_config(config: &Config) -> Self {
    let resolve = |slots: usize| if slots == 0 { num_cpus::get().max(1) } else { slots };

    Self {
      pch_build_directory: config.pch.build_directory.clone(),
      pre_include_search_path: config.pch.pre_include_search_path.clone(),
      system_slots: resolve(config.pch.system_slots),
      project_slots: resolve(config.pch.project_slots),
    }
  }
}
