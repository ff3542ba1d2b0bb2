//! Message store configuration for the built-in backends.

use serde::{Deserialize, Serialize};

/// Top-level storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Root directory for all runtime data.
    #[serde(default = "default_data_root")]
    pub data_root: String,
    /// Maildir message store configuration.
    #[serde(default)]
    pub maildir: MaildirConfig,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_root: default_data_root(),
            maildir: MaildirConfig::default(),
        }
    }
}

/// Maildir-style filesystem store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaildirConfig {
    /// Root path for per-account mail directories.
    #[serde(default = "default_maildir_root")]
    pub root_path: String,
}

impl Default for MaildirConfig {
    fn default() -> Self {
        Self {
            root_path: default_maildir_root(),
        }
    }
}

fn default_data_root() -> String {
    "./data".to_string()
}

fn default_maildir_root() -> String {
    "./data/mail".to_string()
}
