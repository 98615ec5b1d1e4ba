//! Persistent key-value storage.
//!
//! One JSON file per key in the platform-appropriate config directory:
//! - Linux: `~/.config/vicino/`
//! - macOS: `~/Library/Application Support/vicino/`
//! - Windows: `%APPDATA%\vicino\`

use std::path::PathBuf;

use serde::{de::DeserializeOwned, Serialize};

/// File-backed key-value store.
#[derive(Debug, Clone)]
pub struct Storage {
    root: Option<PathBuf>,
}

impl Storage {
    /// Storage rooted at the platform config directory.
    pub fn new() -> Self {
        Self {
            root: dirs::config_dir().map(|dir| dir.join("vicino")),
        }
    }

    /// Storage rooted at an explicit directory.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
        }
    }

    /// Save a value under a key.
    ///
    /// Returns `true` if the operation succeeded.
    pub fn save<T: Serialize>(&self, key: &str, value: &T) -> bool {
        let Some(path) = self.file_path(key) else {
            return false;
        };
        match serde_json::to_string(value) {
            Ok(json) => std::fs::write(path, json).is_ok(),
            Err(_) => false,
        }
    }

    /// Load a value by key.
    ///
    /// Returns `None` if the key doesn't exist or deserialization fails.
    pub fn load<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let path = self.file_path(key)?;
        let json = std::fs::read_to_string(path).ok()?;
        serde_json::from_str(&json).ok()
    }

    /// Remove a value by key.
    pub fn remove(&self, key: &str) {
        if let Some(path) = self.file_path(key) {
            let _ = std::fs::remove_file(path);
        }
    }

    /// Check if a key exists.
    pub fn exists(&self, key: &str) -> bool {
        self.file_path(key)
            .map(|path| path.exists())
            .unwrap_or(false)
    }

    fn file_path(&self, key: &str) -> Option<PathBuf> {
        let root = self.root.as_ref()?;
        if !root.exists() {
            std::fs::create_dir_all(root).ok()?;
        }
        // Sanitize key to be a valid filename
        let safe_key = key.replace(['/', '\\', ':', '*', '?', '"', '<', '>', '|'], "_");
        Some(root.join(format!("{}.json", safe_key)))
    }
}

impl Default for Storage {
    fn default() -> Self {
        Self::new()
    }
}
