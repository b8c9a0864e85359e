//! Persisted viewer preferences (theme, font size).
//!
//! A plain key-value file, read once at construction and written through
//! on every change. Writes are user-initiated and synchronous, so there
//! are no concurrent writers to reconcile.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use tracing::warn;

use crate::error::SessionError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerPrefs {
    pub terminal_theme: String,
    pub terminal_font_size: u8,
    pub log_theme: String,
    pub log_font_size: u8,
}

impl Default for ViewerPrefs {
    fn default() -> Self {
        Self {
            terminal_theme: "dark".to_string(),
            terminal_font_size: 14,
            log_theme: "dark".to_string(),
            log_font_size: 12,
        }
    }
}

pub struct PrefsStore {
    path: PathBuf,
    prefs: ViewerPrefs,
}

impl PrefsStore {
    /// Load preferences from `path`. A missing or unreadable file falls
    /// back to defaults; preferences must never block a session mount.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let prefs = match fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str(&raw) {
                Ok(prefs) => prefs,
                Err(e) => {
                    warn!(?path, error = %e, "malformed preference file, using defaults");
                    ViewerPrefs::default()
                }
            },
            Err(_) => ViewerPrefs::default(),
        };
        Self { path, prefs }
    }

    pub fn get(&self) -> &ViewerPrefs {
        &self.prefs
    }

    /// Mutate and write through.
    pub fn update(
        &mut self,
        apply: impl FnOnce(&mut ViewerPrefs),
    ) -> Result<(), SessionError> {
        apply(&mut self.prefs);
        let raw = serde_json::to_string_pretty(&self.prefs)?;
        fs::write(&self.path, raw)?;
        Ok(())
    }
}
