//! Client-local state that survives restarts: theme, currency, recent
//! searches and saved trips.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::preferences::Currency;

pub const MAX_RECENT_QUERIES: usize = 10;
pub const RECENT_QUERIES_SHOWN: usize = 5;
pub const RECENT_LABEL_CHARS: usize = 40;
pub const MAX_SAVED_TRIPS: usize = 20;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Could not determine config directory")]
    NoConfigDir,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Dark,
    Light,
}

impl Theme {
    pub fn toggled(&self) -> Self {
        match self {
            Theme::Dark => Theme::Light,
            Theme::Light => Theme::Dark,
        }
    }
}

/// A trip the user bookmarked from the chat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedTrip {
    pub title: String,
    pub summary: String,
    pub saved_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientState {
    pub theme: Theme,
    pub currency: Currency,
    recent_queries: Vec<String>,
    saved_trips: Vec<SavedTrip>,
}

impl ClientState {
    pub fn get_state_path() -> Result<PathBuf, StoreError> {
        let config_dir = dirs::config_dir().ok_or(StoreError::NoConfigDir)?;
        Ok(config_dir.join("tripchat").join("state.json"))
    }

    /// Load from the default location. Missing or unreadable files give the
    /// defaults.
    pub fn load() -> Self {
        match Self::get_state_path() {
            Ok(path) => Self::load_from(&path),
            Err(e) => {
                tracing::warn!("{}", e);
                Self::default()
            }
        }
    }

    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        let parsed = fs::read_to_string(path)
            .map_err(StoreError::from)
            .and_then(|content| serde_json::from_str(&content).map_err(StoreError::from));
        match parsed {
            Ok(state) => state,
            Err(e) => {
                tracing::warn!(path = %path.display(), "ignoring unreadable client state: {}", e);
                Self::default()
            }
        }
    }

    pub fn save(&self) -> Result<(), StoreError> {
        self.save_to(&Self::get_state_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), StoreError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Most recent first, without duplicates.
    pub fn recent_queries(&self) -> &[String] {
        &self.recent_queries
    }

    pub fn record_query(&mut self, query: &str) {
        let query = query.trim();
        if query.is_empty() {
            return;
        }
        self.recent_queries.retain(|q| q != query);
        self.recent_queries.insert(0, query.to_string());
        self.recent_queries.truncate(MAX_RECENT_QUERIES);
    }

    pub fn clear_history(&mut self) {
        self.recent_queries.clear();
    }

    /// Labels for the recent-search list, truncated for display.
    pub fn recent_labels(&self) -> Vec<String> {
        self.recent_queries
            .iter()
            .take(RECENT_QUERIES_SHOWN)
            .map(|q| {
                if q.chars().count() > RECENT_LABEL_CHARS {
                    let head: String = q.chars().take(RECENT_LABEL_CHARS).collect();
                    format!("{}...", head)
                } else {
                    q.clone()
                }
            })
            .collect()
    }

    pub fn saved_trips(&self) -> &[SavedTrip] {
        &self.saved_trips
    }

    pub fn save_trip(&mut self, title: impl Into<String>, summary: impl Into<String>) {
        self.saved_trips.insert(
            0,
            SavedTrip {
                title: title.into(),
                summary: summary.into(),
                saved_at: Utc::now(),
            },
        );
        self.saved_trips.truncate(MAX_SAVED_TRIPS);
    }

    pub fn remove_trip(&mut self, index: usize) -> Option<SavedTrip> {
        (index < self.saved_trips.len()).then(|| self.saved_trips.remove(index))
    }
}
