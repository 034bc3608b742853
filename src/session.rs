use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use uuid::Uuid;

use crate::config::Config;

/// Client-persisted session correlating a sequence of queries. The thread id
/// is opaque to us; the endpoint uses it for contextual continuity when
/// `context_enabled` is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub thread_id: String,
    pub context_enabled: bool,
    pub created_at: DateTime<Utc>,
}

impl Session {
    fn create(context_enabled: bool) -> Self {
        Self {
            thread_id: Uuid::new_v4().to_string(),
            context_enabled,
            created_at: Utc::now(),
        }
    }
}

/// Disk-backed store for the session identifier, one JSON file under the
/// palaver home. Stands in for the original client's browser local storage.
pub struct SessionStore {
    path: PathBuf,
    default_context_enabled: bool,
}

impl SessionStore {
    pub fn new(config: &Config) -> Self {
        Self {
            path: config.session_path(),
            default_context_enabled: config.default_context_enabled,
        }
    }

    /// Return the persisted session, creating one on first run. A corrupt or
    /// unreadable session file is replaced with a fresh session rather than
    /// surfaced as an error.
    pub fn load_or_create(&self) -> Result<Session> {
        if let Ok(content) = fs::read_to_string(&self.path) {
            if let Ok(session) = serde_json::from_str::<Session>(&content) {
                return Ok(session);
            }
        }

        let session = Session::create(self.default_context_enabled);
        self.save(&session)?;
        Ok(session)
    }

    /// Mint a new thread id, dropping whatever continuity the endpoint held
    /// for the previous one.
    pub fn reset(&self) -> Result<Session> {
        let previous_context = self
            .load_or_create()
            .map(|s| s.context_enabled)
            .unwrap_or(self.default_context_enabled);
        let session = Session::create(previous_context);
        self.save(&session)?;
        Ok(session)
    }

    /// Persist the context toggle on the current session.
    pub fn set_context_enabled(&self, session: &mut Session, enabled: bool) -> Result<()> {
        session.context_enabled = enabled;
        self.save(session)
    }

    pub fn save(&self, session: &Session) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).context("Failed to create palaver home directory")?;
        }
        let content =
            serde_json::to_string_pretty(session).context("Failed to serialize session")?;
        fs::write(&self.path, content).context("Failed to write session file")?;
        Ok(())
    }
}
