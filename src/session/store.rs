//! JSON-file persistence for the session list.
//!
//! The whole list is one serialized value.  Reading never fails: an absent,
//! unreadable or corrupt file yields an empty list.  Writes go to a temp
//! file first and are renamed into place.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use uuid::Uuid;

use super::ChatSession;

/// Errors raised while saving the session list.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to serialize sessions: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// In-memory session list backed by a JSON file.
#[derive(Debug)]
pub struct SessionStore {
    path: PathBuf,
    sessions: Vec<ChatSession>,
}

impl SessionStore {
    /// Load the list stored at `path`, or start empty.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut sessions = read_sessions(&path);
        sessions.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        log::debug!("session store: loaded {} sessions", sessions.len());
        Self { path, sessions }
    }

    /// Write the full list back to disk.
    pub fn save(&self) -> Result<(), SessionError> {
        let io_err = |source| SessionError::Io {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let bytes = serde_json::to_vec_pretty(&self.sessions)?;
        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, bytes).map_err(io_err)?;
        fs::rename(&tmp_path, &self.path).map_err(io_err)?;
        Ok(())
    }

    /// Sessions, most recently updated first.
    pub fn sessions(&self) -> &[ChatSession] {
        &self.sessions
    }

    pub fn get(&self, id: Uuid) -> Option<&ChatSession> {
        self.sessions.iter().find(|s| s.id == id)
    }

    /// Insert or replace `session` and move it to the front.
    pub fn upsert(&mut self, session: ChatSession) {
        self.sessions.retain(|s| s.id != session.id);
        self.sessions.insert(0, session);
    }

    /// Remove a session.  Returns `false` when the id was unknown.
    pub fn delete(&mut self, id: Uuid) -> bool {
        let before = self.sessions.len();
        self.sessions.retain(|s| s.id != id);
        self.sessions.len() != before
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn read_sessions(path: &Path) -> Vec<ChatSession> {
    let data = match fs::read(path) {
        Ok(data) => data,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Vec::new(),
        Err(e) => {
            log::warn!("session store: cannot read {}: {e}", path.display());
            return Vec::new();
        }
    };
    serde_json::from_slice(&data).unwrap_or_else(|e| {
        log::warn!("session store: ignoring corrupt {}: {e}", path.display());
        Vec::new()
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
