use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

/// The authenticated identity for this session: who the user is and the
/// bearer token the API calls carry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Session {
    pub username: String,
    pub token: String,
}

/// Durable storage for the session. One JSON file under the user's
/// config directory, written atomically and deleted on logout. This is
/// the only place the credentials live; there is no ambient global.
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    /// Restore-on-startup. A missing file means no session; a file that
    /// no longer parses is treated the same way rather than blocking the
    /// user (they simply log in again).
    #[tracing::instrument(skip(self))]
    pub fn restore(&self) -> anyhow::Result<Option<Session>> {
        if !self.path.exists() {
            debug!(file = %self.path.display(), "no persisted session");
            return Ok(None);
        }

        let raw = fs::read_to_string(&self.path)
            .with_context(|| format!("failed reading {}", self.path.display()))?;

        match serde_json::from_str::<Session>(&raw) {
            Ok(session) => {
                info!(username = %session.username, "restored session");
                Ok(Some(session))
            }
            Err(err) => {
                warn!(
                    file = %self.path.display(),
                    error = %err,
                    "persisted session unreadable; ignoring it"
                );
                Ok(None)
            }
        }
    }

    #[tracing::instrument(skip(self, session), fields(username = %session.username))]
    pub fn login(&self, session: &Session) -> anyhow::Result<()> {
        let dir = self
            .path
            .parent()
            .ok_or_else(|| anyhow!("session path has no parent directory"))?;
        fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;

        let mut temp = NamedTempFile::new_in(dir)?;
        let serialized = serde_json::to_string(session)?;
        writeln!(temp, "{serialized}")?;
        temp.flush()?;
        temp.persist(&self.path)
            .map_err(|err| anyhow!("failed to persist {}: {}", self.path.display(), err))?;

        info!(file = %self.path.display(), "session saved");
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    pub fn logout(&self) -> anyhow::Result<()> {
        if self.path.exists() {
            fs::remove_file(&self.path)
                .with_context(|| format!("failed removing {}", self.path.display()))?;
            info!(file = %self.path.display(), "session cleared");
        } else {
            debug!("logout with no persisted session");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::{Session, SessionStore};

    #[test]
    fn login_restore_logout_roundtrip() {
        let temp = tempdir().expect("tempdir");
        let store = SessionStore::new(&temp.path().join("session.json"));

        assert_eq!(store.restore().expect("restore empty"), None);

        let session = Session {
            username: "alice".to_string(),
            token: "tok-123".to_string(),
        };
        store.login(&session).expect("save session");
        assert_eq!(store.restore().expect("restore"), Some(session));

        store.logout().expect("logout");
        assert_eq!(store.restore().expect("restore after logout"), None);
    }

    #[test]
    fn corrupt_session_file_is_ignored() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("session.json");
        std::fs::write(&path, "not json").expect("write garbage");

        let store = SessionStore::new(&path);
        assert_eq!(store.restore().expect("restore"), None);
    }

    #[test]
    fn login_creates_missing_directories() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("nested").join("dir").join("session.json");
        let store = SessionStore::new(&path);

        let session = Session {
            username: "bob".to_string(),
            token: "tok-456".to_string(),
        };
        store.login(&session).expect("save session");
        assert_eq!(store.restore().expect("restore"), Some(session));
    }
}
