use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::models::UserSummary;

/// Current credentials. A reload restores the token only; the user summary
/// has to be fetched again by whoever needs it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub token: Option<String>,
    pub user: Option<UserSummary>,
}

/// On-disk form of the session: a single `token` key.
#[derive(Serialize, Deserialize)]
struct PersistedToken {
    token: String,
}

/// Handle to one session. Clones share state; separately constructed stores
/// never do.
#[derive(Clone, Default)]
pub struct SessionStore {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    session: RwLock<Session>,
    path: Option<PathBuf>,
}

impl SessionStore {
    /// Store that lives only as long as the process.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Store mirrored to `path`. An existing file restores the token.
    pub fn persistent(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let token = load_token(&path);
        if token.is_some() {
            tracing::debug!("Restored session token from {}", path.display());
        }
        Self {
            inner: Arc::new(Inner {
                session: RwLock::new(Session { token, user: None }),
                path: Some(path),
            }),
        }
    }

    pub fn token(&self) -> Option<String> {
        self.read().token.clone()
    }

    pub fn user(&self) -> Option<UserSummary> {
        self.read().user.clone()
    }

    pub fn snapshot(&self) -> Session {
        self.read().clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.read().token.is_some()
    }

    /// Commit credentials from a successful login or registration.
    pub fn set_session(&self, token: impl Into<String>, user: UserSummary) {
        let token = token.into();
        let mut session = self.write();
        self.persist(Some(&token));
        *session = Session {
            token: Some(token),
            user: Some(user),
        };
        tracing::info!(user_id = session.user.as_ref().map(|u| u.id), "Session established");
    }

    /// Swap in a refreshed token, keeping the user summary.
    pub fn replace_token(&self, token: impl Into<String>) {
        let token = token.into();
        let mut session = self.write();
        self.persist(Some(&token));
        session.token = Some(token);
        tracing::debug!("Session token replaced");
    }

    /// Drop the session. Returns `false` when there was nothing to clear.
    pub fn clear(&self) -> bool {
        let mut session = self.write();
        if session.token.is_none() && session.user.is_none() {
            return false;
        }
        self.persist(None);
        *session = Session::default();
        tracing::info!("Session cleared");
        true
    }

    fn read(&self) -> RwLockReadGuard<'_, Session> {
        self.inner
            .session
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Session> {
        self.inner
            .session
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Mirror the token to disk. Called with the write lock held so the file
    /// never lags behind a newer in-memory value.
    fn persist(&self, token: Option<&str>) {
        let Some(path) = self.inner.path.as_deref() else {
            return;
        };
        let result = match token {
            Some(token) => write_token(path, token),
            None => match fs::remove_file(path) {
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                other => other.map_err(anyhow::Error::from),
            },
        };
        if let Err(e) = result {
            tracing::warn!("Failed to persist session to {}: {}", path.display(), e);
        }
    }
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("authenticated", &self.is_authenticated())
            .field("path", &self.inner.path)
            .finish()
    }
}

fn load_token(path: &Path) -> Option<String> {
    let json = fs::read_to_string(path).ok()?;
    match serde_json::from_str::<PersistedToken>(&json) {
        Ok(persisted) if !persisted.token.is_empty() => Some(persisted.token),
        Ok(_) => None,
        Err(e) => {
            tracing::warn!("Ignoring unreadable session file {}: {}", path.display(), e);
            None
        }
    }
}

fn write_token(path: &Path, token: &str) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(&PersistedToken {
        token: token.to_string(),
    })?;
    fs::write(path, json)?;
    Ok(())
}
