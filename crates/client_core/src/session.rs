//! Session token state and its on-disk persistence.
//!
//! The token is the only thing the client persists. Its absence means the
//! caches are logically empty and neither periodic process may run.

use std::{
    fs,
    io,
    path::{Path, PathBuf},
};

use tracing::warn;

#[derive(Debug, Clone, Default)]
pub struct Session {
    pub token: Option<String>,
}

impl Session {
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
        }
    }

    pub fn is_active(&self) -> bool {
        self.token.is_some()
    }
}

/// File-backed token persistence so a login survives restarts.
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `$CONFIG_DIR/cuidamed/token`, or `None` when the platform exposes no
    /// config directory.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("cuidamed").join("token"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Option<String> {
        match fs::read_to_string(&self.path) {
            Ok(raw) => {
                let token = raw.trim().to_string();
                if token.is_empty() {
                    None
                } else {
                    Some(token)
                }
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => None,
            Err(err) => {
                warn!(path = %self.path.display(), "failed to read token store: {err}");
                None
            }
        }
    }

    pub fn save(&self, token: &str) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, token)
    }

    pub fn clear(&self) {
        match fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => warn!(path = %self.path.display(), "failed to clear token store: {err}"),
        }
    }
}
