use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::client::AuthError;
use crate::remote::UserId;

/// Keyring service name for the mirrored session
const KEYRING_SERVICE: &str = "lumen-session";

/// Refresh this many seconds before the access token actually expires
const EXPIRY_MARGIN_SECS: i64 = 60;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// Tokens issued by the auth service for one signed-in user
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    /// Epoch seconds at which the access token expires
    #[serde(default)]
    pub expires_at: Option<i64>,
    pub user: AuthUser,
}

impl Session {
    pub fn user_id(&self) -> UserId {
        UserId::new(self.user.id.clone())
    }

    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(expires_at) => Utc::now().timestamp() + EXPIRY_MARGIN_SECS >= expires_at,
            None => false,
        }
    }
}

/// Persists the current session under the data directory, mirrored to the
/// OS keyring when one is available
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            path: data_dir.join("session.json"),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The stored session: file first, then keyring
    pub fn load(&self) -> Option<Session> {
        if let Ok(data) = fs::read_to_string(&self.path) {
            match serde_json::from_str(&data) {
                Ok(session) => return Some(session),
                Err(e) => log::warn!("Auth: ignoring unreadable session file: {}", e),
            }
        }

        let entry = keyring::Entry::new(KEYRING_SERVICE, &self.account()).ok()?;
        let data = entry.get_password().ok()?;
        serde_json::from_str(&data).ok()
    }

    pub fn save(&self, session: &Session) -> Result<(), AuthError> {
        let data = serde_json::to_string_pretty(session)?;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, &data)?;
        // Restrict permissions on Unix
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let _ = fs::set_permissions(&self.path, fs::Permissions::from_mode(0o600));
        }

        // Also try keyring (best-effort)
        if let Ok(entry) = keyring::Entry::new(KEYRING_SERVICE, &self.account()) {
            let _ = entry.set_password(&data);
        }
        Ok(())
    }

    pub fn clear(&self) -> Result<(), AuthError> {
        if self.path.exists() {
            fs::remove_file(&self.path)?;
        }
        if let Ok(entry) = keyring::Entry::new(KEYRING_SERVICE, &self.account()) {
            let _ = entry.delete_credential();
        }
        Ok(())
    }

    /// One keyring account per data directory
    fn account(&self) -> String {
        self.path.to_string_lossy().to_string()
    }
}
