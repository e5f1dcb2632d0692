use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// Outcome of the most recent remote-affecting operation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SyncState {
    /// Last remote operation succeeded
    Synced,
    /// A remote operation is in flight
    Syncing,
    /// The backend was unreachable at initialization
    Offline,
    /// Last remote operation failed
    Error,
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Synced => "synced",
            Self::Syncing => "syncing",
            Self::Offline => "offline",
            Self::Error => "error",
        };
        f.write_str(label)
    }
}

/// Snapshot of the sync indicator
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
    pub status: SyncState,
    /// When the indicator last resolved to `synced`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_sync: Option<DateTime<Utc>>,
    /// Message of the last failure, cleared on success
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Default for SyncStatus {
    fn default() -> Self {
        Self {
            status: SyncState::Syncing,
            last_sync: None,
            error: None,
        }
    }
}

/// Owner of the sync indicator. Every change is published to watchers.
pub struct SyncStatusTracker {
    tx: watch::Sender<SyncStatus>,
}

impl SyncStatusTracker {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(SyncStatus::default());
        Self { tx }
    }

    pub fn state(&self) -> SyncState {
        self.tx.borrow().status
    }

    pub fn snapshot(&self) -> SyncStatus {
        self.tx.borrow().clone()
    }

    /// Receiver that observes every subsequent status change
    pub fn watch(&self) -> watch::Receiver<SyncStatus> {
        self.tx.subscribe()
    }

    /// A remote operation is starting
    pub fn begin(&self) {
        self.tx.send_modify(|s| s.status = SyncState::Syncing);
    }

    pub fn succeed(&self) {
        self.tx.send_modify(|s| {
            s.status = SyncState::Synced;
            s.last_sync = Some(Utc::now());
            s.error = None;
        });
    }

    pub fn fail(&self, message: impl Into<String>) {
        let message = message.into();
        log::warn!("Sync: {}", message);
        self.tx.send_modify(|s| {
            s.status = SyncState::Error;
            s.error = Some(message);
        });
    }

    pub fn offline(&self) {
        self.tx.send_modify(|s| {
            s.status = SyncState::Offline;
            s.error = None;
        });
    }
}

impl Default for SyncStatusTracker {
    fn default() -> Self {
        Self::new()
    }
}
