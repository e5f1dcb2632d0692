//! The hosted note store the reconciler syncs against.

pub mod memory;
pub mod realtime;
pub mod supabase;

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::notes::{Note, NoteDraft};

pub use memory::MemoryNoteStore;
pub use supabase::SupabaseNoteStore;

#[derive(Error, Debug)]
pub enum RemoteError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Authentication failed")]
    AuthFailed,
    #[error("Server error: {status} - {message}")]
    Server { status: u16, message: String },
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),
    #[error("Remote store unavailable: {0}")]
    Unavailable(String),
}

/// Opaque identifier of the authenticated user that scopes every remote call
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Notification that some row of the user's collection changed. Carries no
/// payload: receivers refetch the full collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangeSignal;

/// Capacity of the signal channel handed to subscribers
pub const SIGNAL_BUFFER: usize = 16;

/// Handle that tears a realtime subscription down on `shutdown` or drop
pub struct SubscriptionHandle {
    shutdown_tx: mpsc::Sender<()>,
}

impl SubscriptionHandle {
    pub fn new(shutdown_tx: mpsc::Sender<()>) -> Self {
        Self { shutdown_tx }
    }

    /// Signal the subscription to stop delivering
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.try_send(());
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// A live realtime subscription: the signals and the handle that ends them
pub struct Subscription {
    pub signals: mpsc::Receiver<ChangeSignal>,
    pub handle: SubscriptionHandle,
}

/// CRUD + realtime API of the hosted note store, scoped per user
#[async_trait]
pub trait RemoteNoteStore: Send + Sync {
    /// Full collection for the user, newest `created_at` first
    async fn fetch_all(&self, user: &UserId) -> Result<Vec<Note>, RemoteError>;

    /// Create a note; the server assigns id and timestamps
    async fn create(&self, user: &UserId, draft: &NoteDraft) -> Result<Note, RemoteError>;

    /// Overwrite title, content and tags of an existing note
    async fn update(&self, user: &UserId, note: &Note) -> Result<(), RemoteError>;

    async fn delete(&self, user: &UserId, id: &str) -> Result<(), RemoteError>;

    /// Whether the backend answers at all for this user
    async fn probe_reachable(&self, user: &UserId) -> bool;

    /// Start delivering change signals for the user's rows
    fn subscribe(&self, user: &UserId) -> Subscription;
}
