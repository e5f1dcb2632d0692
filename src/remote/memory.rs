//! In-process note store with switchable failures.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tokio::sync::mpsc;
use uuid::Uuid;

use super::{
    ChangeSignal, RemoteError, RemoteNoteStore, Subscription, SubscriptionHandle, UserId,
    SIGNAL_BUFFER,
};
use crate::notes::{now_millis, Note, NoteDraft};

struct Subscriber {
    user: UserId,
    signals: mpsc::Sender<ChangeSignal>,
    shutdown_rx: mpsc::Receiver<()>,
}

impl Subscriber {
    fn is_closed(&mut self) -> bool {
        match self.shutdown_rx.try_recv() {
            Ok(()) | Err(mpsc::error::TryRecvError::Disconnected) => true,
            Err(mpsc::error::TryRecvError::Empty) => self.signals.is_closed(),
        }
    }
}

#[derive(Default)]
struct StoreState {
    notes: HashMap<UserId, Vec<Note>>,
    subscribers: Vec<Subscriber>,
    last_created_at: i64,
}

/// Note store held in memory. Mutations notify subscribers of the same user,
/// mirroring how the hosted store pushes row changes.
#[derive(Default)]
pub struct MemoryNoteStore {
    state: Mutex<StoreState>,
    failing: AtomicBool,
    unreachable: AtomicBool,
    calls: AtomicUsize,
}

impl MemoryNoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every CRUD call fail until switched back
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Make reachability probes fail until switched back
    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    /// Replace a user's rows without notifying subscribers
    pub fn seed(&self, user: &UserId, notes: Vec<Note>) {
        self.lock().notes.insert(user.clone(), notes);
    }

    /// A user's rows as the server would return them
    pub fn notes(&self, user: &UserId) -> Vec<Note> {
        let mut notes = self.lock().notes.get(user).cloned().unwrap_or_default();
        notes.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        notes
    }

    /// Number of CRUD calls received, failed ones included
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Push a change signal to the user's subscribers, as if another client
    /// had written a row
    pub fn notify(&self, user: &UserId) {
        let mut state = self.lock();
        state.subscribers.retain_mut(|sub| !sub.is_closed());
        for sub in state.subscribers.iter().filter(|sub| &sub.user == user) {
            let _ = sub.signals.try_send(ChangeSignal);
        }
    }

    /// Live subscribers across all users
    pub fn subscriber_count(&self) -> usize {
        let mut state = self.lock();
        state.subscribers.retain_mut(|sub| !sub.is_closed());
        state.subscribers.len()
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check(&self, operation: &str) -> Result<(), RemoteError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(RemoteError::Unavailable(format!("{} rejected", operation)));
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteNoteStore for MemoryNoteStore {
    async fn fetch_all(&self, user: &UserId) -> Result<Vec<Note>, RemoteError> {
        self.check("fetch")?;
        Ok(self.notes(user))
    }

    async fn create(&self, user: &UserId, draft: &NoteDraft) -> Result<Note, RemoteError> {
        self.check("create")?;
        let note = {
            let mut state = self.lock();
            // strictly increasing so newest-first ordering is total
            let created_at = now_millis().max(state.last_created_at + 1);
            state.last_created_at = created_at;
            let note = Note {
                id: Uuid::new_v4().to_string(),
                title: draft.title.clone(),
                content: draft.content.clone(),
                created_at,
                updated_at: created_at,
                tags: draft.tags.clone(),
            };
            state.notes.entry(user.clone()).or_default().push(note.clone());
            note
        };
        self.notify(user);
        Ok(note)
    }

    async fn update(&self, user: &UserId, note: &Note) -> Result<(), RemoteError> {
        self.check("update")?;
        {
            let mut state = self.lock();
            let rows = state.notes.entry(user.clone()).or_default();
            // Filtered update: an unknown id matches no rows and is not an error
            if let Some(row) = rows.iter_mut().find(|row| row.id == note.id) {
                row.title = note.title.clone();
                row.content = note.content.clone();
                row.tags = note.tags.clone();
                row.updated_at = now_millis().max(row.created_at);
            }
        }
        self.notify(user);
        Ok(())
    }

    async fn delete(&self, user: &UserId, id: &str) -> Result<(), RemoteError> {
        self.check("delete")?;
        if let Some(rows) = self.lock().notes.get_mut(user) {
            rows.retain(|row| row.id != id);
        }
        self.notify(user);
        Ok(())
    }

    async fn probe_reachable(&self, _user: &UserId) -> bool {
        !self.unreachable.load(Ordering::SeqCst)
    }

    fn subscribe(&self, user: &UserId) -> Subscription {
        let (signals_tx, signals_rx) = mpsc::channel(SIGNAL_BUFFER);
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        self.lock().subscribers.push(Subscriber {
            user: user.clone(),
            signals: signals_tx,
            shutdown_rx,
        });
        Subscription {
            signals: signals_rx,
            handle: SubscriptionHandle::new(shutdown_tx),
        }
    }
}
