//! Reconciles the remote note set, the local cache and in-flight edits into
//! the single collection a shell renders.
//!
//! Mutations are optimistic: the in-memory collection (and the cache, which
//! mirrors it) changes before the remote call is made, and is never rolled
//! back when that call fails. A failed call only flips the sync status to
//! `error`; the local value stands until the user edits it again. Remote
//! calls are attempted once and never queued.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{mpsc, watch};

use super::status::{SyncState, SyncStatus, SyncStatusTracker};
use crate::cache::NoteCache;
use crate::notes::{NavigationHistory, Note, NoteDraft};
use crate::remote::{ChangeSignal, RemoteNoteStore, Subscription, SubscriptionHandle, UserId};

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ReconcileError {
    #[error("Note not found: {0}")]
    NoteNotFound(String),
}

/// An edit the shell asks the reconciler to apply
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    Create(NoteDraft),
    UpdateContent { id: String, content: String },
    UpdateTitle { id: String, title: String },
    Delete { id: String },
}

/// Owner of the in-memory note collection and sync status for one session
pub struct Reconciler {
    remote: Arc<dyn RemoteNoteStore>,
    cache: Box<dyn NoteCache>,
    user: Option<UserId>,
    notes: Vec<Note>,
    active_id: Option<String>,
    history: NavigationHistory,
    status: SyncStatusTracker,
    /// Cache writes are suppressed until the first load has settled
    initialized: bool,
    subscription: Option<SubscriptionHandle>,
}

impl Reconciler {
    pub fn new(remote: Arc<dyn RemoteNoteStore>, cache: Box<dyn NoteCache>) -> Self {
        Self {
            remote,
            cache,
            user: None,
            notes: Vec::new(),
            active_id: None,
            history: NavigationHistory::new(),
            status: SyncStatusTracker::new(),
            initialized: false,
            subscription: None,
        }
    }

    // ===== Read access =====

    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    pub fn note(&self, id: &str) -> Option<&Note> {
        self.notes.iter().find(|n| n.id == id)
    }

    pub fn active_id(&self) -> Option<&str> {
        self.active_id.as_deref()
    }

    pub fn active_note(&self) -> Option<&Note> {
        self.active_id.as_deref().and_then(|id| self.note(id))
    }

    pub fn user(&self) -> Option<&UserId> {
        self.user.as_ref()
    }

    pub fn history(&self) -> &NavigationHistory {
        &self.history
    }

    pub fn sync_state(&self) -> SyncState {
        self.status.state()
    }

    pub fn sync_status(&self) -> SyncStatus {
        self.status.snapshot()
    }

    /// Receiver that observes every sync status change
    pub fn watch_status(&self) -> watch::Receiver<SyncStatus> {
        self.status.watch()
    }

    /// Notes whose title or content contain `query`, case-insensitively
    pub fn search(&self, query: &str) -> Vec<&Note> {
        self.notes.iter().filter(|n| n.matches(query)).collect()
    }

    // ===== Session lifecycle =====

    /// Load the collection for `user`.
    ///
    /// Without a user nothing remote is touched and the session starts empty.
    /// With one, the remote collection wins when it has anything; otherwise
    /// the cache seeds the session, and an empty cache gets the starter note.
    pub async fn initialize(&mut self, user: Option<UserId>) {
        self.teardown_subscription();
        self.initialized = false;
        self.user = user.clone();

        let Some(user) = user else {
            log::info!("Sync: no user, starting an empty local session");
            self.adopt(Vec::new());
            self.status.offline();
            self.initialized = true;
            return;
        };

        self.status.begin();
        log::info!("Sync: loading notes for user {}", user);

        if !self.remote.probe_reachable(&user).await {
            // No fetch is attempted while the backend is unreachable
            log::info!("Sync: remote store not reachable, using local cache");
            let cached = self.cache.load();
            if cached.is_empty() {
                self.adopt(vec![Note::starter()]);
            } else {
                self.adopt(cached);
            }
            self.status.offline();
        } else {
            match self.remote.fetch_all(&user).await {
                Ok(remote_notes) if !remote_notes.is_empty() => {
                    log::info!("Sync: adopted {} remote notes", remote_notes.len());
                    self.adopt(remote_notes);
                    self.status.succeed();
                }
                Ok(_) => self.seed_empty_remote(&user).await,
                Err(e) => {
                    self.status.fail(format!("failed to load notes: {}", e));
                    let cached = self.cache.load();
                    log::info!("Sync: falling back to {} cached notes", cached.len());
                    self.adopt(cached);
                }
            }
        }

        self.initialized = true;
        self.persist();
    }

    /// Remote answered with nothing: seed from the cache, or from the starter
    /// note when the cache is empty too.
    async fn seed_empty_remote(&mut self, user: &UserId) {
        let cached = self.cache.load();
        if !cached.is_empty() {
            // Cached notes are shown but not written back to the remote
            log::info!("Sync: remote is empty, adopting {} cached notes", cached.len());
            self.adopt(cached);
            self.status.succeed();
            return;
        }

        let starter = Note::starter();
        match self.remote.create(user, &starter.draft()).await {
            Ok(created) => {
                log::info!("Sync: created starter note {}", created.id);
                self.adopt(vec![created]);
                self.status.succeed();
            }
            Err(e) => {
                self.adopt(vec![starter]);
                self.status.fail(format!("failed to create starter note: {}", e));
            }
        }
    }

    /// Start listening for remote changes, replacing any previous listener.
    ///
    /// The reconciler keeps the subscription handle; the caller gets the
    /// signals and answers each one with [`Reconciler::refresh_from_remote`].
    /// Returns `None` when there is no user.
    pub fn watch(&mut self) -> Option<mpsc::Receiver<ChangeSignal>> {
        self.teardown_subscription();
        let user = self.user.as_ref()?;
        let Subscription { signals, handle } = self.remote.subscribe(user);
        log::info!("Sync: subscribed to changes for user {}", user);
        self.subscription = Some(handle);
        Some(signals)
    }

    pub fn is_watching(&self) -> bool {
        self.subscription.is_some()
    }

    /// Sign-out: stop listening and forget the collection, cache included
    pub fn end_session(&mut self) {
        self.teardown_subscription();
        self.user = None;
        self.adopt(Vec::new());
        if let Err(e) = self.cache.clear() {
            log::error!("Cache: failed to clear: {}", e);
        }
        self.status.offline();
        log::info!("Sync: session ended");
    }

    fn teardown_subscription(&mut self) {
        if let Some(handle) = self.subscription.take() {
            handle.shutdown();
            log::debug!("Sync: previous subscription torn down");
        }
    }

    // ===== Remote pushes =====

    /// Refetch the full collection after a change signal
    pub async fn refresh_from_remote(&mut self) {
        let Some(user) = self.user.clone() else {
            return;
        };
        match self.remote.fetch_all(&user).await {
            Ok(notes) => self.on_remote_push(notes),
            Err(e) => log::warn!("Sync: refetch after change signal failed: {}", e),
        }
    }

    /// Replace the collection with a freshly fetched one. Empty collections
    /// are ignored rather than treated as "everything was deleted".
    pub fn on_remote_push(&mut self, notes: Vec<Note>) {
        if notes.is_empty() {
            log::debug!("Sync: ignoring empty remote push");
            return;
        }
        log::info!("Sync: remote push with {} notes", notes.len());
        self.notes = notes;
        let active_survives = self
            .active_id
            .as_deref()
            .is_some_and(|id| self.notes.iter().any(|n| n.id == id));
        let notes = &self.notes;
        self.history.retain(|id| notes.iter().any(|n| n.id == id));
        if !active_survives {
            self.active_id = self.notes.first().map(|n| n.id.clone());
            if let Some(next) = self.active_id.as_deref() {
                if self.history.last() != Some(next) {
                    self.history.push(next);
                }
            }
        }
        self.persist();
        self.status.succeed();
    }

    // ===== Mutations =====

    /// Apply an edit locally, then send it to the remote store.
    ///
    /// Returns the note as it stands afterwards (`None` for deletes). Remote
    /// failures are reported through the sync status, not as errors.
    pub async fn apply(&mut self, mutation: Mutation) -> Result<Option<Note>, ReconcileError> {
        match mutation {
            Mutation::Create(draft) => Ok(Some(self.create(draft).await)),
            Mutation::UpdateContent { id, content } => {
                self.update(&id, |note| note.with_content(content)).await.map(Some)
            }
            Mutation::UpdateTitle { id, title } => {
                self.update(&id, |note| note.with_title(title)).await.map(Some)
            }
            Mutation::Delete { id } => self.delete(&id).await.map(|_| None),
        }
    }

    async fn create(&mut self, draft: NoteDraft) -> Note {
        let local = Note::local(draft);
        let temp_id = local.id.clone();

        self.notes.insert(0, local.clone());
        self.active_id = Some(temp_id.clone());
        self.history.push(&temp_id);
        self.persist();

        let Some(user) = self.user.clone() else {
            return local;
        };

        self.status.begin();
        match self.remote.create(&user, &local.draft()).await {
            Ok(created) => {
                self.confirm_created(&temp_id, created.clone());
                self.status.succeed();
                created
            }
            Err(e) => {
                self.status.fail(format!("failed to create note: {}", e));
                local
            }
        }
    }

    /// Swap a temporary note for the server's copy, keeping its position
    fn confirm_created(&mut self, temp_id: &str, created: Note) {
        match self.notes.iter().position(|n| n.id == temp_id) {
            Some(pos) => self.notes[pos] = created.clone(),
            None if self.note(&created.id).is_none() => self.notes.insert(0, created.clone()),
            None => {}
        }
        if self.active_id.as_deref() == Some(temp_id) {
            self.active_id = Some(created.id.clone());
        }
        self.history.rename(temp_id, &created.id);
        self.persist();
    }

    async fn update(
        &mut self,
        id: &str,
        edit: impl FnOnce(&Note) -> Note,
    ) -> Result<Note, ReconcileError> {
        let pos = self
            .position(id)
            .ok_or_else(|| ReconcileError::NoteNotFound(id.to_string()))?;

        let updated = edit(&self.notes[pos]);
        self.notes[pos] = updated.clone();
        self.persist();

        if let Some(user) = self.user.clone() {
            self.status.begin();
            match self.remote.update(&user, &updated).await {
                Ok(()) => self.status.succeed(),
                Err(e) => self.status.fail(format!("failed to update note {}: {}", id, e)),
            }
        }

        Ok(updated)
    }

    async fn delete(&mut self, id: &str) -> Result<(), ReconcileError> {
        if self.position(id).is_none() {
            return Err(ReconcileError::NoteNotFound(id.to_string()));
        }

        let outcome = match self.user.clone() {
            Some(user) => {
                self.status.begin();
                Some(self.remote.delete(&user, id).await)
            }
            None => None,
        };

        // Removed locally whatever the remote said
        self.notes.retain(|n| n.id != id);
        self.history.remove(id);
        if self.active_id.as_deref() == Some(id) {
            self.active_id = self.notes.first().map(|n| n.id.clone());
            if let Some(next) = self.active_id.as_deref() {
                if self.history.last() != Some(next) {
                    self.history.push(next);
                }
            }
        }
        self.persist();

        match outcome {
            Some(Ok(())) => self.status.succeed(),
            Some(Err(e)) => self.status.fail(format!("failed to delete note {}: {}", id, e)),
            None => {}
        }
        Ok(())
    }

    // ===== Selection =====

    /// Make a note active and record the visit
    pub fn select(&mut self, id: &str) -> Result<(), ReconcileError> {
        if self.position(id).is_none() {
            return Err(ReconcileError::NoteNotFound(id.to_string()));
        }
        if self.active_id.as_deref() == Some(id) {
            return Ok(());
        }
        self.history.push(id);
        self.active_id = Some(id.to_string());
        Ok(())
    }

    /// Return to the previously visited note, if there is one
    pub fn back(&mut self) -> Option<&Note> {
        loop {
            let previous = self.history.back()?.to_string();
            if self.position(&previous).is_some() {
                self.active_id = Some(previous);
                return self.active_note();
            }
            self.history.remove(&previous);
        }
    }

    // ===== Internals =====

    fn position(&self, id: &str) -> Option<usize> {
        self.notes.iter().position(|n| n.id == id)
    }

    fn adopt(&mut self, notes: Vec<Note>) {
        self.notes = notes;
        self.active_id = self.notes.first().map(|n| n.id.clone());
        self.history.reset(self.active_id.as_deref());
    }

    /// Write-through to the cache. Cache failures never affect sync status.
    fn persist(&self) {
        if !self.initialized {
            return;
        }
        if let Err(e) = self.cache.store(&self.notes) {
            log::error!("Cache: failed to write {} notes: {}", self.notes.len(), e);
        }
    }
}

impl Drop for Reconciler {
    fn drop(&mut self) {
        self.teardown_subscription();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::notes::{STARTER_NOTE_ID, STARTER_NOTE_TITLE};
    use crate::remote::MemoryNoteStore;

    fn note(id: &str, created_at: i64) -> Note {
        Note {
            id: id.to_string(),
            title: format!("Title {}", id),
            content: format!("Body of {}", id),
            created_at,
            updated_at: created_at,
            tags: Vec::new(),
        }
    }

    fn user() -> UserId {
        UserId::new("user-1")
    }

    fn setup() -> (Reconciler, Arc<MemoryNoteStore>, MemoryCache) {
        let store = Arc::new(MemoryNoteStore::new());
        let cache = MemoryCache::new();
        let reconciler = Reconciler::new(store.clone(), Box::new(cache.clone()));
        (reconciler, store, cache)
    }

    fn ids(notes: &[Note]) -> Vec<&str> {
        notes.iter().map(|n| n.id.as_str()).collect()
    }

    /// The fields the server does not rewrite on its own
    fn visible(notes: &[Note]) -> Vec<(String, String, String, Vec<String>)> {
        notes
            .iter()
            .map(|n| (n.id.clone(), n.title.clone(), n.content.clone(), n.tags.clone()))
            .collect()
    }

    #[tokio::test]
    async fn test_no_user_makes_no_remote_calls() {
        let (mut reconciler, store, _cache) = setup();
        reconciler.initialize(None).await;

        assert!(reconciler.notes().is_empty());
        assert!(reconciler.active_id().is_none());
        assert_eq!(reconciler.sync_state(), SyncState::Offline);

        reconciler.apply(Mutation::Create(NoteDraft::untitled())).await.unwrap();
        assert_eq!(reconciler.notes().len(), 1);
        assert_eq!(reconciler.sync_state(), SyncState::Offline);
        assert_eq!(store.call_count(), 0);
    }

    #[tokio::test]
    async fn test_initialize_adopts_remote_order() {
        let (mut reconciler, store, cache) = setup();
        store.seed(&user(), vec![note("a", 200), note("b", 100)]);

        reconciler.initialize(Some(user())).await;

        assert_eq!(ids(reconciler.notes()), vec!["a", "b"]);
        assert_eq!(reconciler.active_id(), Some("a"));
        assert_eq!(reconciler.sync_state(), SyncState::Synced);
        assert_eq!(ids(&cache.load()), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_initialize_creates_starter_note() {
        let (mut reconciler, store, cache) = setup();

        reconciler.initialize(Some(user())).await;

        assert_eq!(reconciler.notes().len(), 1);
        let active = reconciler.active_note().unwrap();
        assert_eq!(active.title, STARTER_NOTE_TITLE);
        assert_ne!(active.id, STARTER_NOTE_ID, "server id should replace the local one");
        assert_eq!(reconciler.sync_state(), SyncState::Synced);
        assert_eq!(store.notes(&user()).len(), 1);
        assert_eq!(cache.load(), reconciler.notes().to_vec());
    }

    #[tokio::test]
    async fn test_fetch_failure_with_empty_cache_stays_empty() {
        let (mut reconciler, store, cache) = setup();
        store.set_failing(true);

        reconciler.initialize(Some(user())).await;

        assert!(reconciler.notes().is_empty());
        assert_eq!(reconciler.sync_state(), SyncState::Error);
        assert!(cache.load().is_empty());
    }

    #[tokio::test]
    async fn test_starter_note_create_failure_after_empty_fetch() {
        struct CreateFails(MemoryNoteStore);

        #[async_trait::async_trait]
        impl RemoteNoteStore for CreateFails {
            async fn fetch_all(&self, user: &UserId) -> Result<Vec<Note>, crate::remote::RemoteError> {
                self.0.fetch_all(user).await
            }
            async fn create(&self, _: &UserId, _: &NoteDraft) -> Result<Note, crate::remote::RemoteError> {
                Err(crate::remote::RemoteError::Unavailable("insert rejected".to_string()))
            }
            async fn update(&self, user: &UserId, note: &Note) -> Result<(), crate::remote::RemoteError> {
                self.0.update(user, note).await
            }
            async fn delete(&self, user: &UserId, id: &str) -> Result<(), crate::remote::RemoteError> {
                self.0.delete(user, id).await
            }
            async fn probe_reachable(&self, user: &UserId) -> bool {
                self.0.probe_reachable(user).await
            }
            fn subscribe(&self, user: &UserId) -> Subscription {
                self.0.subscribe(user)
            }
        }

        let cache = MemoryCache::new();
        let mut reconciler = Reconciler::new(
            Arc::new(CreateFails(MemoryNoteStore::new())),
            Box::new(cache.clone()),
        );

        reconciler.initialize(Some(user())).await;

        let active = reconciler.active_note().unwrap();
        assert_eq!(active.id, STARTER_NOTE_ID);
        assert_eq!(active.title, STARTER_NOTE_TITLE);
        assert_eq!(reconciler.sync_state(), SyncState::Error);
        assert_eq!(ids(&cache.load()), vec![STARTER_NOTE_ID]);
    }

    #[tokio::test]
    async fn test_empty_remote_adopts_cache_without_write_back() {
        let (mut reconciler, store, cache) = setup();
        cache.store(&[note("c1", 10), note("c2", 5)]).unwrap();

        reconciler.initialize(Some(user())).await;

        assert_eq!(ids(reconciler.notes()), vec!["c1", "c2"]);
        assert_eq!(reconciler.sync_state(), SyncState::Synced);
        assert!(store.notes(&user()).is_empty());
    }

    #[tokio::test]
    async fn test_fetch_failure_falls_back_to_cache() {
        let (mut reconciler, store, cache) = setup();
        cache.store(&[note("c1", 10)]).unwrap();
        store.set_failing(true);

        reconciler.initialize(Some(user())).await;

        assert_eq!(ids(reconciler.notes()), vec!["c1"]);
        assert_eq!(reconciler.active_id(), Some("c1"));
        assert_eq!(reconciler.sync_state(), SyncState::Error);
        assert!(reconciler.sync_status().error.is_some());
    }

    #[tokio::test]
    async fn test_unreachable_remote_is_offline() {
        let (mut reconciler, store, cache) = setup();
        store.set_unreachable(true);

        reconciler.initialize(Some(user())).await;

        assert_eq!(reconciler.sync_state(), SyncState::Offline);
        assert_eq!(reconciler.active_id(), Some(STARTER_NOTE_ID));
        assert_eq!(store.call_count(), 0);
        assert_eq!(ids(&cache.load()), vec![STARTER_NOTE_ID]);
    }

    #[tokio::test]
    async fn test_malformed_cache_is_treated_as_empty() {
        let store = Arc::new(MemoryNoteStore::new());
        store.set_unreachable(true);
        let cache = MemoryCache::with_raw("{{{");
        let mut reconciler = Reconciler::new(store, Box::new(cache.clone()));

        reconciler.initialize(Some(user())).await;

        assert_eq!(reconciler.active_id(), Some(STARTER_NOTE_ID));
        assert_eq!(ids(&cache.load()), vec![STARTER_NOTE_ID]);
    }

    #[tokio::test]
    async fn test_cache_round_trip_without_remote() {
        let (mut first, store, cache) = setup();
        store.seed(&user(), vec![note("a", 300), note("b", 200), note("c", 100)]);
        first.initialize(Some(user())).await;
        first
            .apply(Mutation::UpdateTitle { id: "b".to_string(), title: "Renamed".to_string() })
            .await
            .unwrap();
        let expected = first.notes().to_vec();

        let offline = Arc::new(MemoryNoteStore::new());
        offline.set_unreachable(true);
        let mut second = Reconciler::new(offline, Box::new(cache.clone()));
        second.initialize(Some(user())).await;

        assert_eq!(second.notes(), expected.as_slice());
    }

    #[tokio::test]
    async fn test_create_replaces_temporary_note_in_place() {
        let (mut reconciler, store, cache) = setup();
        store.seed(&user(), vec![note("a", 100)]);
        reconciler.initialize(Some(user())).await;

        let created = reconciler
            .apply(Mutation::Create(NoteDraft::untitled()))
            .await
            .unwrap()
            .unwrap();

        assert!(!created.id.starts_with("note-"));
        assert_eq!(ids(reconciler.notes()), vec![created.id.as_str(), "a"]);
        assert_eq!(reconciler.active_id(), Some(created.id.as_str()));
        assert_eq!(reconciler.history().last(), Some(created.id.as_str()));
        assert_eq!(reconciler.sync_state(), SyncState::Synced);
        assert_eq!(cache.load(), reconciler.notes().to_vec());
    }

    #[tokio::test]
    async fn test_failed_create_keeps_optimistic_note() {
        let (mut reconciler, store, cache) = setup();
        store.seed(&user(), vec![note("a", 100)]);
        reconciler.initialize(Some(user())).await;
        store.set_failing(true);

        let local = reconciler
            .apply(Mutation::Create(NoteDraft {
                title: "Draft".to_string(),
                content: "keep me".to_string(),
                tags: vec!["t".to_string()],
            }))
            .await
            .unwrap()
            .unwrap();

        assert!(local.id.starts_with("note-"));
        assert_eq!(ids(reconciler.notes()), vec![local.id.as_str(), "a"]);
        assert_eq!(reconciler.sync_state(), SyncState::Error);
        assert_eq!(cache.load()[0].content, "keep me");
    }

    #[tokio::test]
    async fn test_failed_update_keeps_optimistic_value() {
        let (mut reconciler, store, cache) = setup();
        store.seed(&user(), vec![note("a", 200), note("b", 100)]);
        reconciler.initialize(Some(user())).await;
        store.set_failing(true);

        reconciler
            .apply(Mutation::UpdateContent { id: "a".to_string(), content: "X".to_string() })
            .await
            .unwrap();

        assert_eq!(reconciler.note("a").unwrap().content, "X");
        assert_eq!(reconciler.sync_state(), SyncState::Error);
        assert_eq!(cache.load()[0].content, "X");
        assert_eq!(store.notes(&user())[0].content, "Body of a");
    }

    #[tokio::test]
    async fn test_update_keeps_position_and_refreshes_timestamp() {
        let (mut reconciler, store, _cache) = setup();
        store.seed(&user(), vec![note("a", 200), note("b", 100)]);
        reconciler.initialize(Some(user())).await;

        let updated = reconciler
            .apply(Mutation::UpdateTitle { id: "b".to_string(), title: "New".to_string() })
            .await
            .unwrap()
            .unwrap();

        assert_eq!(ids(reconciler.notes()), vec!["a", "b"]);
        assert_eq!(updated.title, "New");
        assert!(updated.updated_at > 100);
        assert_eq!(updated.created_at, 100);
        assert_eq!(reconciler.sync_state(), SyncState::Synced);
    }

    #[tokio::test]
    async fn test_unknown_id_is_rejected() {
        let (mut reconciler, store, _cache) = setup();
        store.seed(&user(), vec![note("a", 100)]);
        reconciler.initialize(Some(user())).await;
        let calls = store.call_count();

        let result = reconciler
            .apply(Mutation::UpdateContent { id: "zzz".to_string(), content: "X".to_string() })
            .await;
        assert_eq!(result, Err(ReconcileError::NoteNotFound("zzz".to_string())));

        let result = reconciler.apply(Mutation::Delete { id: "zzz".to_string() }).await;
        assert!(result.is_err());
        assert_eq!(store.call_count(), calls);
    }

    #[tokio::test]
    async fn test_delete_inactive_note_keeps_selection() {
        let (mut reconciler, store, _cache) = setup();
        store.seed(&user(), vec![note("a", 300), note("b", 200), note("c", 100)]);
        reconciler.initialize(Some(user())).await;
        reconciler.select("b").unwrap();

        reconciler.apply(Mutation::Delete { id: "c".to_string() }).await.unwrap();

        assert_eq!(reconciler.active_id(), Some("b"));
        assert_eq!(ids(reconciler.notes()), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_delete_active_note_selects_first() {
        let (mut reconciler, store, _cache) = setup();
        store.seed(&user(), vec![note("a", 300), note("b", 200)]);
        reconciler.initialize(Some(user())).await;
        reconciler.select("b").unwrap();

        reconciler.apply(Mutation::Delete { id: "b".to_string() }).await.unwrap();
        assert_eq!(reconciler.active_id(), Some("a"));

        reconciler.apply(Mutation::Delete { id: "a".to_string() }).await.unwrap();
        assert_eq!(reconciler.active_id(), None);
        assert!(reconciler.notes().is_empty());
        assert!(store.notes(&user()).is_empty());
    }

    #[tokio::test]
    async fn test_delete_is_local_even_when_remote_fails() {
        let (mut reconciler, store, cache) = setup();
        store.seed(&user(), vec![note("a", 300), note("b", 200)]);
        reconciler.initialize(Some(user())).await;
        store.set_failing(true);

        reconciler.apply(Mutation::Delete { id: "a".to_string() }).await.unwrap();

        assert_eq!(ids(reconciler.notes()), vec!["b"]);
        assert_eq!(reconciler.active_id(), Some("b"));
        assert_eq!(reconciler.sync_state(), SyncState::Error);
        assert_eq!(ids(&cache.load()), vec!["b"]);
        assert_eq!(store.notes(&user()).len(), 2);
    }

    #[tokio::test]
    async fn test_mutation_sequence_matches_remote() {
        let (mut reconciler, store, _cache) = setup();
        store.seed(&user(), vec![note("a", 300), note("b", 200), note("c", 100)]);
        reconciler.initialize(Some(user())).await;

        let mut created = Vec::new();
        for round in 0..4 {
            let note = reconciler
                .apply(Mutation::Create(NoteDraft {
                    title: format!("Round {}", round),
                    content: String::new(),
                    tags: vec![format!("r{}", round)],
                }))
                .await
                .unwrap()
                .unwrap();
            created.push(note.id);
        }
        reconciler
            .apply(Mutation::UpdateContent { id: created[1].clone(), content: "edited".to_string() })
            .await
            .unwrap();
        reconciler
            .apply(Mutation::UpdateTitle { id: "b".to_string(), title: "Bee".to_string() })
            .await
            .unwrap();
        reconciler.apply(Mutation::Delete { id: created[2].clone() }).await.unwrap();
        reconciler.apply(Mutation::Delete { id: "c".to_string() }).await.unwrap();
        reconciler
            .apply(Mutation::UpdateContent { id: created[3].clone(), content: "last".to_string() })
            .await
            .unwrap();

        assert_eq!(reconciler.sync_state(), SyncState::Synced);
        assert_eq!(visible(reconciler.notes()), visible(&store.notes(&user())));
    }

    #[tokio::test]
    async fn test_remote_push_replaces_collection() {
        let (mut reconciler, store, cache) = setup();
        store.seed(&user(), vec![note("a", 200), note("b", 100)]);
        reconciler.initialize(Some(user())).await;
        reconciler.select("b").unwrap();

        reconciler.on_remote_push(vec![note("c", 300), note("b", 100)]);

        assert_eq!(ids(reconciler.notes()), vec!["c", "b"]);
        assert_eq!(reconciler.active_id(), Some("b"));
        assert_eq!(ids(&cache.load()), vec!["c", "b"]);
        assert_eq!(reconciler.sync_state(), SyncState::Synced);

        reconciler.on_remote_push(vec![note("d", 400)]);
        assert_eq!(reconciler.active_id(), Some("d"));
    }

    #[tokio::test]
    async fn test_empty_remote_push_is_ignored() {
        let (mut reconciler, store, cache) = setup();
        store.seed(&user(), vec![note("a", 200)]);
        reconciler.initialize(Some(user())).await;
        store.set_failing(true);
        reconciler
            .apply(Mutation::UpdateContent { id: "a".to_string(), content: "X".to_string() })
            .await
            .unwrap();

        reconciler.on_remote_push(Vec::new());

        assert_eq!(ids(reconciler.notes()), vec!["a"]);
        assert_eq!(reconciler.note("a").unwrap().content, "X");
        assert_eq!(reconciler.sync_state(), SyncState::Error);
        assert_eq!(cache.load()[0].content, "X");
    }

    #[tokio::test]
    async fn test_change_signal_triggers_refetch() {
        let (mut reconciler, store, _cache) = setup();
        store.seed(&user(), vec![note("a", 200)]);
        reconciler.initialize(Some(user())).await;
        let mut signals = reconciler.watch().unwrap();

        // another client writes a row
        store.create(&user(), &NoteDraft::untitled()).await.unwrap();
        assert_eq!(signals.recv().await, Some(ChangeSignal));

        reconciler.refresh_from_remote().await;
        assert_eq!(reconciler.notes().len(), 2);
        assert_eq!(reconciler.active_id(), Some("a"));
    }

    #[tokio::test]
    async fn test_failed_refetch_leaves_state_alone() {
        let (mut reconciler, store, _cache) = setup();
        store.seed(&user(), vec![note("a", 200), note("b", 100)]);
        reconciler.initialize(Some(user())).await;
        reconciler.select("b").unwrap();

        store.set_failing(true);
        reconciler.refresh_from_remote().await;

        assert_eq!(ids(reconciler.notes()), vec!["a", "b"]);
        assert_eq!(reconciler.active_id(), Some("b"));
        assert_eq!(reconciler.sync_state(), SyncState::Synced);
    }

    #[tokio::test]
    async fn test_watch_replaces_previous_subscription() {
        let (mut reconciler, store, _cache) = setup();
        reconciler.initialize(Some(user())).await;

        let _first = reconciler.watch().unwrap();
        let _second = reconciler.watch().unwrap();

        assert_eq!(store.subscriber_count(), 1);
        assert!(reconciler.is_watching());
    }

    #[tokio::test]
    async fn test_end_session_clears_everything() {
        let (mut reconciler, store, cache) = setup();
        store.seed(&user(), vec![note("a", 200)]);
        reconciler.initialize(Some(user())).await;
        let _signals = reconciler.watch().unwrap();

        reconciler.end_session();

        assert!(reconciler.notes().is_empty());
        assert!(reconciler.user().is_none());
        assert!(!reconciler.is_watching());
        assert_eq!(store.subscriber_count(), 0);
        assert!(cache.load().is_empty());
        assert!(cache.raw().is_none());
        assert_eq!(reconciler.sync_state(), SyncState::Offline);
    }

    #[tokio::test]
    async fn test_back_after_push_stays_on_live_notes() {
        let (mut reconciler, store, _cache) = setup();
        store.seed(&user(), vec![note("a", 200), note("b", 100)]);
        reconciler.initialize(Some(user())).await;
        reconciler.select("b").unwrap();

        reconciler.on_remote_push(vec![note("c", 300)]);

        assert_eq!(reconciler.active_id(), Some("c"));
        assert_eq!(reconciler.history().entries(), ["c".to_string()]);
        assert!(reconciler.back().is_none());
        assert_eq!(reconciler.active_id(), Some("c"));
        assert!(reconciler.active_note().is_some());
    }

    #[tokio::test]
    async fn test_push_keeps_history_of_surviving_notes() {
        let (mut reconciler, store, _cache) = setup();
        store.seed(&user(), vec![note("a", 300), note("b", 200), note("c", 100)]);
        reconciler.initialize(Some(user())).await;
        reconciler.select("b").unwrap();
        reconciler.select("c").unwrap();

        reconciler.on_remote_push(vec![note("a", 300), note("c", 100)]);

        assert_eq!(reconciler.active_id(), Some("c"));
        assert_eq!(reconciler.back().map(|n| n.id.as_str()), Some("a"));
    }

    #[tokio::test]
    async fn test_select_and_back() {
        let (mut reconciler, store, _cache) = setup();
        store.seed(&user(), vec![note("a", 300), note("b", 200), note("c", 100)]);
        reconciler.initialize(Some(user())).await;

        reconciler.select("b").unwrap();
        reconciler.select("b").unwrap();
        reconciler.select("c").unwrap();
        assert_eq!(reconciler.history().len(), 3);

        assert_eq!(reconciler.back().map(|n| n.id.clone()), Some("b".to_string()));
        assert_eq!(reconciler.back().map(|n| n.id.clone()), Some("a".to_string()));
        assert!(reconciler.back().is_none());
        assert_eq!(reconciler.active_id(), Some("a"));

        assert!(reconciler.select("missing").is_err());
    }

    #[tokio::test]
    async fn test_search() {
        let (mut reconciler, store, _cache) = setup();
        store.seed(&user(), vec![note("a", 300), note("b", 200)]);
        reconciler.initialize(Some(user())).await;

        let hits = reconciler.search("BODY OF B");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "b");
        assert_eq!(reconciler.search("").len(), 2);
    }

    #[tokio::test]
    async fn test_status_watchers_see_resolution() {
        let (mut reconciler, store, _cache) = setup();
        store.seed(&user(), vec![note("a", 200)]);
        let mut status = reconciler.watch_status();

        reconciler.initialize(Some(user())).await;

        assert!(status.has_changed().unwrap());
        assert_eq!(status.borrow_and_update().status, SyncState::Synced);
    }
}
