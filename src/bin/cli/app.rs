use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};

use lumen_lib::auth::{AuthClient, Session, SessionStore};
use lumen_lib::cache::FileCache;
use lumen_lib::config::{BackendConfig, LumenConfig};
use lumen_lib::notes::Note;
use lumen_lib::remote::{MemoryNoteStore, RemoteNoteStore, SupabaseNoteStore};
use lumen_lib::sync::Reconciler;

/// Shared state for CLI commands
pub struct App {
    pub config: LumenConfig,
    pub data_dir: PathBuf,
    pub backend: Option<BackendConfig>,
    pub sessions: SessionStore,
}

impl App {
    /// Load config and locate the data directory
    pub fn new(config_path: Option<&Path>) -> Result<Self> {
        let config = LumenConfig::load(config_path).context("Failed to load config")?;
        let data_dir = config.data_dir().context("Failed to get data directory")?;
        let backend = config.backend();
        if backend.is_none() {
            log::info!("No backend configured, running local-only");
        }
        let sessions = SessionStore::new(&data_dir);

        Ok(Self {
            config,
            data_dir,
            backend,
            sessions,
        })
    }

    /// Auth client for the configured backend
    pub fn auth_client(&self) -> Result<AuthClient> {
        let Some(backend) = &self.backend else {
            bail!(
                "No backend configured. Set supabase_url and supabase_key in {} or the LUMEN_SUPABASE_URL / LUMEN_SUPABASE_KEY environment variables.",
                LumenConfig::default_path()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "config.toml".to_string())
            );
        };
        AuthClient::new(&backend.url, &backend.api_key).context("Failed to create auth client")
    }

    /// The stored session, refreshed when its access token has expired.
    /// A session that cannot be refreshed is dropped.
    pub async fn session(&self) -> Result<Option<Session>> {
        let Some(session) = self.sessions.load() else {
            return Ok(None);
        };
        if !session.is_expired() {
            return Ok(Some(session));
        }
        let client = self.auth_client()?;
        match client.refresh(&session).await {
            Ok(fresh) => {
                self.sessions.save(&fresh).context("Failed to save session")?;
                Ok(Some(fresh))
            }
            Err(e) => {
                log::warn!("Session refresh failed, signing out locally: {}", e);
                self.sessions.clear().context("Failed to clear session")?;
                Ok(None)
            }
        }
    }

    /// Build a reconciler for the signed-in user (if any) and load notes
    pub async fn connect(&self) -> Result<Reconciler> {
        let cache = FileCache::new(&self.data_dir, &self.config.storage_key);
        let session = match &self.backend {
            Some(_) => self.session().await?,
            None => None,
        };

        let (remote, user): (Arc<dyn RemoteNoteStore>, _) = match (&self.backend, session) {
            (Some(backend), Some(session)) => {
                let store = SupabaseNoteStore::new(&backend.url, &backend.api_key, &session.access_token)
                    .context("Failed to create note store client")?;
                let remote: Arc<dyn RemoteNoteStore> = Arc::new(store);
                (remote, Some(session.user_id()))
            }
            // Without a user the reconciler never calls the remote store
            _ => {
                let remote: Arc<dyn RemoteNoteStore> = Arc::new(MemoryNoteStore::new());
                (remote, None)
            }
        };

        let mut reconciler = Reconciler::new(remote, Box::new(cache));
        reconciler.initialize(user).await;
        Ok(reconciler)
    }

    /// Like [`App::connect`], but fail when nobody is signed in. Changes made
    /// without a user would not survive the process.
    pub async fn connect_signed_in(&self) -> Result<Reconciler> {
        let reconciler = self.connect().await?;
        if reconciler.user().is_none() {
            bail!("Not signed in. Run `lumen-cli login` first.");
        }
        Ok(reconciler)
    }
}

/// Find a note by id, exact title, or title prefix (case-insensitive)
pub fn find_note<'a>(notes: &'a [Note], query: &str) -> Result<&'a Note> {
    if let Some(note) = notes.iter().find(|n| n.id == query) {
        return Ok(note);
    }

    let query_lower = query.to_lowercase();

    // Exact match first
    if let Some(note) = notes.iter().find(|n| n.title.to_lowercase() == query_lower) {
        return Ok(note);
    }

    // Prefix match
    let matches: Vec<&Note> = notes
        .iter()
        .filter(|n| n.title.to_lowercase().starts_with(&query_lower))
        .collect();

    match matches.len() {
        0 => bail!("No note matching '{}'", query),
        1 => Ok(matches[0]),
        _ => bail!(
            "Ambiguous note title '{}'. Matches:\n{}",
            query,
            matches
                .iter()
                .map(|n| format!("  - {} ({})", n.title, n.id))
                .collect::<Vec<_>>()
                .join("\n")
        ),
    }
}
