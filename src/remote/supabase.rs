use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};

use super::realtime::{self, RealtimeTarget};
use super::{RemoteError, RemoteNoteStore, Subscription, UserId};
use crate::notes::{Note, NoteDraft};

/// Table holding one row per note
const NOTES_TABLE: &str = "notes";

/// Note store backed by a Supabase project's REST and Realtime endpoints
pub struct SupabaseNoteStore {
    client: Client,
    base_url: String,
    api_key: String,
    access_token: String,
}

/// A row of the `notes` table as PostgREST returns it
#[derive(Debug, Deserialize)]
struct NoteRow {
    id: String,
    title: String,
    content: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    #[serde(default)]
    tags: Option<Vec<String>>,
}

impl From<NoteRow> for Note {
    fn from(row: NoteRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            content: row.content,
            created_at: row.created_at.timestamp_millis(),
            updated_at: row.updated_at.timestamp_millis(),
            tags: row.tags.unwrap_or_default(),
        }
    }
}

#[derive(Serialize)]
struct InsertRow<'a> {
    user_id: &'a str,
    title: &'a str,
    content: &'a str,
    tags: &'a [String],
}

#[derive(Serialize)]
struct UpdateRow<'a> {
    title: &'a str,
    content: &'a str,
    tags: &'a [String],
    updated_at: String,
}

impl SupabaseNoteStore {
    /// Create a client for the project at `base_url`, acting as the user the
    /// access token was issued to
    pub fn new(base_url: &str, api_key: &str, access_token: &str) -> Result<Self, RemoteError> {
        let base_url = base_url.trim_end_matches('/').to_string();

        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(RemoteError::InvalidUrl("URL must start with http:// or https://".to_string()));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .connect_timeout(Duration::from_secs(15))
            .build()?;

        Ok(Self {
            client,
            base_url,
            api_key: api_key.to_string(),
            access_token: access_token.to_string(),
        })
    }

    /// Table URL filtered to one user's rows
    fn rows_url(&self, user: &UserId) -> String {
        format!(
            "{}/rest/v1/{}?user_id=eq.{}",
            self.base_url,
            NOTES_TABLE,
            urlencoding::encode(user.as_str())
        )
    }

    /// Table URL filtered to a single row of one user
    fn row_url(&self, user: &UserId, id: &str) -> String {
        format!("{}&id=eq.{}", self.rows_url(user), urlencoding::encode(id))
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.api_key)
            .bearer_auth(&self.access_token)
    }

    async fn check(response: Response) -> Result<Response, RemoteError> {
        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(RemoteError::AuthFailed),
            status if !status.is_success() => Err(RemoteError::Server {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            }),
            _ => Ok(response),
        }
    }
}

#[async_trait]
impl RemoteNoteStore for SupabaseNoteStore {
    async fn fetch_all(&self, user: &UserId) -> Result<Vec<Note>, RemoteError> {
        let url = format!("{}&select=*&order=created_at.desc", self.rows_url(user));
        let response = self.authorized(self.client.get(&url)).send().await?;
        let rows: Vec<NoteRow> = Self::check(response).await?.json().await?;
        log::debug!("Supabase: fetched {} notes for user {}", rows.len(), user);
        Ok(rows.into_iter().map(Note::from).collect())
    }

    async fn create(&self, user: &UserId, draft: &NoteDraft) -> Result<Note, RemoteError> {
        let url = format!("{}/rest/v1/{}", self.base_url, NOTES_TABLE);
        let body = InsertRow {
            user_id: user.as_str(),
            title: &draft.title,
            content: &draft.content,
            tags: &draft.tags,
        };
        let response = self
            .authorized(self.client.post(&url))
            .header("Prefer", "return=representation")
            .json(&body)
            .send()
            .await?;
        let rows: Vec<NoteRow> = Self::check(response).await?.json().await?;
        rows.into_iter()
            .next()
            .map(Note::from)
            .ok_or_else(|| RemoteError::UnexpectedResponse("insert returned no row".to_string()))
    }

    async fn update(&self, user: &UserId, note: &Note) -> Result<(), RemoteError> {
        let body = UpdateRow {
            title: &note.title,
            content: &note.content,
            tags: &note.tags,
            updated_at: Utc::now().to_rfc3339(),
        };
        let response = self
            .authorized(self.client.patch(self.row_url(user, &note.id)))
            .json(&body)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn delete(&self, user: &UserId, id: &str) -> Result<(), RemoteError> {
        let response = self
            .authorized(self.client.delete(self.row_url(user, id)))
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn probe_reachable(&self, user: &UserId) -> bool {
        let url = format!("{}&select=id&limit=1", self.rows_url(user));
        let result = match self.authorized(self.client.get(&url)).send().await {
            Ok(response) => Self::check(response).await.map(|_| ()),
            Err(e) => Err(e.into()),
        };
        match result {
            Ok(()) => true,
            Err(e) => {
                log::info!("Supabase: notes table not reachable: {}", e);
                false
            }
        }
    }

    fn subscribe(&self, user: &UserId) -> Subscription {
        realtime::start_listener(RealtimeTarget {
            base_url: self.base_url.clone(),
            api_key: self.api_key.clone(),
            access_token: self.access_token.clone(),
            table: NOTES_TABLE.to_string(),
            user: user.clone(),
        })
    }
}
