use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Id given to the starter note when it only exists locally
pub const STARTER_NOTE_ID: &str = "init-001";

/// Title of the starter note created on first run
pub const STARTER_NOTE_TITLE: &str = "On the Nature of Thought";

/// Title of notes created without an explicit title
pub const UNTITLED_TITLE: &str = "Untitled Entry";

const STARTER_NOTE_CONTENT: &str = r#"# On the Nature of Thought

Writing is not merely a method of recording; it is a method of thinking. When we structure our ideas on a page, we give them form and permanence.

## Structural Analysis
Complex systems often require visualization to be fully understood. 

```mermaid
graph LR
    A[Chaos] -->|Ordering| B(Structure)
    B -->|Refinement| C{Clarity}
    C -->|Yes| D[Insight]
    C -->|No| E[Revision]
```

## Mathematical Beauty
The relationship between energy and matter is elegant in its simplicity, yet profound in its implication:

$$
E = mc^2
$$

But consider the wave equation:

$$
\frac{\partial^2 u}{\partial t^2} = c^2 \nabla^2 u
$$

This surface is designed for this kind of work. Quiet. Powerful.
"#;

/// Current time as epoch milliseconds
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: String,
    pub title: String,
    /// Raw markdown text
    pub content: String,
    pub created_at: i64,
    pub updated_at: i64,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Note {
    /// Create a note that only exists locally, with a temporary id
    pub fn local(draft: NoteDraft) -> Self {
        let now = now_millis();
        Self {
            id: format!("note-{}", Uuid::new_v4().simple()),
            title: draft.title,
            content: draft.content,
            created_at: now,
            updated_at: now,
            tags: draft.tags,
        }
    }

    /// The document seeded into an empty collection on first run
    pub fn starter() -> Self {
        let now = now_millis();
        Self {
            id: STARTER_NOTE_ID.to_string(),
            title: STARTER_NOTE_TITLE.to_string(),
            content: STARTER_NOTE_CONTENT.to_string(),
            created_at: now,
            updated_at: now,
            tags: vec!["philosophy".to_string()],
        }
    }

    /// Copy of this note with new content and a refreshed `updated_at`
    pub fn with_content(&self, content: String) -> Self {
        Self {
            content,
            updated_at: self.touched_at(),
            ..self.clone()
        }
    }

    /// Copy of this note with a new title and a refreshed `updated_at`
    pub fn with_title(&self, title: String) -> Self {
        Self {
            title,
            updated_at: self.touched_at(),
            ..self.clone()
        }
    }

    /// The fields a remote store needs to create this note
    pub fn draft(&self) -> NoteDraft {
        NoteDraft {
            title: self.title.clone(),
            content: self.content.clone(),
            tags: self.tags.clone(),
        }
    }

    /// Case-insensitive substring match over title and content
    pub fn matches(&self, query: &str) -> bool {
        let query = query.to_lowercase();
        self.title.to_lowercase().contains(&query) || self.content.to_lowercase().contains(&query)
    }

    pub fn stats(&self) -> NoteStats {
        NoteStats::of(&self.content)
    }

    // Keeps updated_at >= created_at even if the clock went backwards.
    fn touched_at(&self) -> i64 {
        now_millis().max(self.created_at)
    }
}

/// Fields sent to the remote store when creating a note. The server assigns
/// the id and both timestamps.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct NoteDraft {
    pub title: String,
    pub content: String,
    pub tags: Vec<String>,
}

impl NoteDraft {
    pub fn untitled() -> Self {
        Self {
            title: UNTITLED_TITLE.to_string(),
            ..Self::default()
        }
    }
}

/// Character and word counts of a note body
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Default)]
pub struct NoteStats {
    pub chars: usize,
    pub words: usize,
}

impl NoteStats {
    pub fn of(content: &str) -> Self {
        let text = content.trim();
        Self {
            chars: text.chars().count(),
            words: text.split_whitespace().count(),
        }
    }
}
