pub mod auth;
pub mod cache;
pub mod config;
pub mod notes;
pub mod remote;
pub mod sync;

pub use cache::{FileCache, MemoryCache, NoteCache};
pub use config::LumenConfig;
pub use notes::{Note, NoteDraft};
pub use remote::{RemoteNoteStore, UserId};
pub use sync::{Mutation, Reconciler, SyncState};
