mod local_cache;

pub use local_cache::{CacheError, FileCache, MemoryCache, NoteCache, DEFAULT_STORAGE_KEY};
