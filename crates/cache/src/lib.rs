//! Content-addressed artifact cache
//!
//! Converted assets and compiled binaries are stored under a BLAKE3 key derived from
//! the content that produced them. Every entry carries an expiration; expired entries
//! are dropped when they are read, never by a background task.

mod entry;
mod key;
mod storage;
mod store;

pub use entry::CacheEntry;
pub use key::{CacheKey, Hash32, KeyBuilder};
pub use storage::{FileBackedStorage, InMemoryStorage, Storage, StorageError};
pub use store::{ArtifactCache, CacheError, Result, Store, DEFAULT_TTL};
