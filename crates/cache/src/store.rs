use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, warn};

use crate::{CacheEntry, CacheKey, Storage, StorageError};

/// Entries live three days from the time they are written.
pub const DEFAULT_TTL: Duration = Duration::from_secs(3 * 24 * 60 * 60);

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("TTL out of range: {0:?}")]
    InvalidTtl(Duration),
}

pub type Result<T> = std::result::Result<T, CacheError>;

/// The two logical stores sharing one backing storage.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Store {
    /// Compiled per-target binaries, keyed by manifest text + target + icon.
    Binaries,
    /// Converted textures and fonts, keyed by their source bytes.
    Assets,
}

impl Store {
    fn prefix(&self) -> &'static [u8] {
        match self {
            Store::Binaries => b"binary:",
            Store::Assets => b"asset:",
        }
    }

    fn storage_key(&self, key: &CacheKey) -> Vec<u8> {
        let mut k = self.prefix().to_vec();
        k.extend_from_slice(key.as_bytes());
        k
    }
}

/// Lifecycle: `open` → get/set (expiry checked lazily on read) → `close`.
pub struct ArtifactCache<S: Storage> {
    storage: S,
    ttl: chrono::Duration,
}

impl<S: Storage> ArtifactCache<S> {
    pub fn open(storage: S) -> Self {
        Self {
            storage,
            ttl: chrono::Duration::seconds(DEFAULT_TTL.as_secs() as i64),
        }
    }

    pub fn with_ttl(storage: S, ttl: Duration) -> Result<Self> {
        let ttl = chrono::Duration::from_std(ttl).map_err(|_| CacheError::InvalidTtl(ttl))?;
        Ok(Self { storage, ttl })
    }

    pub fn ttl(&self) -> chrono::Duration {
        self.ttl
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn close(self) -> S {
        self.storage
    }

    pub fn get(&self, store: Store, key: &CacheKey) -> Result<Option<Vec<u8>>> {
        self.get_at(store, key, Utc::now())
    }

    /// Read an entry as of `now`; an expired or unreadable entry is deleted and reported absent.
    pub fn get_at(&self, store: Store, key: &CacheKey, now: DateTime<Utc>) -> Result<Option<Vec<u8>>> {
        let storage_key = store.storage_key(key);
        let Some(bytes) = self.storage.get(&storage_key)? else {
            return Ok(None);
        };

        let entry: CacheEntry = match bincode::deserialize(&bytes) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(key = %key, ?store, "cache: dropping unreadable entry: {e}");
                self.storage.delete(&storage_key)?;
                return Ok(None);
            }
        };

        if entry.is_expired_at(now) {
            debug!(key = %key, ?store, "cache: entry expired");
            self.storage.delete(&storage_key)?;
            return Ok(None);
        }

        Ok(Some(entry.artifact))
    }

    pub fn set(&self, store: Store, key: &CacheKey, artifact: &[u8]) -> Result<CacheEntry> {
        self.set_at(store, key, artifact, Utc::now())
    }

    /// Write an entry expiring `ttl` after `now`. Last write wins.
    pub fn set_at(
        &self,
        store: Store,
        key: &CacheKey,
        artifact: &[u8],
        now: DateTime<Utc>,
    ) -> Result<CacheEntry> {
        let entry = CacheEntry::new(artifact.to_vec(), now + self.ttl);
        let bytes = bincode::serialize(&entry).map_err(|e| CacheError::Serialization(e.to_string()))?;
        self.storage.put(&store.storage_key(key), &bytes)?;
        debug!(key = %key, ?store, size = artifact.len(), "cache: stored");
        Ok(entry)
    }

    pub fn purge_expired(&self) -> Result<usize> {
        self.purge_expired_at(Utc::now())
    }

    /// Caller-driven sweep; returns the number of entries removed.
    pub fn purge_expired_at(&self, now: DateTime<Utc>) -> Result<usize> {
        let mut removed = 0;
        for k in self.storage.keys()? {
            let Some(bytes) = self.storage.get(&k)? else { continue };
            let expired = match bincode::deserialize::<CacheEntry>(&bytes) {
                Ok(entry) => entry.is_expired_at(now),
                Err(_) => true,
            };
            if expired {
                self.storage.delete(&k)?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    pub fn clear(&self) -> Result<usize> {
        let keys = self.storage.keys()?;
        for k in &keys {
            self.storage.delete(k)?;
        }
        Ok(keys.len())
    }
}
