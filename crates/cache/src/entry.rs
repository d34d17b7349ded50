use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A cached artifact and the instant after which it must not be served.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct CacheEntry {
    pub artifact: Vec<u8>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub expiration: DateTime<Utc>,
}

impl CacheEntry {
    pub fn new(artifact: Vec<u8>, expiration: DateTime<Utc>) -> Self {
        Self { artifact, expiration }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expiration
    }
}
