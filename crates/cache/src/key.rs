use std::fmt;

use serde::{Deserialize, Serialize};

/// 32-byte hash
pub type Hash32 = [u8; 32];

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CacheKey(Hash32);

impl CacheKey {
    /// Key for a converted asset: governed only by the source bytes, never the file name.
    pub fn of_asset(bytes: &[u8]) -> Self {
        KeyBuilder::new("asset").part(bytes).finish()
    }

    pub fn as_bytes(&self) -> &Hash32 {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CacheKey({})", self.to_hex())
    }
}

/// Deterministic multi-part key:
/// - domain tag first, so asset and binary keys never collide
/// - each part is length-prefixed, so ("ab", "c") and ("a", "bc") differ
pub struct KeyBuilder {
    hasher: blake3::Hasher,
}

impl KeyBuilder {
    pub fn new(domain: &str) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(domain.as_bytes());
        hasher.update(b"\n");
        Self { hasher }
    }

    pub fn part(mut self, bytes: &[u8]) -> Self {
        self.hasher.update(&(bytes.len() as u64).to_le_bytes());
        self.hasher.update(bytes);
        self
    }

    pub fn finish(self) -> CacheKey {
        CacheKey(self.hasher.finalize().into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_asset_key_deterministic() {
        let a = CacheKey::of_asset(b"same bytes");
        let b = CacheKey::of_asset(b"same bytes");
        assert_eq!(a, b);
        assert_eq!(a.to_hex().len(), 64);
    }

    #[test]
    fn test_parts_are_length_prefixed() {
        let k1 = KeyBuilder::new("binary").part(b"ab").part(b"c").finish();
        let k2 = KeyBuilder::new("binary").part(b"a").part(b"bc").finish();
        assert_ne!(k1, k2);
    }

    #[test]
    fn test_domain_separates_keys() {
        let asset = CacheKey::of_asset(b"x");
        let binary = KeyBuilder::new("binary").part(b"x").finish();
        assert_ne!(asset, binary);
    }
}
