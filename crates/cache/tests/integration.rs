use std::time::Duration;

use cache::{
    ArtifactCache, CacheKey, FileBackedStorage, InMemoryStorage, KeyBuilder, Storage, Store, DEFAULT_TTL,
};
use chrono::Utc;
use rand::Rng;

#[test]
fn test_basic_set_get() {
    let cache = ArtifactCache::open(InMemoryStorage::new());
    let key = CacheKey::of_asset(b"texture bytes");

    cache.set(Store::Assets, &key, b"converted").unwrap();

    assert_eq!(cache.get(Store::Assets, &key).unwrap(), Some(b"converted".to_vec()));
}

#[test]
fn test_open_uses_default_ttl() {
    let cache = ArtifactCache::open(InMemoryStorage::new());
    assert_eq!(cache.ttl().to_std().unwrap(), DEFAULT_TTL);

    let now = Utc::now();
    let entry = cache
        .set_at(Store::Assets, &CacheKey::of_asset(b"ttl"), b"artifact", now)
        .unwrap();
    assert_eq!(entry.expiration, now + chrono::Duration::days(3));
}

#[test]
fn test_missing_key_is_absent() {
    let cache = ArtifactCache::open(InMemoryStorage::new());
    let key = CacheKey::of_asset(b"never written");

    assert_eq!(cache.get(Store::Assets, &key).unwrap(), None);
}

#[test]
fn test_stores_are_separate() {
    let cache = ArtifactCache::open(InMemoryStorage::new());
    let key = CacheKey::of_asset(b"shared");

    cache.set(Store::Binaries, &key, b"binary").unwrap();

    assert_eq!(cache.get(Store::Assets, &key).unwrap(), None);
    assert_eq!(cache.get(Store::Binaries, &key).unwrap(), Some(b"binary".to_vec()));
}

#[test]
fn test_entry_expires_lazily_on_read() {
    let storage = InMemoryStorage::new();
    let cache = ArtifactCache::open(storage.clone());
    let key = CacheKey::of_asset(b"old");

    let written = Utc::now() - chrono::Duration::days(4);
    cache.set_at(Store::Assets, &key, b"stale", written).unwrap();

    // still physically present until someone reads it
    assert_eq!(storage.len(), 1);

    assert_eq!(cache.get(Store::Assets, &key).unwrap(), None);
    assert!(storage.is_empty());
}

#[test]
fn test_entry_served_before_expiration() {
    let cache = ArtifactCache::open(InMemoryStorage::new());
    let key = CacheKey::of_asset(b"fresh");

    let written = Utc::now() - chrono::Duration::days(2);
    cache.set_at(Store::Assets, &key, b"still good", written).unwrap();

    assert_eq!(cache.get(Store::Assets, &key).unwrap(), Some(b"still good".to_vec()));
}

#[test]
fn test_expiration_boundary_is_exclusive() {
    let cache = ArtifactCache::with_ttl(InMemoryStorage::new(), Duration::from_secs(60)).unwrap();
    let key = CacheKey::of_asset(b"edge");
    let now = Utc::now();

    let entry = cache.set_at(Store::Binaries, &key, b"x", now).unwrap();

    assert!(cache.get_at(Store::Binaries, &key, entry.expiration - chrono::Duration::seconds(1)).unwrap().is_some());
    assert!(cache.get_at(Store::Binaries, &key, entry.expiration).unwrap().is_none());
}

#[test]
fn test_last_write_wins() {
    let cache = ArtifactCache::open(InMemoryStorage::new());
    let key = CacheKey::of_asset(b"k");

    cache.set(Store::Assets, &key, b"first").unwrap();
    cache.set(Store::Assets, &key, b"second").unwrap();

    assert_eq!(cache.get(Store::Assets, &key).unwrap(), Some(b"second".to_vec()));
}

#[test]
fn test_unreadable_entry_dropped() {
    let storage = InMemoryStorage::new();
    let cache = ArtifactCache::open(storage.clone());
    let key = CacheKey::of_asset(b"corrupt");

    cache.set(Store::Assets, &key, b"ok").unwrap();
    let raw_key = storage.keys().unwrap().pop().unwrap();
    storage.put(&raw_key, b"\x01").unwrap();

    assert_eq!(cache.get(Store::Assets, &key).unwrap(), None);
    assert!(storage.is_empty());
}

#[test]
fn test_purge_expired() {
    let cache = ArtifactCache::open(InMemoryStorage::new());
    let now = Utc::now();

    cache.set_at(Store::Assets, &CacheKey::of_asset(b"a"), b"1", now - chrono::Duration::days(5)).unwrap();
    cache.set_at(Store::Binaries, &CacheKey::of_asset(b"b"), b"2", now - chrono::Duration::days(4)).unwrap();
    cache.set_at(Store::Assets, &CacheKey::of_asset(b"c"), b"3", now).unwrap();

    assert_eq!(cache.purge_expired_at(now).unwrap(), 2);
    assert_eq!(cache.storage().len(), 1);
    assert!(cache.get(Store::Assets, &CacheKey::of_asset(b"c")).unwrap().is_some());
}

#[test]
fn test_clear() {
    let cache = ArtifactCache::open(InMemoryStorage::new());
    cache.set(Store::Assets, &CacheKey::of_asset(b"a"), b"1").unwrap();
    cache.set(Store::Binaries, &CacheKey::of_asset(b"b"), b"2").unwrap();

    assert_eq!(cache.clear().unwrap(), 2);
    assert!(cache.close().is_empty());
}

#[test]
fn test_file_backed_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let key = KeyBuilder::new("binary").part(b"manifest").part(b"ctr").finish();

    {
        let cache = ArtifactCache::open(FileBackedStorage::open(dir.path()).unwrap());
        cache.set(Store::Binaries, &key, b"3dsx bytes").unwrap();
    }

    let cache = ArtifactCache::open(FileBackedStorage::open(dir.path()).unwrap());
    assert_eq!(cache.get(Store::Binaries, &key).unwrap(), Some(b"3dsx bytes".to_vec()));
}

#[test]
fn test_file_backed_expired_entry_removed_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let storage = FileBackedStorage::open(dir.path()).unwrap();
    let cache = ArtifactCache::open(storage.clone());
    let key = CacheKey::of_asset(b"disk");

    cache.set_at(Store::Assets, &key, b"old", Utc::now() - chrono::Duration::days(10)).unwrap();
    assert_eq!(storage.keys().unwrap().len(), 1);

    assert!(cache.get(Store::Assets, &key).unwrap().is_none());
    assert!(storage.keys().unwrap().is_empty());
}

#[test]
fn test_file_backed_ignores_foreign_files() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("README.txt"), b"not a key").unwrap();
    let storage = FileBackedStorage::open(dir.path()).unwrap();

    assert!(storage.keys().unwrap().is_empty());
}

#[test]
fn test_concurrent_writers_same_key() {
    let cache = std::sync::Arc::new(ArtifactCache::open(InMemoryStorage::new()));
    let key = CacheKey::of_asset(b"dup request");

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let cache = cache.clone();
            std::thread::spawn(move || {
                cache.set(Store::Assets, &key, b"identical output").unwrap();
                cache.get(Store::Assets, &key).unwrap()
            })
        })
        .collect();

    for h in handles {
        assert_eq!(h.join().unwrap(), Some(b"identical output".to_vec()));
    }
}

#[test]
fn test_randomized_content_keys() {
    let cache = ArtifactCache::open(InMemoryStorage::new());
    let mut rng = rand::thread_rng();

    for _ in 0..50 {
        let len = rng.gen_range(0..256);
        let content: Vec<u8> = (0..len).map(|_| rng.gen()).collect();

        // byte-identical content resolves to the same key
        let key = CacheKey::of_asset(&content);
        assert_eq!(key, CacheKey::of_asset(&content.clone()));

        cache.set(Store::Assets, &key, &content).unwrap();
        assert_eq!(cache.get(Store::Assets, &key).unwrap(), Some(content));
    }
}
