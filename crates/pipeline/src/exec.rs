use std::sync::Arc;

use cache::{ArtifactCache, Storage};

/// Run blocking cache I/O off the async executor.
pub async fn with_cache_blocking<S, R, F>(
    cache: Arc<ArtifactCache<S>>,
    f: F,
) -> Result<R, tokio::task::JoinError>
where
    S: Storage + 'static,
    R: Send + 'static,
    F: FnOnce(&ArtifactCache<S>) -> R + Send + 'static,
{
    tokio::task::spawn_blocking(move || f(&cache)).await
}
