//! Bundle one project archive against remote compile/convert services.
//!
//! Usage: `bundle-demo <project.zip> <output.zip>`

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use cache::{ArtifactCache, FileBackedStorage};
use pipeline::{Bundler, ClientConfig, HttpCompileService, HttpConvertService};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let mut args = std::env::args().skip(1);
    let (Some(input), Some(output)) = (args.next(), args.next()) else {
        bail!("usage: bundle-demo <project.zip> <output.zip>");
    };

    let cfg = ClientConfig::from_env()?;
    let storage = FileBackedStorage::open(&cfg.cache_dir)
        .with_context(|| format!("Failed to open cache at {}", cfg.cache_dir.display()))?;
    let cache = Arc::new(ArtifactCache::with_ttl(storage, cfg.cache_ttl)?);
    let purged = cache.purge_expired()?;
    if purged > 0 {
        info!(purged, "cache: dropped expired entries");
    }

    let bundler = Bundler::new(
        cache,
        Arc::new(HttpCompileService::new(cfg.compile_url.clone())),
        Arc::new(HttpConvertService::new(cfg.convert_url.clone())),
    );

    let archive = tokio::fs::read(&input)
        .await
        .with_context(|| format!("Failed to read {input}"))?;
    let out = bundler.run(archive).await?;

    tokio::fs::write(&output, &out.archive)
        .await
        .with_context(|| format!("Failed to write {output}"))?;

    for target in &out.delivered {
        info!("delivered {target}");
    }
    for (target, reason) in &out.failed {
        warn!("{target} failed: {reason}");
    }
    info!("wrote {output} ({} bytes)", out.archive.len());
    Ok(())
}
