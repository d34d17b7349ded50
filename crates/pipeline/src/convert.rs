//! Conversion client: textures and fonts for targets that need them pre-transcoded.

use std::sync::Arc;

use bundle::{Asset, ConvertedAsset, MediaError};
use cache::{ArtifactCache, CacheError, CacheKey, Storage, Store};
use tracing::{info, warn};

use crate::error::{PipelineError, Result};
use crate::exec::with_cache_blocking;
use crate::remote::{ConvertRequest, ConvertService};

#[derive(Clone, Debug, Default)]
pub struct ConversionOutcome {
    /// Sorted by output name.
    pub assets: Vec<ConvertedAsset>,
    pub log: Option<String>,
    /// Served from the cache.
    pub cached: usize,
    /// Returned by the remote service in this run.
    pub converted: usize,
}

pub struct ConversionClient<S: Storage> {
    cache: Arc<ArtifactCache<S>>,
    service: Arc<dyn ConvertService>,
}

impl<S: Storage + 'static> ConversionClient<S> {
    pub fn new(cache: Arc<ArtifactCache<S>>, service: Arc<dyn ConvertService>) -> Self {
        Self { cache, service }
    }

    /// Serve what is cached, send the rest in one request.
    ///
    /// Takes the output of [`validate_assets`]. Nothing goes over the network when every
    /// asset is cached.
    pub async fn convert(&self, assets: Vec<Asset>) -> Result<ConversionOutcome> {
        if assets.is_empty() {
            return Ok(ConversionOutcome::default());
        }

        let keyed: Vec<(CacheKey, Asset)> = assets
            .into_iter()
            .map(|a| (CacheKey::of_asset(&a.bytes), a))
            .collect();

        let (mut done, uncached) = with_cache_blocking(self.cache.clone(), move |cache| {
            let mut hits = Vec::new();
            let mut misses = Vec::new();
            for (key, asset) in keyed {
                match cache.get(Store::Assets, &key)? {
                    Some(bytes) => hits.push(converted(&asset, bytes)),
                    None => misses.push((key, asset)),
                }
            }
            Ok::<_, CacheError>((hits, misses))
        })
        .await??;

        let cached = done.len();
        if uncached.is_empty() {
            info!(cached, "conversion: all assets served from cache");
            done.sort_by(|a, b| a.name.cmp(&b.name));
            return Ok(ConversionOutcome {
                assets: done,
                log: None,
                cached,
                converted: 0,
            });
        }

        let request = ConvertRequest {
            files: uncached
                .iter()
                .map(|(_, a)| (a.name.clone(), a.bytes.clone()))
                .collect(),
        };
        let response = self.service.convert(request).await?;

        if !matches!(response.status, 200 | 206) {
            return Err(PipelineError::ConversionFailed {
                status: response.status,
                message: response
                    .message
                    .or(response.log)
                    .unwrap_or_else(|| "no details".to_string()),
            });
        }

        let mut writes = Vec::new();
        for (key, asset) in uncached {
            let name = output_name(&asset);
            match response.files.get(&name) {
                Some(bytes) => {
                    writes.push((key, bytes.clone()));
                    done.push(converted(&asset, bytes.clone()));
                }
                None => warn!(file = %asset.name, "conversion: not returned by service"),
            }
        }

        let converted_count = writes.len();
        with_cache_blocking(self.cache.clone(), move |cache| {
            for (key, bytes) in &writes {
                cache.set(Store::Assets, key, bytes)?;
            }
            Ok::<_, CacheError>(())
        })
        .await??;

        info!(cached, converted = converted_count, "conversion: done");
        done.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(ConversionOutcome {
            assets: done,
            log: response.log,
            cached,
            converted: converted_count,
        })
    }
}

/// Keep the convertible assets and check each one locally. The first bad asset fails the batch.
pub async fn validate_assets(assets: &[Asset]) -> Result<Vec<Asset>> {
    let assets: Vec<Asset> = assets.iter().filter(|a| a.is_convertible()).cloned().collect();
    let assets = tokio::task::spawn_blocking(move || {
        for asset in &assets {
            asset.validate()?;
        }
        Ok::<_, MediaError>(assets)
    })
    .await??;
    Ok(assets)
}

fn output_name(asset: &Asset) -> String {
    asset.converted_name().unwrap_or_else(|| asset.name.clone())
}

fn converted(asset: &Asset, bytes: Vec<u8>) -> ConvertedAsset {
    ConvertedAsset {
        source_name: asset.name.clone(),
        name: output_name(asset),
        bytes,
    }
}
