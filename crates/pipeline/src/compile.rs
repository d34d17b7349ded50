//! Compile client: per-target binaries, cached by manifest text and icon.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use bundle::{validate_icon, Aggregate, Bundle, IconError, IconSlot, Manifest, Target};
use cache::{ArtifactCache, CacheError, CacheKey, KeyBuilder, Storage, Store};
use tracing::{info, warn};

use crate::error::Result;
use crate::exec::with_cache_blocking;
use crate::remote::{CompileRequest, CompileService};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BuildResult {
    Success(Vec<u8>),
    Failure(String),
}

impl BuildResult {
    pub fn is_success(&self) -> bool {
        matches!(self, BuildResult::Success(_))
    }

    pub fn binary(&self) -> Option<&[u8]> {
        match self {
            BuildResult::Success(bytes) => Some(bytes),
            BuildResult::Failure(_) => None,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct CompileOutcome {
    pub results: BTreeMap<Target, BuildResult>,
    /// Log returned by the compile service, if it was called.
    pub log: Option<String>,
    pub cached: BTreeSet<Target>,
}

impl CompileOutcome {
    pub fn aggregate(&self) -> Aggregate<Target> {
        let succeeded = self.results.iter().filter(|(_, r)| r.is_success()).map(|(t, _)| *t).collect();
        let failed = self.results.iter().filter(|(_, r)| !r.is_success()).map(|(t, _)| *t).collect();
        Aggregate::from_parts(succeeded, failed)
    }

    /// Service log followed by one line per failed target.
    pub fn log_text(&self) -> String {
        let mut lines: Vec<String> = self.log.iter().cloned().collect();
        for (target, result) in &self.results {
            match result {
                BuildResult::Failure(reason) => lines.push(format!("{target}: FAILED: {reason}")),
                BuildResult::Success(_) if self.cached.contains(target) => {
                    lines.push(format!("{target}: served from cache"))
                }
                BuildResult::Success(_) => {}
            }
        }
        lines.join("\n")
    }
}

/// Key of a target binary: manifest text, target, and the custom icon if any.
pub fn binary_key(manifest: &Manifest, target: Target, icon: Option<&[u8]>) -> CacheKey {
    KeyBuilder::new("binary")
        .part(manifest.text().as_bytes())
        .part(target.name().as_bytes())
        .part(icon.unwrap_or_default())
        .finish()
}

pub struct CompileClient<S: Storage> {
    cache: Arc<ArtifactCache<S>>,
    service: Arc<dyn CompileService>,
}

impl<S: Storage + 'static> CompileClient<S> {
    pub fn new(cache: Arc<ArtifactCache<S>>, service: Arc<dyn CompileService>) -> Self {
        Self { cache, service }
    }

    /// Icons are validated before the cache is consulted, so the outcome never depends
    /// on cache state. Only a failed network call is an `Err`; target failures are data.
    pub async fn compile(&self, bundle: &Bundle) -> Result<CompileOutcome> {
        let mut outcome = CompileOutcome::default();

        let slots: Vec<(Target, Option<IconSlot>)> = bundle
            .targets()
            .iter()
            .map(|t| (*t, bundle.icon(*t).cloned()))
            .collect();

        let checked = tokio::task::spawn_blocking(move || {
            slots
                .into_iter()
                .map(|(target, slot)| {
                    let icon = match slot {
                        None => Ok(None),
                        Some(IconSlot::Missing { path }) => Err(IconError::NotFound { target, path }),
                        Some(IconSlot::Custom(bytes)) => validate_icon(target, &bytes).map(|_| Some(bytes)),
                    };
                    (target, icon)
                })
                .collect::<Vec<_>>()
        })
        .await?;

        let mut pending = Vec::new();
        for (target, icon) in checked {
            match icon {
                Ok(icon) => {
                    let key = binary_key(bundle.manifest(), target, icon.as_deref());
                    pending.push((target, key, icon));
                }
                Err(e) => {
                    warn!(target = %target, "compile: icon rejected: {e}");
                    outcome.results.insert(target, BuildResult::Failure(e.to_string()));
                }
            }
        }

        let lookups: Vec<CacheKey> = pending.iter().map(|(_, key, _)| *key).collect();
        let hits = with_cache_blocking(self.cache.clone(), move |cache| {
            lookups
                .iter()
                .map(|key| cache.get(Store::Binaries, key))
                .collect::<std::result::Result<Vec<_>, CacheError>>()
        })
        .await??;

        let mut outbound = Vec::new();
        for ((target, key, icon), hit) in pending.into_iter().zip(hits) {
            match hit {
                Some(binary) => {
                    outcome.results.insert(target, BuildResult::Success(binary));
                    outcome.cached.insert(target);
                }
                None => outbound.push((target, key, icon)),
            }
        }

        if outbound.is_empty() {
            info!(cached = outcome.cached.len(), "compile: nothing to build");
            return Ok(outcome);
        }

        let metadata = bundle.manifest().metadata();
        let request = CompileRequest {
            title: metadata.title.clone(),
            author: metadata.author.clone(),
            description: metadata.description.clone(),
            version: metadata.version.clone(),
            targets: outbound.iter().map(|(t, _, _)| *t).collect(),
            icons: outbound
                .iter()
                .filter_map(|(t, _, icon)| icon.clone().map(|bytes| (*t, bytes)))
                .collect(),
        };

        let response = self.service.compile(request).await?;
        outcome.log = response.log.clone();

        let mut writes = Vec::new();
        for (target, key, _) in outbound {
            let result = match response.files.get(target.name()) {
                Some(binary) if response.is_success() => {
                    writes.push((key, binary.clone()));
                    BuildResult::Success(binary.clone())
                }
                _ if !response.is_success() => BuildResult::Failure(format!(
                    "compile service responded {}: {}",
                    response.status,
                    response.message.as_deref().unwrap_or("no details")
                )),
                _ => BuildResult::Failure("not returned by compile service".to_string()),
            };
            if let BuildResult::Failure(reason) = &result {
                warn!(target = %target, "compile: {reason}");
            }
            outcome.results.insert(target, result);
        }

        with_cache_blocking(self.cache.clone(), move |cache| {
            for (key, binary) in &writes {
                cache.set(Store::Binaries, key, binary)?;
            }
            Ok::<_, CacheError>(())
        })
        .await??;

        let agg = outcome.aggregate();
        info!(
            succeeded = agg.succeeded().len(),
            failed = agg.failed().len(),
            cached = outcome.cached.len(),
            "compile: done"
        );
        Ok(outcome)
    }
}
