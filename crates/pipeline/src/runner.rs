use std::collections::BTreeMap;
use std::sync::Arc;

use bundle::{Bundle, Target};
use cache::{ArtifactCache, Storage};
use tracing::info;

use crate::compile::{CompileClient, CompileOutcome};
use crate::convert::{validate_assets, ConversionClient, ConversionOutcome};
use crate::error::Result;
use crate::fuse::{fuse_loose, fuse_packaged};
use crate::remote::{CompileService, ConvertService};

#[derive(Clone, Debug)]
pub struct BundleOutput {
    /// The final zip.
    pub archive: Vec<u8>,
    pub delivered: Vec<Target>,
    pub failed: BTreeMap<Target, String>,
    pub compile: Option<CompileOutcome>,
    pub conversion: Option<ConversionOutcome>,
}

/// One upload in, one zip out. The cache is shared across runs.
pub struct Bundler<S: Storage> {
    conversion: ConversionClient<S>,
    compile: CompileClient<S>,
}

impl<S: Storage + 'static> Bundler<S> {
    pub fn new(
        cache: Arc<ArtifactCache<S>>,
        compile: Arc<dyn CompileService>,
        convert: Arc<dyn ConvertService>,
    ) -> Self {
        Self {
            conversion: ConversionClient::new(cache.clone(), convert),
            compile: CompileClient::new(cache, compile),
        }
    }

    pub async fn run(&self, archive: Vec<u8>) -> Result<BundleOutput> {
        let bundle = tokio::task::spawn_blocking(move || Bundle::from_bytes(&archive)).await??;

        let needs_conversion =
            bundle.targets().iter().any(Target::requires_conversion) && !bundle.assets().is_empty();

        // media is checked before either service is contacted
        let to_convert = if needs_conversion {
            Some(validate_assets(bundle.assets()).await?)
        } else {
            None
        };

        let conversion_client = &self.conversion;
        let convert = async move {
            match to_convert {
                Some(assets) => conversion_client.convert(assets).await.map(Some),
                None => Ok(None),
            }
        };

        let (fused, compile, conversion) = if bundle.is_packaged() {
            let (conversion, compile) = tokio::join!(convert, self.compile.compile(&bundle));
            let (conversion, compile) = (conversion?, compile?);
            let fused = fuse_packaged(&bundle, &compile, conversion.as_ref())?;
            (fused, Some(compile), conversion)
        } else {
            let conversion = convert.await?;
            let fused = fuse_loose(&bundle, conversion.as_ref())?;
            (fused, None, conversion)
        };

        info!(
            title = %bundle.manifest().metadata().title,
            delivered = fused.delivered.len(),
            failed = fused.omitted.len(),
            "bundle: run complete"
        );

        Ok(BundleOutput {
            archive: fused.archive,
            delivered: fused.delivered,
            failed: fused.omitted,
            compile,
            conversion,
        })
    }
}
