//! Package fuser: turns build results and asset sets into the final zip.

use std::collections::BTreeMap;
use std::io::{Cursor, Write};

use bundle::{Bundle, ConvertedAsset, Target};
use tracing::{debug, info};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::compile::{BuildResult, CompileOutcome};
use crate::convert::ConversionOutcome;
use crate::error::Result;

pub const COMPILE_LOG: &str = "compile.log";
pub const CONVERT_LOG: &str = "convert.log";

pub struct ArchiveWriter {
    inner: ZipWriter<Cursor<Vec<u8>>>,
}

impl ArchiveWriter {
    pub fn new() -> Self {
        Self {
            inner: ZipWriter::new(Cursor::new(Vec::new())),
        }
    }

    pub fn add(&mut self, name: &str, bytes: &[u8]) -> Result<()> {
        let options = FileOptions::default().compression_method(CompressionMethod::Deflated);
        self.inner.start_file(name, options)?;
        self.inner.write_all(bytes)?;
        Ok(())
    }

    pub fn finish(mut self) -> Result<Vec<u8>> {
        Ok(self.inner.finish()?.into_inner())
    }
}

impl Default for ArchiveWriter {
    fn default() -> Self {
        Self::new()
    }
}

/// The game content for one target: source files plus the right flavour of assets.
pub fn target_files<'a>(
    target: Target,
    bundle: &'a Bundle,
    converted: &'a [ConvertedAsset],
) -> Vec<(&'a str, &'a [u8])> {
    let mut files: Vec<(&str, &[u8])> = bundle
        .sources()
        .iter()
        .map(|a| (a.name.as_str(), a.bytes.as_slice()))
        .collect();

    if target.requires_conversion() {
        files.extend(converted.iter().map(|a| (a.name.as_str(), a.bytes.as_slice())));
    } else {
        files.extend(bundle.assets().iter().map(|a| (a.name.as_str(), a.bytes.as_slice())));
    }
    files
}

pub fn asset_archive(files: &[(&str, &[u8])]) -> Result<Vec<u8>> {
    let mut writer = ArchiveWriter::new();
    for (name, bytes) in files {
        writer.add(name, bytes)?;
    }
    writer.finish()
}

/// Output file name for a fused binary; path separators in the title are replaced.
pub fn fused_name(title: &str, target: Target) -> String {
    let title: String = title
        .chars()
        .map(|c| if matches!(c, '/' | '\\') { '_' } else { c })
        .collect();
    format!("{title}.{}", target.binary_extension())
}

#[derive(Clone, Debug, Default)]
pub struct FusedOutput {
    pub archive: Vec<u8>,
    pub delivered: Vec<Target>,
    /// Targets left out, with the reason.
    pub omitted: BTreeMap<Target, String>,
}

/// Loose mode: one `<target>-assets.zip` per target, no binaries.
pub fn fuse_loose(bundle: &Bundle, conversion: Option<&ConversionOutcome>) -> Result<FusedOutput> {
    let converted = conversion.map(|c| c.assets.as_slice()).unwrap_or_default();

    let mut out = ArchiveWriter::new();
    let mut delivered = Vec::new();
    for &target in bundle.targets() {
        let nested = asset_archive(&target_files(target, bundle, converted))?;
        out.add(&format!("{target}-assets.zip"), &nested)?;
        delivered.push(target);
    }
    if let Some(log) = conversion.and_then(|c| c.log.as_deref()) {
        out.add(CONVERT_LOG, log.as_bytes())?;
    }

    info!(targets = delivered.len(), "fuse: loose archive written");
    Ok(FusedOutput {
        archive: out.finish()?,
        delivered,
        omitted: BTreeMap::new(),
    })
}

/// Packaged mode: `<title>.<ext>` = binary bytes followed by the content zip.
/// Failed targets are omitted; the logs say why.
pub fn fuse_packaged(
    bundle: &Bundle,
    compile: &CompileOutcome,
    conversion: Option<&ConversionOutcome>,
) -> Result<FusedOutput> {
    let converted = conversion.map(|c| c.assets.as_slice()).unwrap_or_default();
    let title = &bundle.manifest().metadata().title;

    let mut out = ArchiveWriter::new();
    let mut delivered = Vec::new();
    let mut omitted = BTreeMap::new();
    for &target in bundle.targets() {
        let binary = match compile.results.get(&target) {
            Some(BuildResult::Success(binary)) => binary,
            Some(BuildResult::Failure(reason)) => {
                omitted.insert(target, reason.clone());
                continue;
            }
            None => {
                omitted.insert(target, "no build result".to_string());
                continue;
            }
        };

        let nested = asset_archive(&target_files(target, bundle, converted))?;
        let mut fused = Vec::with_capacity(binary.len() + nested.len());
        fused.extend_from_slice(binary);
        fused.extend_from_slice(&nested);

        let name = fused_name(title, target);
        debug!(target = %target, file = %name, size = fused.len(), "fuse: packaged");
        out.add(&name, &fused)?;
        delivered.push(target);
    }

    out.add(COMPILE_LOG, compile.log_text().as_bytes())?;
    if let Some(log) = conversion.and_then(|c| c.log.as_deref()) {
        out.add(CONVERT_LOG, log.as_bytes())?;
    }

    info!(delivered = delivered.len(), omitted = omitted.len(), "fuse: packaged archive written");
    Ok(FusedOutput {
        archive: out.finish()?,
        delivered,
        omitted,
    })
}
