//! Archive inspection: turns uploaded zip bytes into a resolved [`Bundle`].

use std::collections::{BTreeMap, BTreeSet};
use std::io::{Cursor, Read};

use thiserror::Error;
use tracing::{debug, info};

use crate::ignore::IgnoreRules;
use crate::manifest::{Manifest, ManifestError};
use crate::media::{is_converted_name, Asset};
use crate::target::Target;

/// Upper bound on the up-front buffer for one entry.
const MAX_SIZE_HINT: u64 = 16 << 20;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BundleError {
    #[error("Failed to read bundle: {0}")]
    InvalidArchive(String),

    #[error("The uploaded zip file is empty")]
    EmptyArchive,

    #[error("No configuration file ({}) found", Manifest::FILENAME)]
    NoConfigFile,

    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error("Source folder `{0}` not found in bundle")]
    SourceFolderNotFound(String),

    #[error("Failed to read `{name}`: {reason}")]
    Entry { name: String, reason: String },
}

/// Icon resolution for one target that declared a custom icon.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IconSlot {
    Custom(Vec<u8>),
    /// Declared in the manifest but absent from the archive.
    Missing { path: String },
}

/// Resolved view of an uploaded archive. Lives for one pipeline run.
#[derive(Clone, Debug)]
pub struct Bundle {
    manifest: Manifest,
    icons: BTreeMap<Target, IconSlot>,
    sources: Vec<Asset>,
    assets: Vec<Asset>,
}

impl Bundle {
    /// Fails closed on the first structural problem.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, BundleError> {
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
            .map_err(|e| BundleError::InvalidArchive(e.to_string()))?;

        if archive.len() == 0 {
            return Err(BundleError::EmptyArchive);
        }

        let mut names = BTreeSet::new();
        let mut files = BTreeMap::new();
        for i in 0..archive.len() {
            let mut entry = archive
                .by_index(i)
                .map_err(|e| BundleError::InvalidArchive(e.to_string()))?;
            let name = entry.name().to_string();
            names.insert(name.clone());
            if entry.is_dir() {
                continue;
            }

            // declared sizes come from the upload; only a bounded hint is trusted
            let mut buf = Vec::with_capacity(entry.size().min(MAX_SIZE_HINT) as usize);
            entry.read_to_end(&mut buf).map_err(|e| BundleError::Entry {
                name: name.clone(),
                reason: e.to_string(),
            })?;
            files.insert(name, buf);
        }

        let manifest_bytes = files.get(Manifest::FILENAME).ok_or(BundleError::NoConfigFile)?;
        let text = std::str::from_utf8(manifest_bytes)
            .map_err(|e| ManifestError::InvalidContent(e.to_string()))?;
        let manifest = Manifest::parse(text)?;

        let ignore = match files.get(IgnoreRules::FILENAME) {
            Some(content) => IgnoreRules::new(&String::from_utf8_lossy(content)),
            None => IgnoreRules::defaults(),
        };

        let prefix = manifest.source_prefix();
        if !names.iter().any(|n| n.starts_with(&prefix)) {
            return Err(BundleError::SourceFolderNotFound(manifest.build().source.clone()));
        }

        let mut icons = BTreeMap::new();
        for &target in &manifest.build().targets {
            let Some(path) = manifest.icon_path(target) else { continue };
            let path = path.trim_start_matches("./");
            let slot = match files.get(path) {
                Some(bytes) => IconSlot::Custom(bytes.clone()),
                None => IconSlot::Missing { path: path.to_string() },
            };
            icons.insert(target, slot);
        }

        let mut sources = Vec::new();
        let mut assets = Vec::new();
        for (name, bytes) in files {
            let Some(relative) = name.strip_prefix(&prefix) else { continue };
            if relative.is_empty() || ignore.is_ignored(&name) {
                continue;
            }
            if is_converted_name(relative) {
                debug!(file = %name, "bundle: dropping previously converted file");
                continue;
            }

            let asset = Asset::sniff(relative, bytes);
            if asset.is_convertible() {
                assets.push(asset);
            } else {
                sources.push(asset);
            }
        }

        info!(
            title = %manifest.metadata().title,
            sources = sources.len(),
            assets = assets.len(),
            "bundle: inspected"
        );

        Ok(Self {
            manifest,
            icons,
            sources,
            assets,
        })
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    pub fn targets(&self) -> &BTreeSet<Target> {
        &self.manifest.build().targets
    }

    pub fn is_packaged(&self) -> bool {
        self.manifest.build().packaged
    }

    /// `None` means the target uses its default icon.
    pub fn icon(&self, target: Target) -> Option<&IconSlot> {
        self.icons.get(&target)
    }

    /// Opaque files, shipped as-is.
    pub fn sources(&self) -> &[Asset] {
        &self.sources
    }

    /// Textures and fonts.
    pub fn assets(&self) -> &[Asset] {
        &self.assets
    }
}
