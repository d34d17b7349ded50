//! Bundle inspection for lovebrew uploads
//!
//! Everything that can be decided from the uploaded bytes alone: target metadata,
//! manifest validation, media sniffing and validation, custom icon checks, ignore
//! rules, archive inspection and fan-out aggregation.

mod archive;
mod icon;
mod ignore;
mod manifest;
mod media;
mod outcome;
mod target;

pub use archive::{Bundle, BundleError, IconSlot};
pub use icon::{validate_icon, IconError};
pub use ignore::IgnoreRules;
pub use manifest::{Build, Manifest, ManifestError, Metadata};
pub use media::{
    converted_name, is_converted_name, sniff_mime, validate_asset, validate_font, validate_texture,
    Asset, ConvertedAsset, MediaError, MediaKind, FONT_EXTENSION, FONT_MIMES, MAX_TEXTURE_SIZE,
    MIN_TEXTURE_SIZE, TEXTURE_EXTENSION, TEXTURE_MIMES,
};
pub use outcome::Aggregate;
pub use target::{IconFormat, Target, UnknownTarget};
