//! Content sniffing, classification and pre-conversion validation of media files.

use std::path::Path;

use image::GenericImageView;
use thiserror::Error;

/// Inclusive per-side bounds for textures.
pub const MIN_TEXTURE_SIZE: u32 = 3;
pub const MAX_TEXTURE_SIZE: u32 = 1024;

pub const TEXTURE_MIMES: [&str; 2] = ["image/png", "image/jpeg"];
pub const FONT_MIMES: [&str; 3] = ["application/font-sfnt", "font/ttf", "font/otf"];

pub const TEXTURE_EXTENSION: &str = "t3x";
pub const FONT_EXTENSION: &str = "bcfnt";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MediaError {
    #[error("{name}: file is empty")]
    Empty { name: String },

    #[error("{name}: could not decode image: {reason}")]
    CorruptTexture { name: String, reason: String },

    #[error("{name}: texture {side} is {size}px, below the minimum of {min}px")]
    TextureTooSmall { name: String, side: &'static str, size: u32, min: u32 },

    #[error("{name}: texture {side} is {size}px, above the maximum of {max}px")]
    TextureTooLarge { name: String, side: &'static str, size: u32, max: u32 },

    #[error("{name}: could not load font face: {reason}")]
    InvalidFont { name: String, reason: String },

    #[error("{name}: unsupported media type {mime}")]
    Unsupported { name: String, mime: String },
}

/// Classification computed once at ingestion and carried as data afterwards.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Texture,
    Font,
    Opaque,
    Unsupported,
}

impl MediaKind {
    pub fn classify(mime: Option<&str>) -> Self {
        let Some(mime) = mime else {
            return MediaKind::Opaque;
        };
        if TEXTURE_MIMES.contains(&mime) {
            MediaKind::Texture
        } else if FONT_MIMES.contains(&mime) {
            MediaKind::Font
        } else if mime.starts_with("image/") || mime.starts_with("font/") || mime.starts_with("application/font-") {
            MediaKind::Unsupported
        } else {
            MediaKind::Opaque
        }
    }

    pub fn is_convertible(&self) -> bool {
        matches!(self, MediaKind::Texture | MediaKind::Font)
    }

    /// Extension of the transcoded output, for convertible kinds.
    pub fn converted_extension(&self) -> Option<&'static str> {
        match self {
            MediaKind::Texture => Some(TEXTURE_EXTENSION),
            MediaKind::Font => Some(FONT_EXTENSION),
            _ => None,
        }
    }
}

/// Media type from magic bytes; the file name is never consulted.
pub fn sniff_mime(bytes: &[u8]) -> Option<&'static str> {
    infer::get(bytes).map(|kind| kind.mime_type())
}

/// A named blob classified by its content.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Asset {
    pub name: String,
    pub bytes: Vec<u8>,
    pub mime: Option<&'static str>,
    pub kind: MediaKind,
}

impl Asset {
    pub fn sniff(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let mime = sniff_mime(&bytes);
        Self {
            name: name.into(),
            kind: MediaKind::classify(mime),
            mime,
            bytes,
        }
    }

    pub fn is_convertible(&self) -> bool {
        self.kind.is_convertible()
    }

    /// Output name after conversion: last extension swapped, directories kept.
    pub fn converted_name(&self) -> Option<String> {
        self.kind
            .converted_extension()
            .map(|ext| converted_name(&self.name, ext))
    }

    pub fn validate(&self) -> Result<(), MediaError> {
        validate_asset(&self.name, self.kind, self.mime, &self.bytes)
    }
}

/// The transcoded form of a convertible asset.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConvertedAsset {
    pub source_name: String,
    pub name: String,
    pub bytes: Vec<u8>,
}

pub fn converted_name(name: &str, extension: &str) -> String {
    let path = Path::new(name);
    match path.extension() {
        Some(_) => path.with_extension(extension).to_string_lossy().replace('\\', "/"),
        None => format!("{name}.{extension}"),
    }
}

/// Whether `name` already carries a converted-asset extension.
pub fn is_converted_name(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case(TEXTURE_EXTENSION) || e.eq_ignore_ascii_case(FONT_EXTENSION))
        .unwrap_or(false)
}

pub fn validate_texture(name: &str, bytes: &[u8]) -> Result<(), MediaError> {
    if bytes.is_empty() {
        return Err(MediaError::Empty { name: name.to_string() });
    }

    let image = image::load_from_memory(bytes).map_err(|e| MediaError::CorruptTexture {
        name: name.to_string(),
        reason: e.to_string(),
    })?;
    let (width, height) = image.dimensions();

    for (side, size) in [("width", width), ("height", height)] {
        if size < MIN_TEXTURE_SIZE {
            return Err(MediaError::TextureTooSmall {
                name: name.to_string(),
                side,
                size,
                min: MIN_TEXTURE_SIZE,
            });
        }
        if size > MAX_TEXTURE_SIZE {
            return Err(MediaError::TextureTooLarge {
                name: name.to_string(),
                side,
                size,
                max: MAX_TEXTURE_SIZE,
            });
        }
    }
    Ok(())
}

pub fn validate_font(name: &str, bytes: &[u8]) -> Result<(), MediaError> {
    if bytes.is_empty() {
        return Err(MediaError::Empty { name: name.to_string() });
    }
    ttf_parser::Face::parse(bytes, 0)
        .map(|_| ())
        .map_err(|e| MediaError::InvalidFont {
            name: name.to_string(),
            reason: e.to_string(),
        })
}

pub fn validate_asset(
    name: &str,
    kind: MediaKind,
    mime: Option<&str>,
    bytes: &[u8],
) -> Result<(), MediaError> {
    match kind {
        MediaKind::Texture => validate_texture(name, bytes),
        MediaKind::Font => validate_font(name, bytes),
        MediaKind::Unsupported => Err(MediaError::Unsupported {
            name: name.to_string(),
            mime: mime.unwrap_or("unknown").to_string(),
        }),
        MediaKind::Opaque => Ok(()),
    }
}
