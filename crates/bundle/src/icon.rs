use image::GenericImageView;
use thiserror::Error;

use crate::media::sniff_mime;
use crate::target::Target;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IconError {
    #[error("{target}: icon `{path}` not found in bundle")]
    NotFound { target: Target, path: String },

    #[error("{target}: icon media type could not be determined")]
    UnknownType { target: Target },

    #[error("{target}: icon could not be decoded: {reason}")]
    Corrupt { target: Target, reason: String },

    #[error("{target}: icon must be {expected}x{expected}, got {width}x{height}")]
    Dimensions { target: Target, expected: u32, width: u32, height: u32 },

    #[error("{target}: icon must be {expected}, got {found}")]
    Format { target: Target, expected: &'static str, found: &'static str },
}

impl IconError {
    pub fn target(&self) -> Target {
        match self {
            IconError::NotFound { target, .. }
            | IconError::UnknownType { target }
            | IconError::Corrupt { target, .. }
            | IconError::Dimensions { target, .. }
            | IconError::Format { target, .. } => *target,
        }
    }

    /// True for problems with the media type itself rather than the pixels.
    pub fn is_media_type(&self) -> bool {
        matches!(self, IconError::UnknownType { .. } | IconError::Format { .. })
    }
}

/// Check a custom icon for `target`. First failing check wins:
/// sniffable type → decodes → exact dimensions → expected format.
pub fn validate_icon(target: Target, bytes: &[u8]) -> Result<(), IconError> {
    let mime = sniff_mime(bytes).ok_or(IconError::UnknownType { target })?;

    let image = image::load_from_memory(bytes).map_err(|e| IconError::Corrupt {
        target,
        reason: e.to_string(),
    })?;

    let expected = target.icon_size();
    let (width, height) = image.dimensions();
    if width != expected || height != expected {
        return Err(IconError::Dimensions {
            target,
            expected,
            width,
            height,
        });
    }

    let format = target.icon_format();
    if mime != format.mime() {
        return Err(IconError::Format {
            target,
            expected: format.mime(),
            found: mime,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use image::{ImageFormat, RgbImage};

    use super::*;

    fn encode(size: u32, format: ImageFormat) -> Vec<u8> {
        let mut out = Cursor::new(Vec::new());
        RgbImage::new(size, size).write_to(&mut out, format).unwrap();
        out.into_inner()
    }

    #[test]
    fn test_valid_icons() {
        assert!(validate_icon(Target::Ctr, &encode(48, ImageFormat::Png)).is_ok());
        assert!(validate_icon(Target::Hac, &encode(256, ImageFormat::Jpeg)).is_ok());
        assert!(validate_icon(Target::Cafe, &encode(128, ImageFormat::Png)).is_ok());
    }

    #[test]
    fn test_wrong_dimensions_name_target() {
        for target in Target::ALL {
            let bytes = encode(target.icon_size() + 1, ImageFormat::Png);
            let err = validate_icon(target, &bytes).unwrap_err();
            assert!(matches!(err, IconError::Dimensions { .. }));
            assert_eq!(err.target(), target);
            assert!(err.to_string().starts_with(target.name()));
        }
    }

    #[test]
    fn test_dimensions_checked_before_format() {
        // wrong format and wrong size: size is reported
        let err = validate_icon(Target::Hac, &encode(48, ImageFormat::Png)).unwrap_err();
        assert!(matches!(err, IconError::Dimensions { .. }));
    }

    #[test]
    fn test_format_mismatch() {
        let err = validate_icon(Target::Hac, &encode(256, ImageFormat::Png)).unwrap_err();
        assert_eq!(
            err,
            IconError::Format {
                target: Target::Hac,
                expected: "image/jpeg",
                found: "image/png"
            }
        );
        assert!(err.is_media_type());
    }

    #[test]
    fn test_unsniffable_icon() {
        let err = validate_icon(Target::Ctr, b"definitely not an image").unwrap_err();
        assert_eq!(err, IconError::UnknownType { target: Target::Ctr });
    }
}
