use serde::{Deserialize, Serialize};
use std::fmt;

/// Image container formats that can carry generation metadata.
///
/// Detected from magic bytes with [`detect_format`], never from file extensions.
///
/// # Example
///
/// ```rust
/// use sd_parsers::format::{detect_format, ImageFormat};
///
/// let png = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
/// assert_eq!(detect_format(&png), Some(ImageFormat::Png));
/// assert_eq!(detect_format(&[0, 0, 0, 0]), None);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ImageFormat {
    /// PNG: text chunks, density info, stealth alpha
    Png,
    /// JPEG: EXIF UserComment
    Jpeg,
    /// WebP: EXIF UserComment in the RIFF `EXIF` chunk
    WebP,
}

impl ImageFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Png => "PNG",
            Self::Jpeg => "JPEG",
            Self::WebP => "WEBP",
        }
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Detect the image format from the first bytes of `buffer`.
///
/// First match wins, checked in the order PNG, JPEG, WebP. Buffers too short for a
/// signature simply don't match it.
pub fn detect_format(buffer: &[u8]) -> Option<ImageFormat> {
    match buffer {
        [0x89, 0x50, 0x4E, 0x47, ..] => Some(ImageFormat::Png),
        [0xFF, 0xD8, 0xFF, ..] => Some(ImageFormat::Jpeg),
        [0x52, 0x49, 0x46, 0x46, _, _, _, _, 0x57, 0x45, 0x42, 0x50, ..] => Some(ImageFormat::WebP),
        _ => None,
    }
}
