use anyhow::{Context, Result};
use img_parts::{Bytes, DynImage, ImageEXIF};
use nom_exif::{EntryValue, ExifIter, MediaParser, MediaSource};
use std::collections::HashMap;
use std::io::Cursor;

// Tag IDs
pub const TAG_IMAGE_DESCRIPTION: u16 = 0x010E;
pub const TAG_MAKE: u16 = 0x010F;
pub const TAG_MODEL: u16 = 0x0110;
pub const TAG_SOFTWARE: u16 = 0x0131;
pub const TAG_USER_COMMENT: u16 = 0x9286;

/// A decoded EXIF tag value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExifValue {
    Text(String),
    Bytes(Vec<u8>),
    Unsigned(u32),
}

/// Decoded tags, keyed by tag ID.
pub type ExifTags = HashMap<u16, ExifValue>;

/// Options for [`read_exif`].
#[derive(Debug, Clone, Default)]
pub struct ExifOptions {
    /// Only decode these tag IDs. Empty means every tag.
    pub pick: Vec<u16>,
    /// Decode UserComment into text. When off, its raw bytes (8-byte character
    /// code marker included) are returned as [`ExifValue::Bytes`]. A UserComment
    /// stored with the ASCII type is text either way.
    pub decode_user_comment: bool,
}

impl ExifOptions {
    pub fn pick(tags: &[u16]) -> Self {
        Self {
            pick: tags.to_vec(),
            decode_user_comment: false,
        }
    }

    fn wants(&self, tag: u16) -> bool {
        self.pick.is_empty() || self.pick.contains(&tag)
    }
}

/// The character code marker at the start of a UserComment value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharacterCode {
    /// UTF-16 big-endian
    Unicode,
    Ascii,
    /// Unset or anything else, read as UTF-8
    Undefined,
}

impl CharacterCode {
    pub fn from_marker(marker: &[u8]) -> Self {
        let trimmed: Vec<u8> = marker.iter().copied().filter(|&b| b != 0).collect();
        match trimmed.as_slice() {
            b"UNICODE" => Self::Unicode,
            b"ASCII" => Self::Ascii,
            _ => Self::Undefined,
        }
    }

    pub fn decode(&self, data: &[u8]) -> String {
        match self {
            Self::Unicode => {
                let units: Vec<u16> = data
                    .chunks_exact(2)
                    .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
                    .collect();
                String::from_utf16_lossy(&units)
            }
            Self::Ascii => data.iter().map(|&b| b as char).collect(),
            Self::Undefined => String::from_utf8_lossy(data).into_owned(),
        }
    }
}

/// Decode a raw UserComment value: an 8-byte character code marker followed by
/// the text in that encoding.
///
/// ```rust
/// use sd_parsers::exif::decode_user_comment;
///
/// let mut raw = b"ASCII\0\0\0".to_vec();
/// raw.extend_from_slice(b"hello");
/// assert_eq!(decode_user_comment(&raw), "hello");
/// ```
pub fn decode_user_comment(raw: &[u8]) -> String {
    let (marker, data) = raw.split_at(raw.len().min(8));
    CharacterCode::from_marker(marker).decode(data)
}

/// Display name of a tag ID, hex for tags without a known name.
pub fn tag_name(tag: u16) -> String {
    match tag {
        TAG_IMAGE_DESCRIPTION => "imageDescription".to_string(),
        TAG_MAKE => "make".to_string(),
        TAG_MODEL => "model".to_string(),
        TAG_SOFTWARE => "software".to_string(),
        TAG_USER_COMMENT => "userComment".to_string(),
        _ => format!("0x{tag:04x}"),
    }
}

/// Read EXIF tags from a JPEG or WebP image held in memory.
///
/// Returns `Ok(None)` when the container carries no EXIF segment at all. Fails when
/// the container or the TIFF structure inside it is malformed.
pub fn read_exif(buffer: &[u8], options: &ExifOptions) -> Result<Option<ExifTags>> {
    let image = DynImage::from_bytes(Bytes::copy_from_slice(buffer))
        .context("Failed to parse image container")?
        .context("Unsupported image container")?;

    let Some(tiff) = image.exif() else {
        log::trace!("No EXIF segment present");
        return Ok(None);
    };

    decode_tiff(&tiff, options).map(Some)
}

/// Decode the TIFF structure of an EXIF payload, sub-IFDs included.
pub fn decode_tiff(data: &[u8], options: &ExifOptions) -> Result<ExifTags> {
    let data = data.strip_prefix(b"Exif\0\0").unwrap_or(data);

    let mut parser = MediaParser::new();
    let ms = MediaSource::seekable(Cursor::new(data.to_vec()))
        .context("Unrecognized EXIF payload")?;
    let iter: ExifIter = parser.parse(ms).context("Failed to parse EXIF payload")?;

    let mut tags = ExifTags::new();
    for entry in iter {
        let code = entry.tag_code();
        if !options.wants(code) {
            continue;
        }

        let Some(value) = entry.get_value() else {
            anyhow::bail!("Tag {} could not be decoded", tag_name(code));
        };

        match convert(code, value, options) {
            Some(value) => {
                log::trace!("EXIF {} = {value:?}", tag_name(code));
                tags.insert(code, value);
            }
            None => log::trace!("Skipping tag {} with unsupported value {value}", tag_name(code)),
        }
    }

    Ok(tags)
}

fn convert(code: u16, value: &EntryValue, options: &ExifOptions) -> Option<ExifValue> {
    match value {
        EntryValue::Text(text) => Some(ExifValue::Text(text.trim_end_matches('\0').to_string())),
        EntryValue::Undefined(bytes) => Some(if code == TAG_USER_COMMENT && options.decode_user_comment {
            ExifValue::Text(decode_user_comment(bytes))
        } else {
            ExifValue::Bytes(bytes.clone())
        }),
        EntryValue::U8(v) => Some(ExifValue::Unsigned(u32::from(*v))),
        EntryValue::U16(v) => Some(ExifValue::Unsigned(u32::from(*v))),
        EntryValue::U32(v) => Some(ExifValue::Unsigned(*v)),
        _ => None,
    }
}
