//! EXIF decoding for JPEG and WebP images.
//!
//! [`read_exif`] locates the EXIF payload inside the container with `img-parts`
//! and hands the TIFF structure to `nom-exif`. [`ExifOptions`] restricts decoding
//! to a tag allow-list and toggles UserComment text decoding.

mod reader;

pub use reader::{
    CharacterCode, ExifOptions, ExifTags, ExifValue, TAG_IMAGE_DESCRIPTION, TAG_MAKE, TAG_MODEL,
    TAG_SOFTWARE, TAG_USER_COMMENT, decode_tiff, decode_user_comment, read_exif, tag_name,
};
