use super::Extractor;
use crate::data::{Generator, RawMetadata};
use crate::error::{Error, Result};
use crate::exif::{self, ExifOptions, ExifValue, TAG_USER_COMMENT};

/// The EXIF UserComment tag of JPEG and WebP images.
///
/// Generators that keep their whole parameter blob in UserComment (see
/// [`Generator::stores_parameters_in_user_comment`]) get the text under
/// `parameters`; everyone else gets it under `userComment`.
///
/// Broken or absent EXIF is expected for those UserComment generators and yields
/// `None`. For every other generator an undecodable EXIF structure is a metadata
/// error.
pub struct ExifUserComment;

#[async_trait::async_trait]
impl Extractor for ExifUserComment {
    fn name(&self) -> &str {
        "exif_user_comment"
    }

    async fn extract(&self, image: &[u8], generator: Generator) -> Result<Option<RawMetadata>> {
        let options = ExifOptions::pick(&[TAG_USER_COMMENT]);

        let tags = match exif::read_exif(image, &options) {
            Ok(Some(tags)) => tags,
            Ok(None) => return Ok(None),
            Err(e) if generator.stores_parameters_in_user_comment() => {
                log::trace!("exif_user_comment: ignoring EXIF error for {generator}: {e:#}");
                return Ok(None);
            }
            Err(e) => {
                return Err(Error::metadata(format!("Error reading EXIF UserComment: {e:#}")));
            }
        };

        let Some(value) = tags.get(&TAG_USER_COMMENT) else {
            return Ok(None);
        };

        Ok(shape_user_comment(value, generator))
    }
}

/// Place a UserComment value in a bag: raw values are decoded through their
/// character code marker and keyed by generator, text values always go under
/// `parameters`.
fn shape_user_comment(value: &ExifValue, generator: Generator) -> Option<RawMetadata> {
    let mut raw = RawMetadata::new();
    match value {
        ExifValue::Bytes(bytes) => {
            let text = exif::decode_user_comment(bytes);
            let key = if generator.stores_parameters_in_user_comment() {
                "parameters"
            } else {
                "userComment"
            };
            raw.insert(key, text);
        }
        ExifValue::Text(text) if !text.is_empty() => raw.insert("parameters", text.as_str()),
        _ => return None,
    }
    Some(raw)
}
