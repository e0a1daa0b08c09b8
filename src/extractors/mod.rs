//! Metadata extractors.
//!
//! An [`Extractor`] turns raw image bytes into an untyped [`RawMetadata`] bag for one
//! image format and [`Eagerness`] tier. The [`ExtractorRegistry`] maps
//! format → tier → ordered extractor list, and is the extension point for new
//! formats.
//!
//! | Format | Fast | Default | Eager |
//! |--------|------|---------|-------|
//! | PNG | [`PngImageInfo`] | [`PngImageText`] | [`PngStealthAlpha`] |
//! | JPEG | [`ExifUserComment`] | | |
//! | WebP | [`ExifUserComment`] | | |

mod png;
mod registry;
mod user_comment;

pub use png::{PngImageInfo, PngImageText, PngStealthAlpha};
pub use registry::{ExtractorRegistry, TierTable};
pub use user_comment::ExifUserComment;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::data::{Generator, RawMetadata};
use crate::error::Result;

/// How much extraction work to attempt before giving up.
///
/// Acts as a ceiling: selecting a tier authorizes every tier at or below it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Eagerness {
    /// Cheap structural metadata only
    Fast,
    /// Text metadata: enough for most generators
    #[default]
    Default,
    /// Everything, including pixel-level payloads
    Eager,
}

impl Eagerness {
    /// All tiers in ascending order.
    pub const ALL: [Eagerness; 3] = [Eagerness::Fast, Eagerness::Default, Eagerness::Eager];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fast => "fast",
            Self::Default => "default",
            Self::Eager => "eager",
        }
    }
}

impl fmt::Display for Eagerness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Eagerness {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fast" => Ok(Self::Fast),
            "default" => Ok(Self::Default),
            "eager" => Ok(Self::Eager),
            other => Err(format!("unknown eagerness '{other}' (expected fast, default or eager)")),
        }
    }
}

/// Trait for metadata extractors.
///
/// Implement this trait and [register](ExtractorRegistry::register) it to support a
/// new format or metadata location.
///
/// Return values:
///
/// - `Ok(Some(bag))`: metadata found
/// - `Ok(None)`: nothing there, which is not an error
/// - `Err(Error::Metadata(..))`: the container is corrupt; the extractor is
///   abandoned for every remaining parser
/// - any other error aborts the whole parse
///
/// Extractors are invoked once per parser and must be idempotent.
#[async_trait::async_trait]
pub trait Extractor: Send + Sync {
    /// Short identifier used in log output (e.g., `"png_image_text"`).
    fn name(&self) -> &str;

    /// Extract a metadata bag from `image`. `generator` is the generator of the
    /// parser about to receive the bag.
    async fn extract(&self, image: &[u8], generator: Generator) -> Result<Option<RawMetadata>>;
}
