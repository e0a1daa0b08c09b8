use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, LazyLock};

use super::{Eagerness, ExifUserComment, Extractor, PngImageInfo, PngImageText, PngStealthAlpha};
use crate::format::ImageFormat;

/// Extractors for one format, by tier.
pub type TierTable = BTreeMap<Eagerness, Vec<Arc<dyn Extractor>>>;

static BUILTIN: LazyLock<Arc<ExtractorRegistry>> =
    LazyLock::new(|| Arc::new(ExtractorRegistry::with_builtin_extractors()));

/// Lookup table: image format → eagerness tier → ordered extractors.
///
/// The built-in table is built once per process and shared read-only
/// ([`ExtractorRegistry::builtin`]). Custom tables are assembled with
/// [`ExtractorRegistry::register`] before being handed to a
/// [`ParserManager`](crate::ParserManager); they are not changed afterwards.
///
/// # Example
///
/// ```rust
/// use sd_parsers::extractors::{Eagerness, ExtractorRegistry, PngImageText};
/// use sd_parsers::format::ImageFormat;
/// use std::sync::Arc;
///
/// let mut registry = ExtractorRegistry::new();
/// registry.register(ImageFormat::Png, Eagerness::Default, Arc::new(PngImageText));
/// assert_eq!(registry.extractors(ImageFormat::Png, Eagerness::Default).len(), 1);
/// assert!(registry.tiers(ImageFormat::Jpeg).is_none());
/// ```
#[derive(Clone, Default)]
pub struct ExtractorRegistry {
    formats: HashMap<ImageFormat, TierTable>,
}

impl ExtractorRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The shared built-in registry.
    pub fn builtin() -> Arc<Self> {
        Arc::clone(&BUILTIN)
    }

    /// A fresh copy of the built-in table, to extend with [`register`](Self::register).
    pub fn with_builtin_extractors() -> Self {
        let user_comment: Arc<dyn Extractor> = Arc::new(ExifUserComment);

        let mut registry = Self::new();
        registry
            .register(ImageFormat::Png, Eagerness::Fast, Arc::new(PngImageInfo))
            .register(ImageFormat::Png, Eagerness::Default, Arc::new(PngImageText))
            .register(ImageFormat::Png, Eagerness::Eager, Arc::new(PngStealthAlpha))
            .register(ImageFormat::Jpeg, Eagerness::Fast, Arc::clone(&user_comment))
            .register(ImageFormat::WebP, Eagerness::Fast, user_comment);
        registry
    }

    /// Append `extractor` to the list for `format` at `tier`.
    pub fn register(
        &mut self,
        format: ImageFormat,
        tier: Eagerness,
        extractor: Arc<dyn Extractor>,
    ) -> &mut Self {
        self.formats
            .entry(format)
            .or_default()
            .entry(tier)
            .or_default()
            .push(extractor);
        self
    }

    /// The tier table for `format`, or `None` if the format has no row.
    pub fn tiers(&self, format: ImageFormat) -> Option<&TierTable> {
        self.formats.get(&format)
    }

    /// Extractors registered for `format` at exactly `tier`, in declared order.
    pub fn extractors(&self, format: ImageFormat, tier: Eagerness) -> &[Arc<dyn Extractor>] {
        self.tiers(format)
            .and_then(|tiers| tiers.get(&tier))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

impl fmt::Debug for ExtractorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (format, tiers) in &self.formats {
            for (tier, extractors) in tiers {
                let names: Vec<&str> = extractors.iter().map(|e| e.name()).collect();
                map.entry(&format_args!("{format}/{tier}"), &names);
            }
        }
        map.finish()
    }
}
