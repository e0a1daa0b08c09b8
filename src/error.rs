use thiserror::Error;

/// Errors surfaced by extractors, parsers and the [`ParserManager`](crate::ParserManager).
///
/// Only [`Error::Input`] and [`Error::Other`] ever escape
/// [`ParserManager::parse`](crate::ParserManager::parse). The other two variants are
/// recovered inside the extractor/parser loop:
///
/// - [`Error::Metadata`] abandons the current extractor for every remaining parser.
/// - [`Error::Parser`] moves on to the next parser.
#[derive(Debug, Error)]
pub enum Error {
    /// The input could not be materialized into a byte buffer.
    #[error("failed to read image input: {0}")]
    Input(#[source] std::io::Error),

    /// The image container is corrupt (bad chunk CRC, malformed EXIF, ...).
    #[error("error reading metadata: {0}")]
    Metadata(String),

    /// The metadata does not follow the grammar of the attempted generator.
    #[error("error in parser: {0}")]
    Parser(String),

    /// Anything else. Never masked as "no match".
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn metadata(msg: impl std::fmt::Display) -> Self {
        Self::Metadata(msg.to_string())
    }

    pub(crate) fn parser(msg: impl std::fmt::Display) -> Self {
        Self::Parser(msg.to_string())
    }
}
