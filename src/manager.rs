use img_parts::Bytes;
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::config::Config;
use crate::data::{Generator, PromptInfo};
use crate::error::{Error, Result};
use crate::extractors::{Eagerness, Extractor, ExtractorRegistry};
use crate::format::detect_format;
use crate::parsers::{self, Parser};

/// Image data handed to [`ParserManager::parse`].
///
/// Byte buffers are used as they are. A reader is drained to the end first;
/// failing to read it is an [`Error::Input`].
pub enum ParseInput<'a> {
    Bytes(Cow<'a, [u8]>),
    Reader(Box<dyn AsyncRead + Unpin + Send + 'a>),
}

impl<'a> ParseInput<'a> {
    /// Wrap a blob-like async reader (open file, response body, ...).
    pub fn reader(reader: impl AsyncRead + Unpin + Send + 'a) -> Self {
        Self::Reader(Box::new(reader))
    }

    async fn into_bytes(self) -> Result<Cow<'a, [u8]>> {
        match self {
            Self::Bytes(bytes) => Ok(bytes),
            Self::Reader(mut reader) => {
                let mut buffer = Vec::new();
                reader.read_to_end(&mut buffer).await.map_err(Error::Input)?;
                Ok(Cow::Owned(buffer))
            }
        }
    }
}

impl<'a> From<&'a [u8]> for ParseInput<'a> {
    fn from(bytes: &'a [u8]) -> Self {
        Self::Bytes(Cow::Borrowed(bytes))
    }
}

impl<'a, const N: usize> From<&'a [u8; N]> for ParseInput<'a> {
    fn from(bytes: &'a [u8; N]) -> Self {
        Self::Bytes(Cow::Borrowed(bytes))
    }
}

impl<'a> From<&'a Vec<u8>> for ParseInput<'a> {
    fn from(bytes: &'a Vec<u8>) -> Self {
        Self::Bytes(Cow::Borrowed(bytes))
    }
}

impl From<Vec<u8>> for ParseInput<'_> {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Bytes(Cow::Owned(bytes))
    }
}

impl From<Bytes> for ParseInput<'_> {
    fn from(bytes: Bytes) -> Self {
        Self::Bytes(Cow::Owned(bytes.into()))
    }
}

impl fmt::Debug for ParseInput<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bytes(bytes) => f.debug_tuple("Bytes").field(&bytes.len()).finish(),
            Self::Reader(_) => f.write_str("Reader"),
        }
    }
}

/// Finds and parses generation metadata in images.
///
/// For each image, the format is sniffed from its magic bytes, then every
/// extractor registered for that format is tried tier by tier, up to the
/// eagerness ceiling. Each extractor is invoked once per parser, with the
/// parser's generator as a hint, and the first parser that accepts a bag wins.
///
/// - Unknown formats and exhausted combinations give `Ok(None)`.
/// - A metadata error abandons the current extractor for every remaining parser.
/// - A parser error moves on to the next parser.
/// - Anything else is returned as is.
///
/// The manager holds no mutable state; concurrent `parse` calls can share it.
///
/// # Example
///
/// ```rust,no_run
/// use sd_parsers::ParserManager;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let manager = ParserManager::new();
/// let bytes = std::fs::read("image.png")?;
///
/// if let Some(info) = manager.parse(bytes).await? {
///     println!("Generator: {}", info.generator);
///     println!("Prompt: {:?}", info.full_prompt());
///     for sampler in &info.samplers {
///         println!("Sampler: {} {:?}", sampler.name, sampler.parameters);
///     }
/// }
/// # Ok(())
/// # }
/// ```
pub struct ParserManager {
    parsers: Vec<Box<dyn Parser>>,
    eagerness: Eagerness,
    normalize_parameters: bool,
    debug: bool,
    registry: Arc<ExtractorRegistry>,
}

impl Default for ParserManager {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl ParserManager {
    /// Every managed parser, [`Eagerness::Default`], normalization on, debug off.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> ParserManagerBuilder {
        ParserManagerBuilder::default()
    }

    pub fn from_config(config: &Config) -> Self {
        Self::builder()
            .eagerness(config.eagerness)
            .normalize_parameters(config.normalize_parameters)
            .debug(config.debug)
            .generators(config.parsers.clone())
            .build()
    }

    pub fn eagerness(&self) -> Eagerness {
        self.eagerness
    }

    pub fn normalize_parameters(&self) -> bool {
        self.normalize_parameters
    }

    pub fn debug(&self) -> bool {
        self.debug
    }

    /// The parser set, in the order it is tried.
    pub fn parsers(&self) -> &[Box<dyn Parser>] {
        &self.parsers
    }

    pub fn registry(&self) -> &ExtractorRegistry {
        &self.registry
    }

    /// Parse `input` up to the configured eagerness.
    pub async fn parse<'a>(&self, input: impl Into<ParseInput<'a>>) -> Result<Option<PromptInfo>> {
        self.parse_with_eagerness(input, self.eagerness).await
    }

    /// Parse `input`, attempting tiers up to `eagerness` for this call only.
    pub async fn parse_with_eagerness<'a>(
        &self,
        input: impl Into<ParseInput<'a>>,
        eagerness: Eagerness,
    ) -> Result<Option<PromptInfo>> {
        let image = input.into().into_bytes().await?;

        let Some(format) = detect_format(&image) else {
            if self.debug {
                log::debug!("Unsupported image format ({} bytes)", image.len());
            }
            return Ok(None);
        };

        let Some(tiers) = self.registry.tiers(format) else {
            if self.debug {
                log::debug!("No extractors registered for {format}");
            }
            return Ok(None);
        };

        for (tier, extractors) in tiers.range(..=eagerness) {
            for extractor in extractors {
                if self.debug {
                    log::debug!("{format}/{tier}: trying {}", extractor.name());
                }
                if let Some(info) = self.try_extractor(extractor.as_ref(), &image).await? {
                    return Ok(Some(info));
                }
            }
        }

        Ok(None)
    }

    /// Run every parser against one extractor.
    async fn try_extractor(&self, extractor: &dyn Extractor, image: &[u8]) -> Result<Option<PromptInfo>> {
        for parser in &self.parsers {
            let raw = match extractor.extract(image, parser.generator()).await {
                Ok(Some(raw)) => raw,
                Ok(None) => continue,
                Err(Error::Metadata(msg)) => {
                    if self.debug {
                        log::debug!("  {} failed: {msg}", extractor.name());
                    }
                    break;
                }
                Err(e) => return Err(e),
            };

            match parser.parse(raw).await {
                Ok(info) => {
                    if self.debug {
                        log::debug!("  {} matched via {}", parser.name(), extractor.name());
                    }
                    return Ok(Some(info));
                }
                Err(Error::Parser(msg)) => {
                    if self.debug {
                        log::debug!("  {} did not match: {msg}", parser.name());
                    }
                }
                Err(e) => return Err(e),
            }
        }

        Ok(None)
    }
}

impl fmt::Debug for ParserManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parsers: Vec<&str> = self.parsers.iter().map(|p| p.name()).collect();
        f.debug_struct("ParserManager")
            .field("parsers", &parsers)
            .field("eagerness", &self.eagerness)
            .field("normalize_parameters", &self.normalize_parameters)
            .field("debug", &self.debug)
            .field("registry", &self.registry)
            .finish()
    }
}

/// Builder for [`ParserManager`].
///
/// ```rust
/// use sd_parsers::{Eagerness, Generator, ParserManager};
///
/// let manager = ParserManager::builder()
///     .eagerness(Eagerness::Eager)
///     .generators(vec![Generator::NovelAi])
///     .build();
/// assert_eq!(manager.parsers().len(), 1);
/// ```
pub struct ParserManagerBuilder {
    eagerness: Eagerness,
    normalize_parameters: bool,
    debug: bool,
    generators: Option<Vec<Generator>>,
    parsers: Option<Vec<Box<dyn Parser>>>,
    registry: Option<Arc<ExtractorRegistry>>,
}

impl Default for ParserManagerBuilder {
    fn default() -> Self {
        Self {
            eagerness: Eagerness::Default,
            normalize_parameters: true,
            debug: false,
            generators: None,
            parsers: None,
            registry: None,
        }
    }
}

impl ParserManagerBuilder {
    pub fn eagerness(mut self, eagerness: Eagerness) -> Self {
        self.eagerness = eagerness;
        self
    }

    pub fn normalize_parameters(mut self, normalize: bool) -> Self {
        self.normalize_parameters = normalize;
        self
    }

    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Use the managed parsers for these generators, in this order.
    pub fn generators(mut self, generators: Vec<Generator>) -> Self {
        self.generators = Some(generators);
        self
    }

    /// Use a custom parser set. Takes precedence over [`generators`](Self::generators).
    pub fn parsers(mut self, parsers: Vec<Box<dyn Parser>>) -> Self {
        self.parsers = Some(parsers);
        self
    }

    /// Use a custom extractor table instead of the built-in one.
    pub fn registry(mut self, registry: impl Into<Arc<ExtractorRegistry>>) -> Self {
        self.registry = Some(registry.into());
        self
    }

    pub fn build(self) -> ParserManager {
        let parsers = self.parsers.unwrap_or_else(|| {
            self.generators
                .unwrap_or_else(|| Generator::ALL.to_vec())
                .into_iter()
                .map(|g| parsers::managed_parser(g, self.normalize_parameters, self.debug))
                .collect()
        });

        ParserManager {
            parsers,
            eagerness: self.eagerness,
            normalize_parameters: self.normalize_parameters,
            debug: self.debug,
            registry: self.registry.unwrap_or_else(ExtractorRegistry::builtin),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Model, PromptMetadata, RawMetadata, Sampler};
    use crate::format::ImageFormat;
    use crate::test_helpers::{corrupt_chunk_crc, png_with_text};
    use std::pin::Pin;
    use std::sync::Mutex;
    use std::task::{Context, Poll};

    const PNG: &[u8] = b"\x89PNG\r\n\x1a\n";
    const JPEG: &[u8] = b"\xFF\xD8\xFF\xE0";

    type CallLog = Arc<Mutex<Vec<String>>>;

    fn calls(log: &CallLog) -> Vec<String> {
        log.lock().unwrap().clone()
    }

    #[derive(Clone)]
    enum Yields {
        Nothing,
        Bag(RawMetadata),
        MetadataError,
        Fatal,
    }

    struct MockExtractor {
        name: &'static str,
        yields: Yields,
        log: CallLog,
    }

    #[async_trait::async_trait]
    impl Extractor for MockExtractor {
        fn name(&self) -> &str {
            self.name
        }

        async fn extract(&self, _image: &[u8], generator: Generator) -> Result<Option<RawMetadata>> {
            self.log.lock().unwrap().push(format!("{}:{generator}", self.name));
            match &self.yields {
                Yields::Nothing => Ok(None),
                Yields::Bag(raw) => Ok(Some(raw.clone())),
                Yields::MetadataError => Err(Error::metadata("bad CRC")),
                Yields::Fatal => Err(anyhow::anyhow!("boom").into()),
            }
        }
    }

    #[derive(Clone, Copy)]
    enum Outcome {
        Accept,
        Reject,
        Fatal,
    }

    struct MockParser {
        generator: Generator,
        outcome: Outcome,
    }

    #[async_trait::async_trait]
    impl Parser for MockParser {
        fn generator(&self) -> Generator {
            self.generator
        }

        async fn parse(&self, raw: RawMetadata) -> Result<PromptInfo> {
            match self.outcome {
                Outcome::Accept => Ok(PromptInfo {
                    generator: self.generator,
                    samplers: vec![Sampler::new("Euler")],
                    metadata: PromptMetadata {
                        full_prompt: raw.text("parameters").map(str::to_string),
                        full_negative_prompt: None,
                        models: vec![Model::new("model")],
                    },
                    raw_parameters: raw,
                }),
                Outcome::Reject => Err(Error::parser("not mine")),
                Outcome::Fatal => Err(anyhow::anyhow!("parser bug").into()),
            }
        }
    }

    fn parser(generator: Generator, outcome: Outcome) -> Box<dyn Parser> {
        Box::new(MockParser { generator, outcome })
    }

    fn bag(text: &str) -> RawMetadata {
        let mut raw = RawMetadata::new();
        raw.insert("parameters", text);
        raw
    }

    /// A PNG registry with one extractor per `(tier, name, yields)` entry.
    fn registry(entries: &[(Eagerness, &'static str, Yields)], log: &CallLog) -> ExtractorRegistry {
        let mut registry = ExtractorRegistry::new();
        for (tier, name, yields) in entries {
            registry.register(
                ImageFormat::Png,
                *tier,
                Arc::new(MockExtractor {
                    name: *name,
                    yields: yields.clone(),
                    log: Arc::clone(log),
                }),
            );
        }
        registry
    }

    fn manager(registry: ExtractorRegistry, parsers: Vec<Box<dyn Parser>>) -> ParserManager {
        ParserManager::builder()
            .registry(registry)
            .parsers(parsers)
            .debug(true)
            .build()
    }

    // ── construction ─────────────────────────────────────────────────

    #[test]
    fn defaults() {
        let manager = ParserManager::new();
        assert_eq!(manager.eagerness(), Eagerness::Default);
        assert!(manager.normalize_parameters());
        assert!(!manager.debug());
        let generators: Vec<Generator> = manager.parsers().iter().map(|p| p.generator()).collect();
        assert_eq!(generators, Generator::ALL);
    }

    #[test]
    fn from_config() {
        let config = Config {
            eagerness: Eagerness::Fast,
            normalize_parameters: false,
            debug: true,
            parsers: vec![Generator::NovelAi, Generator::Automatic1111],
        };
        let manager = ParserManager::from_config(&config);
        assert_eq!(manager.eagerness(), Eagerness::Fast);
        assert!(!manager.normalize_parameters());
        assert!(manager.debug());
        let generators: Vec<Generator> = manager.parsers().iter().map(|p| p.generator()).collect();
        assert_eq!(generators, [Generator::NovelAi, Generator::Automatic1111]);
    }

    #[test]
    fn manager_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ParserManager>();
    }

    // ── tiers ────────────────────────────────────────────────────────

    #[tokio::test]
    async fn tiers_above_the_ceiling_are_never_attempted() {
        let log = CallLog::default();
        let entries = [
            (Eagerness::Fast, "fast", Yields::Nothing),
            (Eagerness::Default, "default", Yields::Nothing),
            (Eagerness::Eager, "eager", Yields::Nothing),
        ];
        let manager = manager(
            registry(&entries, &log),
            vec![parser(Generator::Automatic1111, Outcome::Accept)],
        );

        let mut attempted = Vec::new();
        for eagerness in Eagerness::ALL {
            log.lock().unwrap().clear();
            let result = manager.parse_with_eagerness(PNG, eagerness).await.unwrap();
            assert!(result.is_none());
            attempted.push(calls(&log));
        }

        assert_eq!(attempted[0], ["fast:AUTOMATIC1111"]);
        assert_eq!(attempted[1], ["fast:AUTOMATIC1111", "default:AUTOMATIC1111"]);
        assert_eq!(
            attempted[2],
            ["fast:AUTOMATIC1111", "default:AUTOMATIC1111", "eager:AUTOMATIC1111"]
        );
    }

    #[tokio::test]
    async fn first_success_short_circuits_later_tiers() {
        let log = CallLog::default();
        let entries = [
            (Eagerness::Default, "text", Yields::Bag(bag("a prompt"))),
            (Eagerness::Eager, "stealth", Yields::Bag(bag("hidden"))),
        ];
        let manager = manager(
            registry(&entries, &log),
            vec![parser(Generator::Automatic1111, Outcome::Accept)],
        );

        let at_default = manager.parse_with_eagerness(PNG, Eagerness::Default).await.unwrap();
        let at_eager = manager.parse_with_eagerness(PNG, Eagerness::Eager).await.unwrap();

        assert!(at_default.is_some());
        assert_eq!(at_default, at_eager);
        assert!(!calls(&log).iter().any(|c| c.starts_with("stealth")));
    }

    #[tokio::test]
    async fn configured_eagerness_is_the_default_ceiling() {
        let log = CallLog::default();
        let entries = [(Eagerness::Eager, "stealth", Yields::Bag(bag("hidden")))];
        let fast = ParserManager::builder()
            .registry(registry(&entries, &log))
            .parsers(vec![parser(Generator::NovelAi, Outcome::Accept)])
            .eagerness(Eagerness::Fast)
            .build();

        assert!(fast.parse(PNG).await.unwrap().is_none());
        assert!(calls(&log).is_empty());
        assert!(fast.parse_with_eagerness(PNG, Eagerness::Eager).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn results_are_deterministic() {
        let log = CallLog::default();
        let entries = [(Eagerness::Default, "text", Yields::Bag(bag("a prompt")))];
        let manager = manager(
            registry(&entries, &log),
            vec![
                parser(Generator::Automatic1111, Outcome::Reject),
                parser(Generator::Fooocus, Outcome::Accept),
            ],
        );

        let first = manager.parse(PNG).await.unwrap();
        let second = manager.parse(PNG).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.map(|info| info.generator), Some(Generator::Fooocus));
    }

    // ── error isolation ──────────────────────────────────────────────

    #[tokio::test]
    async fn metadata_error_abandons_the_extractor_for_all_parsers() {
        let log = CallLog::default();
        let entries = [
            (Eagerness::Default, "corrupt", Yields::MetadataError),
            (Eagerness::Default, "text", Yields::Bag(bag("a prompt"))),
        ];
        let manager = manager(
            registry(&entries, &log),
            vec![
                parser(Generator::Automatic1111, Outcome::Reject),
                parser(Generator::ComfyUi, Outcome::Accept),
            ],
        );

        let info = manager.parse(PNG).await.unwrap().unwrap();
        assert_eq!(info.generator, Generator::ComfyUi);
        assert_eq!(
            calls(&log),
            ["corrupt:AUTOMATIC1111", "text:AUTOMATIC1111", "text:ComfyUI"]
        );
    }

    #[tokio::test]
    async fn metadata_errors_alone_give_none() {
        let log = CallLog::default();
        let entries = [(Eagerness::Default, "corrupt", Yields::MetadataError)];
        let manager = manager(
            registry(&entries, &log),
            vec![parser(Generator::Automatic1111, Outcome::Accept)],
        );
        assert!(manager.parse(PNG).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn fatal_extractor_error_propagates() {
        let log = CallLog::default();
        let entries = [
            (Eagerness::Fast, "broken", Yields::Fatal),
            (Eagerness::Default, "text", Yields::Bag(bag("a prompt"))),
        ];
        let manager = manager(
            registry(&entries, &log),
            vec![parser(Generator::Automatic1111, Outcome::Accept)],
        );

        let err = manager.parse(PNG).await.unwrap_err();
        assert!(matches!(err, Error::Other(_)));
        assert_eq!(calls(&log), ["broken:AUTOMATIC1111"]);
    }

    #[tokio::test]
    async fn fatal_parser_error_propagates() {
        let log = CallLog::default();
        let entries = [(Eagerness::Default, "text", Yields::Bag(bag("a prompt")))];
        let manager = manager(
            registry(&entries, &log),
            vec![
                parser(Generator::Automatic1111, Outcome::Fatal),
                parser(Generator::Fooocus, Outcome::Accept),
            ],
        );

        assert!(matches!(manager.parse(PNG).await, Err(Error::Other(_))));
    }

    // ── parser fallback ──────────────────────────────────────────────

    #[tokio::test]
    async fn matching_parser_wins_in_either_order() {
        for order in [
            [Outcome::Reject, Outcome::Accept],
            [Outcome::Accept, Outcome::Reject],
        ] {
            let log = CallLog::default();
            let entries = [(Eagerness::Default, "text", Yields::Bag(bag("a prompt")))];
            let generators = [Generator::Automatic1111, Generator::NovelAi];
            let parsers = generators
                .iter()
                .zip(order)
                .map(|(g, outcome)| parser(*g, outcome))
                .collect();
            let manager = manager(registry(&entries, &log), parsers);

            let info = manager.parse(PNG).await.unwrap().unwrap();
            let expected = if matches!(order[0], Outcome::Accept) { generators[0] } else { generators[1] };
            assert_eq!(info.generator, expected);
            assert_eq!(info.full_prompt(), Some("a prompt"));
        }
    }

    #[tokio::test]
    async fn extractor_receives_each_parser_generator() {
        let log = CallLog::default();
        let entries = [(Eagerness::Default, "text", Yields::Bag(bag("x")))];
        let manager = manager(
            registry(&entries, &log),
            Generator::ALL
                .into_iter()
                .map(|g| parser(g, Outcome::Reject))
                .collect(),
        );

        assert!(manager.parse(PNG).await.unwrap().is_none());
        assert_eq!(
            calls(&log),
            ["text:AUTOMATIC1111", "text:Fooocus", "text:ComfyUI", "text:NovelAI"]
        );
    }

    #[tokio::test]
    async fn empty_parser_set_gives_none() {
        let log = CallLog::default();
        let entries = [(Eagerness::Default, "text", Yields::Bag(bag("x")))];
        let manager = manager(registry(&entries, &log), Vec::new());
        assert!(manager.parse(PNG).await.unwrap().is_none());
        assert!(calls(&log).is_empty());
    }

    // ── unsupported input ────────────────────────────────────────────

    #[tokio::test]
    async fn unknown_format_gives_none() {
        let manager = ParserManager::new();
        assert!(manager.parse(&[0u8; 4]).await.unwrap().is_none());
        assert!(manager.parse(b"GIF89a").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn empty_input_gives_none() {
        let manager = ParserManager::new();
        assert!(manager.parse(Vec::new()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn missing_registry_row_gives_none() {
        let log = CallLog::default();
        let entries = [(Eagerness::Fast, "png", Yields::Bag(bag("x")))];
        let manager = manager(
            registry(&entries, &log),
            vec![parser(Generator::Automatic1111, Outcome::Accept)],
        );
        assert!(manager.parse(JPEG).await.unwrap().is_none());
        assert!(calls(&log).is_empty());
    }

    // ── inputs ───────────────────────────────────────────────────────

    struct FailingReader;

    impl AsyncRead for FailingReader {
        fn poll_read(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            _buf: &mut tokio::io::ReadBuf<'_>,
        ) -> Poll<std::io::Result<()>> {
            Poll::Ready(Err(std::io::Error::other("stream closed")))
        }
    }

    #[tokio::test]
    async fn reader_input_is_materialized() {
        let png = png_with_text(&[("parameters", "a prompt\nSteps: 20, Sampler: Euler")]);
        let manager = ParserManager::new();
        let info = manager
            .parse(ParseInput::reader(std::io::Cursor::new(png)))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(info.full_prompt(), Some("a prompt"));
    }

    #[tokio::test]
    async fn unreadable_reader_is_input_error() {
        let err = ParserManager::new()
            .parse(ParseInput::reader(FailingReader))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Input(_)));
    }

    #[tokio::test]
    async fn bytes_input() {
        let png = png_with_text(&[("parameters", "a prompt\nSteps: 20, Sampler: Euler")]);
        let info = ParserManager::new().parse(Bytes::from(png)).await.unwrap().unwrap();
        assert_eq!(info.generator, Generator::Automatic1111);
    }

    // ── built-in pipeline ────────────────────────────────────────────

    #[tokio::test]
    async fn png_text_end_to_end() {
        let png = png_with_text(&[(
            "parameters",
            "a prompt\nNegative prompt: x\nSteps: 20, Sampler: Euler",
        )]);
        let info = ParserManager::new().parse(&png).await.unwrap().unwrap();

        assert_eq!(info.generator, Generator::Automatic1111);
        assert_eq!(info.full_prompt(), Some("a prompt"));
        assert_eq!(info.full_negative_prompt(), Some("x"));
        assert_eq!(info.samplers.len(), 1);
        assert_eq!(info.samplers[0].name, "Euler");
    }

    #[tokio::test]
    async fn corrupt_png_gives_none_at_every_tier() {
        let mut png = png_with_text(&[("parameters", "a prompt\nSteps: 20, Sampler: Euler")]);
        corrupt_chunk_crc(&mut png, *b"tEXt");

        let manager = ParserManager::builder().debug(true).build();
        for eagerness in Eagerness::ALL {
            let result = manager.parse_with_eagerness(&png, eagerness).await.unwrap();
            assert!(result.is_none(), "{eagerness}");
        }
    }

    #[tokio::test]
    async fn concurrent_parses_share_one_manager() {
        let manager = Arc::new(ParserManager::new());
        let good = png_with_text(&[("parameters", "a cat\nSteps: 20, Sampler: Euler a")]);
        let mut corrupt = good.clone();
        corrupt_chunk_crc(&mut corrupt, *b"tEXt");

        let (a, b, c) = tokio::join!(
            manager.parse(&good),
            manager.parse(&corrupt),
            manager.parse(&[0u8; 4]),
        );
        assert_eq!(a.unwrap().unwrap().full_prompt(), Some("a cat"));
        assert!(b.unwrap().is_none());
        assert!(c.unwrap().is_none());

        let handle = {
            let manager = Arc::clone(&manager);
            let good = good.clone();
            tokio::spawn(async move { manager.parse(good).await })
        };
        let spawned = handle.await.unwrap().unwrap().unwrap();
        assert_eq!(spawned.samplers[0].name, "Euler a");
    }
}
