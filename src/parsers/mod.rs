//! Generator-specific parsers.
//!
//! Each parser turns a [`RawMetadata`] bag into a [`PromptInfo`], or fails with
//! [`Error::Parser`](crate::Error::Parser) when the bag doesn't follow its
//! generator's format. The [`ParserManager`](crate::ParserManager) tries them in
//! order.

mod automatic1111;
mod comfyui;
mod fooocus;
mod novelai;

pub use automatic1111::Automatic1111Parser;
pub use comfyui::ComfyUiParser;
pub use fooocus::FooocusParser;
pub use novelai::NovelAiParser;

use serde_json::{Number, Value};

use crate::data::{Generator, ParamValue, PromptInfo, RawMetadata};
use crate::error::{Error, Result};

/// Trait for generator parsers.
///
/// Implement this trait to support a custom generator and pass it to
/// [`ParserManagerBuilder::parsers`](crate::manager::ParserManagerBuilder::parsers).
///
/// # Example
///
/// ```rust,no_run
/// use sd_parsers::parsers::{Automatic1111Parser, Parser};
/// use sd_parsers::RawMetadata;
///
/// # async fn example() -> sd_parsers::Result<()> {
/// let parser = Automatic1111Parser::new(true, false);
/// let mut raw = RawMetadata::new();
/// raw.insert("parameters", "a cat\nSteps: 20, Sampler: Euler a");
/// let info = parser.parse(raw).await?;
/// println!("Prompt: {:?}", info.full_prompt());
/// # Ok(())
/// # }
/// ```
#[async_trait::async_trait]
pub trait Parser: Send + Sync {
    /// The generator this parser understands. Passed to extractors as a hint.
    fn generator(&self) -> Generator;

    /// Display name for log output.
    fn name(&self) -> &str {
        self.generator().name()
    }

    /// Parse `raw` into a normalized result. The result keeps `raw` as its
    /// `raw_parameters`.
    async fn parse(&self, raw: RawMetadata) -> Result<PromptInfo>;
}

/// Build the managed parser for `generator`.
pub fn managed_parser(generator: Generator, normalize_parameters: bool, debug: bool) -> Box<dyn Parser> {
    match generator {
        Generator::Automatic1111 => Box::new(Automatic1111Parser::new(normalize_parameters, debug)),
        Generator::Fooocus => Box::new(FooocusParser::new(normalize_parameters, debug)),
        Generator::ComfyUi => Box::new(ComfyUiParser::new(normalize_parameters, debug)),
        Generator::NovelAi => Box::new(NovelAiParser::new(normalize_parameters, debug)),
    }
}

/// Every managed parser, in [`Generator::ALL`] order.
pub fn managed_parsers(normalize_parameters: bool, debug: bool) -> Vec<Box<dyn Parser>> {
    Generator::ALL
        .into_iter()
        .map(|g| managed_parser(g, normalize_parameters, debug))
        .collect()
}

/// Snake-case a parameter key: `"CFG scale"` → `"cfg_scale"`.
pub fn normalize_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for c in key.trim().chars() {
        if c.is_alphanumeric() {
            out.extend(c.to_lowercase());
        } else if !out.is_empty() && !out.ends_with('_') {
            out.push('_');
        }
    }
    out.trim_end_matches('_').to_string()
}

/// Interpret a textual value: integers and finite floats become numbers,
/// everything else stays a string.
pub fn typed_value(value: &str) -> ParamValue {
    let trimmed = value.trim();
    if let Ok(i) = trimmed.parse::<i64>() {
        return Value::Number(i.into());
    }
    if let Some(n) = trimmed.parse::<f64>().ok().and_then(Number::from_f64) {
        return Value::Number(n);
    }
    Value::String(value.to_string())
}

/// A key/value pair read from text, normalized when asked.
pub(crate) fn text_param(key: &str, value: &str, normalize: bool) -> (String, ParamValue) {
    if normalize {
        (normalize_key(key), typed_value(value))
    } else {
        (key.to_string(), Value::String(value.to_string()))
    }
}

/// A key/value pair read from JSON. Normalization snake-cases the key and turns
/// numeric strings into numbers.
pub(crate) fn json_param(key: &str, value: &Value, normalize: bool) -> (String, ParamValue) {
    if !normalize {
        return (key.to_string(), value.clone());
    }
    let value = match value {
        Value::String(s) => typed_value(s),
        other => other.clone(),
    };
    (normalize_key(key), value)
}

/// Get a required text entry from the bag.
pub(crate) fn required_text<'a>(raw: &'a RawMetadata, key: &str) -> Result<&'a str> {
    raw.text(key)
        .ok_or_else(|| Error::parser(format!("no '{key}' entry in metadata")))
}

/// Parse a JSON object out of a text entry.
pub(crate) fn json_object(text: &str, what: &str) -> Result<serde_json::Map<String, Value>> {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(Error::parser(format!("{what} is not a JSON object"))),
        Err(e) => Err(Error::parser(format!("{what} is not valid JSON: {e}"))),
    }
}

/// A JSON value as display text (strings unquoted).
pub(crate) fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Treat empty text as absent.
pub(crate) fn non_empty(text: String) -> Option<String> {
    if text.trim().is_empty() { None } else { Some(text) }
}
