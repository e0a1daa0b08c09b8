//! Generator-agnostic data model.
//!
//! Every parser produces a [`PromptInfo`]: which [`Generator`] made the image, the
//! [`Sampler`] configurations found in its metadata, the full prompts with the
//! [`Model`] references, and the [`RawMetadata`] bag it was parsed from.

mod raw;

pub use raw::{MetadataValue, RawMetadata};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Sampler parameter and model metadata values (numbers or strings).
pub type ParamValue = serde_json::Value;

/// The AI image generation tool that embedded the metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Generator {
    Automatic1111,
    Fooocus,
    ComfyUi,
    NovelAi,
}

impl Generator {
    /// All generators with a managed parser, in managed order.
    pub const ALL: [Generator; 4] = [
        Generator::Automatic1111,
        Generator::Fooocus,
        Generator::ComfyUi,
        Generator::NovelAi,
    ];

    /// Display name as the generator itself spells it.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Automatic1111 => "AUTOMATIC1111",
            Self::Fooocus => "Fooocus",
            Self::ComfyUi => "ComfyUI",
            Self::NovelAi => "NovelAI",
        }
    }

    /// Generators known to store their whole parameter blob directly in the EXIF
    /// UserComment tag.
    pub fn stores_parameters_in_user_comment(&self) -> bool {
        matches!(self, Self::Automatic1111 | Self::Fooocus)
    }
}

impl fmt::Display for Generator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Generator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "automatic1111" | "a1111" => Ok(Self::Automatic1111),
            "fooocus" => Ok(Self::Fooocus),
            "comfyui" => Ok(Self::ComfyUi),
            "novelai" => Ok(Self::NovelAi),
            other => Err(format!("unknown generator: {other}")),
        }
    }
}

/// One sampling configuration found in the source metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sampler {
    pub name: String,
    pub parameters: BTreeMap<String, ParamValue>,
}

impl Sampler {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parameters: BTreeMap::new(),
        }
    }

    pub fn with_parameters(name: impl Into<String>, parameters: BTreeMap<String, ParamValue>) -> Self {
        Self {
            name: name.into(),
            parameters,
        }
    }
}

/// A model reference (checkpoint, LoRA, ...).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Model {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, ParamValue>,
}

impl Model {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            hash: None,
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_hash(mut self, hash: impl Into<String>) -> Self {
        self.hash = Some(hash.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.hash {
            Some(hash) => write!(f, "{} [{hash}]", self.name),
            None => f.write_str(&self.name),
        }
    }
}

/// Prompt text and model references.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PromptMetadata {
    pub full_prompt: Option<String>,
    pub full_negative_prompt: Option<String>,
    pub models: Vec<Model>,
}

/// Normalized image generation parameters.
///
/// Samplers are kept in discovery order, which is not necessarily execution order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PromptInfo {
    pub generator: Generator,
    pub samplers: Vec<Sampler>,
    pub metadata: PromptMetadata,
    /// The bag this result was parsed from.
    pub raw_parameters: RawMetadata,
}

impl PromptInfo {
    pub fn full_prompt(&self) -> Option<&str> {
        self.metadata.full_prompt.as_deref()
    }

    pub fn full_negative_prompt(&self) -> Option<&str> {
        self.metadata.full_negative_prompt.as_deref()
    }

    pub fn models(&self) -> &[Model] {
        &self.metadata.models
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
