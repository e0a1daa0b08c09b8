use serde_json::Value;
use std::collections::BTreeMap;

use super::{Parser, json_object, json_param, non_empty, required_text};
use crate::data::{Generator, Model, PromptInfo, PromptMetadata, RawMetadata, Sampler};
use crate::error::{Error, Result};

const SAMPLER_KEYS: &[&str] = &[
    "steps",
    "scale",
    "seed",
    "strength",
    "noise",
    "cfg_rescale",
    "noise_schedule",
    "sm",
    "sm_dyn",
    "width",
    "height",
];

/// NovelAI `Comment` JSON, next to the `Description`, `Software` and `Source`
/// entries. The stealth alpha payload carries the same keys.
pub struct NovelAiParser {
    normalize_parameters: bool,
    debug: bool,
}

impl NovelAiParser {
    pub fn new(normalize_parameters: bool, debug: bool) -> Self {
        Self {
            normalize_parameters,
            debug,
        }
    }
}

#[async_trait::async_trait]
impl Parser for NovelAiParser {
    fn generator(&self) -> Generator {
        Generator::NovelAi
    }

    async fn parse(&self, raw: RawMetadata) -> Result<PromptInfo> {
        if let Some(software) = raw.text("Software") {
            if software != "NovelAI" {
                return Err(Error::parser(format!("software '{software}' is not NovelAI")));
            }
        }

        let comment = json_object(required_text(&raw, "Comment")?, "NovelAI comment")?;

        let sampler_name = comment
            .get("sampler")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::parser("no sampler in NovelAI comment"))?;

        let parameters: BTreeMap<_, _> = SAMPLER_KEYS
            .iter()
            .filter_map(|key| comment.get(*key).map(|value| json_param(key, value, self.normalize_parameters)))
            .collect();

        if self.debug {
            let skipped: Vec<&String> = comment
                .keys()
                .filter(|key| !SAMPLER_KEYS.contains(&key.as_str()))
                .collect();
            log::debug!("NovelAI: unused comment keys {skipped:?}");
        }

        let prompt = comment
            .get("prompt")
            .and_then(Value::as_str)
            .or_else(|| raw.text("Description"))
            .map(str::to_string)
            .and_then(non_empty);
        let negative_prompt = comment
            .get("uc")
            .and_then(Value::as_str)
            .map(str::to_string)
            .and_then(non_empty);

        let models = raw
            .text("Source")
            .filter(|source| !source.trim().is_empty())
            .map(|source| vec![Model::new(source)])
            .unwrap_or_default();

        Ok(PromptInfo {
            generator: Generator::NovelAi,
            samplers: vec![Sampler::with_parameters(sampler_name, parameters)],
            metadata: PromptMetadata {
                full_prompt: prompt,
                full_negative_prompt: negative_prompt,
                models,
            },
            raw_parameters: raw,
        })
    }
}
