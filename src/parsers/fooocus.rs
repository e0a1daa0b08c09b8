use serde_json::{Map, Value};
use std::collections::BTreeMap;

use super::{Parser, json_object, json_param, non_empty, required_text, value_text};
use crate::data::{Generator, Model, PromptInfo, PromptMetadata, RawMetadata, Sampler};
use crate::error::{Error, Result};

/// Keys copied into the sampler parameters.
const SAMPLER_KEYS: &[&str] = &[
    "steps",
    "cfg_scale",
    "guidance_scale",
    "seed",
    "scheduler",
    "sharpness",
    "adaptive_cfg",
    "adm_guidance",
    "resolution",
    "performance",
    "refiner_switch",
];

/// Fooocus JSON metadata, stored under `parameters`.
pub struct FooocusParser {
    normalize_parameters: bool,
    debug: bool,
}

impl FooocusParser {
    pub fn new(normalize_parameters: bool, debug: bool) -> Self {
        Self {
            normalize_parameters,
            debug,
        }
    }
}

#[async_trait::async_trait]
impl Parser for FooocusParser {
    fn generator(&self) -> Generator {
        Generator::Fooocus
    }

    async fn parse(&self, raw: RawMetadata) -> Result<PromptInfo> {
        let data = json_object(required_text(&raw, "parameters")?, "Fooocus parameters")?;

        let sampler_name = data
            .get("sampler")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::parser("no sampler in Fooocus parameters"))?;

        let prompt = prompt_text(&data, &["full_prompt", "prompt"]);
        let negative_prompt = prompt_text(&data, &["full_negative_prompt", "negative_prompt"]);
        if prompt.is_none() && negative_prompt.is_none() {
            return Err(Error::parser("no prompt in Fooocus parameters"));
        }

        let parameters: BTreeMap<_, _> = SAMPLER_KEYS
            .iter()
            .filter_map(|key| data.get(*key).map(|value| json_param(key, value, self.normalize_parameters)))
            .collect();

        let models = models(&data, self.debug);

        Ok(PromptInfo {
            generator: Generator::Fooocus,
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

/// First prompt key present. Expanded prompts come as a list of strings.
fn prompt_text(data: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match data.get(*key)? {
        Value::String(s) => non_empty(s.clone()),
        Value::Array(parts) => {
            let parts: Vec<&str> = parts.iter().filter_map(Value::as_str).collect();
            non_empty(parts.join("\n"))
        }
        _ => None,
    })
}

fn models(data: &Map<String, Value>, debug: bool) -> Vec<Model> {
    let mut models = Vec::new();

    if let Some(name) = data.get("base_model").and_then(Value::as_str) {
        let mut model = Model::new(name);
        if let Some(hash) = data.get("base_model_hash").and_then(Value::as_str) {
            model = model.with_hash(hash);
        }
        models.push(model);
    }

    if let Some(name) = data.get("refiner_model").and_then(Value::as_str) {
        if !name.is_empty() && name != "None" {
            models.push(Model::new(name).with_metadata("type", "refiner"));
        }
    }

    // [[name, weight], ...] or [[name, weight, hash], ...]
    if let Some(loras) = data.get("loras").and_then(Value::as_array) {
        for lora in loras {
            let Some(entry) = lora.as_array() else {
                if debug {
                    log::debug!("Fooocus: ignoring LoRA entry {lora}");
                }
                continue;
            };
            let Some(name) = entry.first().and_then(value_text) else {
                continue;
            };
            let mut model = Model::new(name).with_metadata("type", "lora");
            if let Some(weight) = entry.get(1) {
                model = model.with_metadata("weight", weight.clone());
            }
            if let Some(hash) = entry.get(2).and_then(Value::as_str) {
                model = model.with_hash(hash);
            }
            models.push(model);
        }
    }

    models
}
