use std::collections::BTreeMap;

use super::{Parser, non_empty, required_text, text_param};
use crate::data::{Generator, Model, PromptInfo, PromptMetadata, RawMetadata, Sampler};
use crate::error::{Error, Result};

const NEGATIVE_PREFIX: &str = "Negative prompt:";
const SETTINGS_PREFIX: &str = "Steps: ";

/// AUTOMATIC1111 (and compatible forks) `parameters` text:
///
/// ```text
/// positive prompt, possibly
/// spanning lines
/// Negative prompt: negative prompt
/// Steps: 20, Sampler: Euler a, CFG scale: 7, Seed: 42, Model: sd_xl_base, Model hash: 31e35c80fc
/// ```
pub struct Automatic1111Parser {
    normalize_parameters: bool,
    debug: bool,
}

impl Automatic1111Parser {
    pub fn new(normalize_parameters: bool, debug: bool) -> Self {
        Self {
            normalize_parameters,
            debug,
        }
    }
}

#[async_trait::async_trait]
impl Parser for Automatic1111Parser {
    fn generator(&self) -> Generator {
        Generator::Automatic1111
    }

    async fn parse(&self, raw: RawMetadata) -> Result<PromptInfo> {
        let text = required_text(&raw, "parameters")?;
        let SplitParameters {
            prompt,
            negative_prompt,
            settings,
        } = split_parameters(text)?;

        let mut settings = parse_settings(settings, self.debug);

        let sampler_name = settings
            .remove("Sampler")
            .ok_or_else(|| Error::parser("no sampler in settings line"))?;

        let mut models = Vec::new();
        if let Some(name) = settings.remove("Model") {
            let mut model = Model::new(name);
            if let Some(hash) = settings.remove("Model hash") {
                model = model.with_hash(hash);
            }
            models.push(model);
        }
        if let Some(lora_hashes) = settings.remove("Lora hashes") {
            models.extend(parse_lora_hashes(&lora_hashes));
        }

        let parameters: BTreeMap<_, _> = settings
            .iter()
            .map(|(key, value)| text_param(key, value, self.normalize_parameters))
            .collect();

        Ok(PromptInfo {
            generator: Generator::Automatic1111,
            samplers: vec![Sampler::with_parameters(sampler_name, parameters)],
            metadata: PromptMetadata {
                full_prompt: non_empty(prompt),
                full_negative_prompt: negative_prompt.and_then(non_empty),
                models,
            },
            raw_parameters: raw,
        })
    }
}

struct SplitParameters<'a> {
    prompt: String,
    negative_prompt: Option<String>,
    settings: &'a str,
}

/// Split the text into prompt, negative prompt and the settings line (the last
/// line starting with `Steps: `).
fn split_parameters(text: &str) -> Result<SplitParameters<'_>> {
    let lines: Vec<&str> = text.lines().collect();
    let settings_index = lines
        .iter()
        .rposition(|line| line.trim_start().starts_with(SETTINGS_PREFIX))
        .ok_or_else(|| Error::parser("no settings line found"))?;

    let mut prompt = Vec::new();
    let mut negative: Option<Vec<&str>> = None;

    for line in &lines[..settings_index] {
        if let Some(rest) = line.strip_prefix(NEGATIVE_PREFIX) {
            negative.get_or_insert_with(Vec::new).push(rest.trim_start());
        } else if let Some(neg) = negative.as_mut() {
            neg.push(line);
        } else {
            prompt.push(*line);
        }
    }

    Ok(SplitParameters {
        prompt: prompt.join("\n").trim().to_string(),
        negative_prompt: negative.map(|lines| lines.join("\n").trim().to_string()),
        settings: lines[settings_index].trim(),
    })
}

/// Split `Key: value, Key: "quoted, value"` pairs.
fn parse_settings(line: &str, debug: bool) -> BTreeMap<String, String> {
    let mut settings = BTreeMap::new();

    for fragment in split_unquoted(line) {
        let Some((key, value)) = fragment.split_once(':') else {
            if debug {
                log::debug!("AUTOMATIC1111: ignoring settings fragment '{fragment}'");
            }
            continue;
        };
        settings.insert(key.trim().to_string(), unquote(value.trim()));
    }

    settings
}

/// Split on `,` outside of double quotes.
fn split_unquoted(line: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut in_quotes = false;
    let mut escaped = false;
    let mut start = 0;

    for (i, c) in line.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' if in_quotes => escaped = true,
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                parts.push(line[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(line[start..].trim());
    parts.retain(|p| !p.is_empty());
    parts
}

fn unquote(value: &str) -> String {
    if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
        serde_json::from_str::<String>(value).unwrap_or_else(|_| value[1..value.len() - 1].to_string())
    } else {
        value.to_string()
    }
}

/// `Lora hashes: "name: hash, name: hash"`
fn parse_lora_hashes(value: &str) -> Vec<Model> {
    value
        .split(',')
        .filter_map(|entry| entry.split_once(':'))
        .map(|(name, hash)| {
            Model::new(name.trim())
                .with_hash(hash.trim())
                .with_metadata("type", "lora")
        })
        .collect()
}
