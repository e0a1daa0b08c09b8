use serde_json::{Map, Value};
use std::collections::HashSet;

use super::{Parser, json_object, json_param, required_text};
use crate::data::{Generator, Model, PromptInfo, PromptMetadata, RawMetadata, Sampler};
use crate::error::{Error, Result};

type Graph = Map<String, Value>;

const SAMPLER_NODES: &[&str] = &["KSampler", "KSamplerAdvanced"];
const TEXT_INPUTS: &[&str] = &["text", "text_g", "text_l", "string", "value"];

/// ComfyUI API-format node graph, stored under `prompt`.
///
/// Every `KSampler`/`KSamplerAdvanced` node becomes a sampler. Prompts are found
/// by following the samplers' `positive`/`negative` links back to the text
/// encoder nodes.
pub struct ComfyUiParser {
    normalize_parameters: bool,
    debug: bool,
}

impl ComfyUiParser {
    pub fn new(normalize_parameters: bool, debug: bool) -> Self {
        Self {
            normalize_parameters,
            debug,
        }
    }

    fn sampler(&self, node: &Map<String, Value>) -> Option<Sampler> {
        let inputs = node_inputs(node)?;
        let name = inputs.get("sampler_name").and_then(Value::as_str)?;

        let parameters = inputs
            .iter()
            .filter(|(key, value)| *key != "sampler_name" && is_scalar(value))
            .map(|(key, value)| json_param(key, value, self.normalize_parameters))
            .collect();

        Some(Sampler::with_parameters(name, parameters))
    }
}

#[async_trait::async_trait]
impl Parser for ComfyUiParser {
    fn generator(&self) -> Generator {
        Generator::ComfyUi
    }

    async fn parse(&self, raw: RawMetadata) -> Result<PromptInfo> {
        let graph = json_object(required_text(&raw, "prompt")?, "ComfyUI prompt")?;

        let mut samplers = Vec::new();
        let mut positive = Vec::new();
        let mut negative = Vec::new();

        for id in sorted_node_ids(&graph) {
            let Some(node) = graph.get(id).and_then(Value::as_object) else {
                continue;
            };
            if !SAMPLER_NODES.contains(&class_type(node)) {
                continue;
            }
            let Some(sampler) = self.sampler(node) else {
                if self.debug {
                    log::debug!("ComfyUI: sampler node {id} has no sampler_name");
                }
                continue;
            };
            samplers.push(sampler);

            let inputs = node_inputs(node);
            for (key, texts) in [("positive", &mut positive), ("negative", &mut negative)] {
                if let Some(target) = inputs.and_then(|i| i.get(key)).and_then(link_target) {
                    for text in resolve_text(&graph, &target) {
                        if !texts.contains(&text) {
                            texts.push(text);
                        }
                    }
                }
            }
        }

        if samplers.is_empty() {
            return Err(Error::parser("no sampler nodes in ComfyUI graph"));
        }

        if positive.is_empty() && negative.is_empty() {
            (positive, negative) = titled_text_encoders(&graph);
        }

        Ok(PromptInfo {
            generator: Generator::ComfyUi,
            samplers,
            metadata: PromptMetadata {
                full_prompt: join(positive),
                full_negative_prompt: join(negative),
                models: models(&graph),
            },
            raw_parameters: raw,
        })
    }
}

/// Node ids in numeric order; non-numeric ids (group nodes) sort last.
fn sorted_node_ids(graph: &Graph) -> Vec<&String> {
    let mut ids: Vec<&String> = graph.keys().collect();
    ids.sort();
    ids.sort_by_key(|id| id.parse::<u64>().unwrap_or(u64::MAX));
    ids
}

fn class_type(node: &Map<String, Value>) -> &str {
    node.get("class_type").and_then(Value::as_str).unwrap_or_default()
}

fn node_inputs(node: &Map<String, Value>) -> Option<&Map<String, Value>> {
    node.get("inputs").and_then(Value::as_object)
}

fn is_scalar(value: &Value) -> bool {
    matches!(value, Value::String(_) | Value::Number(_) | Value::Bool(_))
}

/// `["4", 0]` links point at node `"4"`, output slot 0.
fn link_target(value: &Value) -> Option<String> {
    match value.as_array()?.as_slice() {
        [Value::String(id), Value::Number(_)] => Some(id.clone()),
        [Value::Number(id), Value::Number(_)] => Some(id.to_string()),
        _ => None,
    }
}

enum Step<'g> {
    Text(&'g str),
    Link(String),
}

/// A node whose inputs are still being walked by [`resolve_text`].
struct Frame<'g> {
    inputs: &'g Map<String, Value>,
    /// Pending steps, last one first.
    steps: Vec<Step<'g>>,
    texts: Vec<String>,
    followed_conditioning: bool,
}

impl<'g> Frame<'g> {
    fn enter(graph: &'g Graph, id: &str, visited: &mut HashSet<String>) -> Option<Self> {
        if !visited.insert(id.to_string()) {
            return None;
        }
        let inputs = graph.get(id).and_then(Value::as_object).and_then(node_inputs)?;

        let mut steps: Vec<Step<'g>> = TEXT_INPUTS
            .iter()
            .filter_map(|key| match inputs.get(*key)? {
                Value::String(text) if !text.trim().is_empty() => Some(Step::Text(text.as_str())),
                value => link_target(value).map(Step::Link),
            })
            .collect();
        steps.reverse();

        Some(Self {
            inputs,
            steps,
            texts: Vec::new(),
            followed_conditioning: false,
        })
    }

    /// ConditioningCombine, ConditioningConcat, ...
    fn conditioning_links(&self) -> Vec<Step<'g>> {
        let mut steps: Vec<Step<'g>> = self
            .inputs
            .iter()
            .filter(|(key, _)| key.contains("conditioning"))
            .filter_map(|(_, value)| link_target(value).map(Step::Link))
            .collect();
        steps.reverse();
        steps
    }
}

/// Collect the prompt text reachable from `id` through text inputs, falling back
/// to conditioning inputs for nodes that carry no text themselves.
///
/// Walks the graph with an explicit stack so long link chains cannot exhaust the
/// call stack.
fn resolve_text(graph: &Graph, id: &str) -> Vec<String> {
    let mut visited = HashSet::new();
    let Some(root) = Frame::enter(graph, id, &mut visited) else {
        return Vec::new();
    };
    let mut stack = vec![root];

    while let Some(frame) = stack.last_mut() {
        match frame.steps.pop() {
            Some(Step::Text(text)) => {
                if !frame.texts.iter().any(|t| t == text) {
                    frame.texts.push(text.to_string());
                }
            }
            Some(Step::Link(target)) => {
                if let Some(child) = Frame::enter(graph, &target, &mut visited) {
                    stack.push(child);
                }
            }
            None if frame.texts.is_empty() && !frame.followed_conditioning => {
                frame.followed_conditioning = true;
                frame.steps = frame.conditioning_links();
            }
            None => {
                let Some(done) = stack.pop() else { break };
                match stack.last_mut() {
                    Some(parent) => parent.texts.extend(done.texts),
                    None => return done.texts,
                }
            }
        }
    }

    Vec::new()
}

/// Text encoders split by their title when links lead nowhere.
fn titled_text_encoders(graph: &Graph) -> (Vec<String>, Vec<String>) {
    let mut positive = Vec::new();
    let mut negative = Vec::new();

    for id in sorted_node_ids(graph) {
        let Some(node) = graph.get(id).and_then(Value::as_object) else {
            continue;
        };
        if !class_type(node).starts_with("CLIPTextEncode") {
            continue;
        }
        let Some(text) = node_inputs(node)
            .and_then(|inputs| inputs.get("text"))
            .and_then(Value::as_str)
            .filter(|text| !text.trim().is_empty())
        else {
            continue;
        };
        let title = node
            .get("_meta")
            .and_then(|meta| meta.get("title"))
            .and_then(Value::as_str)
            .unwrap_or_default();
        if title.to_lowercase().contains("negative") {
            negative.push(text.to_string());
        } else {
            positive.push(text.to_string());
        }
    }

    (positive, negative)
}

fn models(graph: &Graph) -> Vec<Model> {
    let mut models: Vec<Model> = Vec::new();

    for id in sorted_node_ids(graph) {
        let Some(node) = graph.get(id).and_then(Value::as_object) else {
            continue;
        };
        let Some(inputs) = node_inputs(node) else {
            continue;
        };
        let input = |key: &str| inputs.get(key).and_then(Value::as_str);

        let model = match class_type(node) {
            "CheckpointLoaderSimple" | "CheckpointLoader" => input("ckpt_name").map(Model::new),
            "UNETLoader" => input("unet_name").map(|name| Model::new(name).with_metadata("type", "unet")),
            "LoraLoader" | "LoraLoaderModelOnly" => input("lora_name").map(|name| {
                let mut model = Model::new(name).with_metadata("type", "lora");
                if let Some(strength) = inputs.get("strength_model").filter(|v| v.is_number()) {
                    model = model.with_metadata("weight", strength.clone());
                }
                model
            }),
            _ => None,
        };

        if let Some(model) = model {
            if !models.iter().any(|m| m.name == model.name) {
                models.push(model);
            }
        }
    }

    models
}

fn join(texts: Vec<String>) -> Option<String> {
    if texts.is_empty() { None } else { Some(texts.join("\n")) }
}
