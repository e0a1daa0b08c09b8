//! # sd-parsers
//!
//! Recover the prompts, sampler settings and model references that AI image
//! generators (AUTOMATIC1111, Fooocus, ComfyUI, NovelAI) embed in PNG, JPEG and
//! WebP files.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use sd_parsers::ParserManager;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let manager = ParserManager::new();
//!     let bytes = std::fs::read("image.png")?;
//!
//!     match manager.parse(bytes).await? {
//!         Some(info) => {
//!             println!("Generator: {}", info.generator);
//!             println!("Prompt: {:?}", info.full_prompt());
//!             println!("Negative: {:?}", info.full_negative_prompt());
//!             for sampler in &info.samplers {
//!                 println!("Sampler: {} {:?}", sampler.name, sampler.parameters);
//!             }
//!             for model in info.models() {
//!                 println!("Model: {model}");
//!             }
//!         }
//!         None => println!("No generation metadata found"),
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! ## How it works
//!
//! 1. The image format is sniffed from its magic bytes ([`format`]).
//! 2. The extractors registered for that format ([`extractors`]) pull raw
//!    key/value bags out of the file, cheapest tier first, up to the configured
//!    [`Eagerness`].
//! 3. Each bag is offered to the generator parsers ([`parsers`]) in order. The
//!    first parser that accepts it produces the [`PromptInfo`].
//!
//! Corrupt containers and mismatching parsers are recovered from inside that loop;
//! `parse` returns `Ok(None)` when nothing matched.
//!
//! ## Modules
//!
//! - [`manager`] — [`ParserManager`], the entry point
//! - [`extractors`] — Metadata extractors and the extractor registry
//! - [`parsers`] — Generator parsers
//! - [`data`] — Result data model
//! - [`exif`] — EXIF decoding for JPEG and WebP
//! - [`format`] — Format detection
//! - [`config`] — Configuration loading/saving

pub mod config;
pub mod data;
pub mod error;
pub mod exif;
pub mod extractors;
pub mod format;
pub mod manager;
pub mod parsers;

#[cfg(test)]
mod test_helpers;

pub use data::{Generator, MetadataValue, Model, PromptInfo, PromptMetadata, RawMetadata, Sampler};
pub use error::{Error, Result};
pub use extractors::{Eagerness, Extractor, ExtractorRegistry};
pub use format::{ImageFormat, detect_format};
pub use manager::{ParseInput, ParserManager, ParserManagerBuilder};
