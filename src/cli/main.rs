use anyhow::Result;
use clap::Parser;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use sd_parsers::config::Config;
use sd_parsers::{Eagerness, ParserManager, PromptInfo};

/// Extensions worth handing to the parser manager. The format itself is still
/// sniffed from the file contents.
const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp"];

#[derive(Parser, Debug)]
#[command(
    name = "sd-parsers",
    version,
    about = "Read prompts, samplers and models embedded by AI image generators"
)]
struct Cli {
    /// Image files or directories to read
    #[arg(value_name = "PATH")]
    paths: Vec<PathBuf>,

    /// Path to config file (default: config.json next to binary)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Initialize a default config.json and exit
    #[arg(long)]
    init: bool,

    /// Extraction tier ceiling: fast, default or eager
    #[arg(short, long, value_name = "TIER")]
    eagerness: Option<Eagerness>,

    /// Log recovered extractor and parser failures
    #[arg(long)]
    debug: bool,

    /// Output results as JSON
    #[arg(long)]
    json: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let log_level = if cli.verbose || cli.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    // Handle --init
    if cli.init {
        let config = Config::default();
        let path = cli.config.as_deref();
        config.save(path)?;
        let save_path = match path {
            Some(p) => p.to_path_buf(),
            None => Config::config_path()?,
        };
        println!("Default config written to {}", save_path.display());
        return Ok(());
    }

    if cli.paths.is_empty() {
        anyhow::bail!("No input files or directories specified. Use --help for usage.");
    }

    // Load config, CLI flags win
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(eagerness) = cli.eagerness {
        config.eagerness = eagerness;
    }
    if cli.debug {
        config.debug = true;
    }

    let images = collect_images(&cli.paths);
    if images.is_empty() {
        anyhow::bail!("No supported image files found in the specified paths.");
    }

    let manager = ParserManager::from_config(&config);
    log::info!("Found {} image(s), eagerness {}", images.len(), config.eagerness);
    log::debug!(
        "Parsers: {}",
        manager
            .parsers()
            .iter()
            .map(|p| p.name())
            .collect::<Vec<_>>()
            .join(" → ")
    );

    let total = images.len();
    let mut found = 0;
    let mut failed = 0;
    let mut json_results = Vec::new();

    for (i, image_path) in images.iter().enumerate() {
        log::debug!("[{}/{}] Reading: {}", i + 1, total, image_path.display());

        let outcome = match tokio::fs::read(image_path).await {
            Ok(bytes) => manager.parse(bytes).await.map_err(anyhow::Error::from),
            Err(e) => Err(anyhow::Error::new(e).context("Failed to read file")),
        };

        let (info, error) = match outcome {
            Ok(info) => (info, None),
            Err(e) => {
                log::error!("{}: {e:#}", image_path.display());
                failed += 1;
                (None, Some(format!("{e:#}")))
            }
        };

        if info.is_some() {
            found += 1;
        }

        if cli.json {
            json_results.push(serde_json::json!({
                "path": image_path.display().to_string(),
                "result": info,
                "error": error,
            }));
        } else if let Some(ref info) = info {
            print_prompt_info(image_path, info);
        } else if error.is_none() {
            log::info!("{}: no generation metadata found", image_path.display());
        }
    }

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&json_results)?);
    }

    // Summary
    let empty = total - found - failed;
    log::info!("Done: {found} with metadata, {empty} without, {failed} failed out of {total} images");

    Ok(())
}

/// Collect supported image files from the given paths.
///
/// Directories are walked recursively (following symlinks).
fn collect_images(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut images = Vec::new();

    for path in paths {
        if path.is_file() {
            if is_supported_image(path) {
                images.push(path.clone());
            } else {
                log::warn!("Skipping unsupported file: {}", path.display());
            }
        } else if path.is_dir() {
            for entry in WalkDir::new(path)
                .follow_links(true)
                .into_iter()
                .filter_map(|e| e.ok())
            {
                let p = entry.path();
                if p.is_file() && is_supported_image(p) {
                    images.push(p.to_path_buf());
                }
            }
        } else {
            log::warn!("Path does not exist: {}", path.display());
        }
    }

    images
}

fn is_supported_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
}

// ANSI color codes
const DIM: &str = "\x1b[2m";
const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";

/// Max width for the value column before wrapping.
const VAL_WIDTH: usize = 56;
/// Indent for continuation lines (tag column width + " : " + 2 leading spaces).
const INDENT: &str = "                     ";

fn print_prompt_info(path: &Path, info: &PromptInfo) {
    println!();
    println!("{BOLD}File:{RESET} {}", path.display());
    println!("{DIM}{}{RESET}", "═".repeat(72));

    print_row("Generator", info.generator.name());
    if let Some(prompt) = info.full_prompt() {
        print_row("Prompt", prompt);
    }
    if let Some(negative) = info.full_negative_prompt() {
        print_row("Negative prompt", negative);
    }

    for sampler in &info.samplers {
        println!("  {BOLD}Sampler: {}{RESET}", sampler.name);
        println!("  {DIM}{}{RESET}", "─".repeat(70));
        for (key, value) in &sampler.parameters {
            let value = match value {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            print_row(key, &value);
        }
    }

    if !info.models().is_empty() {
        println!("  {BOLD}Models{RESET}");
        println!("  {DIM}{}{RESET}", "─".repeat(70));
        for model in info.models() {
            let kind = model
                .metadata
                .get("type")
                .and_then(|t| t.as_str())
                .unwrap_or("model");
            print_row(kind, &model.to_string());
        }
    }
    println!();
}

/// Print a single row in the output table.
fn print_row(tag: &str, val: &str) {
    let tag_col = format!("{:<16}", tag);
    let lines = wrap_text(val, VAL_WIDTH);
    for (i, line) in lines.iter().enumerate() {
        if i == 0 {
            println!("  {tag_col} : {line}");
        } else {
            println!("  {INDENT}{line}");
        }
    }
}

/// Wrap text at word boundaries to fit within max_width, keeping explicit line
/// breaks.
fn wrap_text(s: &str, max_width: usize) -> Vec<String> {
    let mut lines = Vec::new();

    for paragraph in s.lines() {
        let mut current_line = String::new();
        for word in paragraph.split_whitespace() {
            if current_line.is_empty() {
                current_line = word.to_string();
            } else if current_line.len() + 1 + word.len() <= max_width {
                current_line.push(' ');
                current_line.push_str(word);
            } else {
                lines.push(current_line);
                current_line = word.to_string();
            }
        }
        lines.push(current_line);
    }

    if lines.is_empty() {
        lines.push(s.to_string());
    }

    lines
}
