//! Bondprompt CLI entry point.
//!
//! Subcommands cover the whole flow: analysing an instruction, rendering its
//! prompt, recovering generator output, running a full parse against Ollama,
//! managing templates, and serving the tool binding over stdio.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use std::io::{Read, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde_json::json;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info};

use bondprompt::analysis::analyze;
use bondprompt::analysis::selector::select;
use bondprompt::config::{build_registry, load_or_default, Config};
use bondprompt::logging;
use bondprompt::normalize::normalize_with_diagnostics;
use bondprompt::pipeline::BondParser;
use bondprompt::prompts::plan::{category_or_default, prepare_prompt, prepare_prompt_as};
use bondprompt::providers::ollama::OllamaProvider;
use bondprompt::recovery::recover;
use bondprompt::tools::ToolServer;

/// Bondprompt: turn bond trading instructions into typed trade records.
#[derive(Parser)]
#[command(name = "bondprompt", version, about)]
struct Cli {
    /// Path to a config file (default: ~/.bondprompt/bondprompt.toml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

/// Available CLI subcommands.
#[derive(Subcommand)]
enum Command {
    /// Show the selection signals and recommended template for an instruction.
    Analyze {
        /// Instruction text.
        text: String,
    },
    /// Render the best-fit prompt for an instruction without calling a generator.
    Prompt {
        /// Instruction text.
        text: String,
        /// Conversation context.
        #[arg(long, default_value = "")]
        context: String,
        /// Force a template category; unknown names fall back to single-basic.
        #[arg(long)]
        category: Option<String>,
    },
    /// Recover a trade record from generator output (stdin unless --file).
    Recover {
        /// Read the generator output from this file.
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Parse an instruction end to end through the configured generator.
    Parse {
        /// Instruction text.
        text: String,
        /// Conversation context.
        #[arg(long, default_value = "")]
        context: String,
        /// Force a template category; unknown names fall back to single-basic.
        #[arg(long)]
        category: Option<String>,
    },
    /// Ask the trading assistant a question and stream the answer.
    Chat {
        /// Question text.
        question: String,
        /// Conversation context.
        #[arg(long, default_value = "")]
        context: String,
    },
    /// Inspect or move prompt templates.
    Templates {
        /// Template action.
        #[command(subcommand)]
        action: TemplatesAction,
    },
    /// Serve the tool binding over stdin/stdout.
    Tools,
    /// Check that the configured generator is reachable and its model pulled.
    Check,
}

/// Template management actions.
#[derive(Subcommand)]
enum TemplatesAction {
    /// List registered templates.
    List,
    /// Write every template body to a JSON file.
    Export {
        /// Destination file.
        path: PathBuf,
    },
    /// Check a JSON template file and show the registry it would produce.
    Import {
        /// Source file.
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = load_or_default(cli.config.as_deref())?;
    let _logging_guard = logging::init(&config.logging)?;

    match cli.command {
        Command::Analyze { text } => handle_analyze(&text),
        Command::Prompt {
            text,
            context,
            category,
        } => handle_prompt(&config, &text, &context, category.as_deref()),
        Command::Recover { file } => handle_recover(file),
        Command::Parse {
            text,
            context,
            category,
        } => handle_parse(&config, &text, &context, category.as_deref()).await,
        Command::Chat { question, context } => handle_chat(&config, question, context).await,
        Command::Templates { action } => handle_templates(&config, action),
        Command::Tools => handle_tools(&config).await,
        Command::Check => handle_check(&config).await,
    }
}

fn print_json(value: &impl serde::Serialize) -> anyhow::Result<()> {
    let rendered = serde_json::to_string_pretty(value).context("failed to encode output")?;
    println!("{rendered}");
    Ok(())
}

fn handle_analyze(text: &str) -> anyhow::Result<()> {
    let characteristics = analyze(text);
    let recommended = select(&characteristics);
    print_json(&json!({
        "characteristics": characteristics,
        "recommended": recommended,
    }))
}

fn handle_prompt(
    config: &Config,
    text: &str,
    context: &str,
    category: Option<&str>,
) -> anyhow::Result<()> {
    let registry = build_registry(&config.templates)?;
    let plan = match category.map(category_or_default) {
        Some(category) => prepare_prompt_as(&registry, category, text, context),
        None => prepare_prompt(&registry, text, context),
    }
    .context("failed to render prompt")?;
    print_json(&plan)
}

fn handle_recover(file: Option<PathBuf>) -> anyhow::Result<()> {
    let raw = match file {
        Some(path) => std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("failed to read stdin")?;
            buf
        }
    };

    let recovered = recover(&raw)?;
    let (record, diagnostics) = normalize_with_diagnostics(&recovered.fields);
    print_json(&json!({
        "record": record,
        "strategy": recovered.strategy,
        "diagnostics": diagnostics,
    }))
}

fn build_provider(config: &Config) -> anyhow::Result<OllamaProvider> {
    let generator = &config.generator;
    let provider = OllamaProvider::with_settings(
        generator.model.clone(),
        generator.base_url.clone(),
        generator.timeout(),
    )
    .context("failed to build Ollama client")?;
    info!(model = %generator.model, base_url = %generator.base_url, "generator configured");
    Ok(provider)
}

fn build_parser(config: &Config) -> anyhow::Result<BondParser> {
    let registry = build_registry(&config.templates)?;
    let provider = build_provider(config)?;
    Ok(BondParser::new(registry, Arc::new(provider))
        .with_max_attempts(config.generator.max_attempts))
}

async fn handle_parse(
    config: &Config,
    text: &str,
    context: &str,
    category: Option<&str>,
) -> anyhow::Result<()> {
    let parser = build_parser(config)?;
    let outcome = match category.map(category_or_default) {
        Some(category) => parser.parse_as(category, text, context).await?,
        None => parser.parse(text, context).await?,
    };
    print_json(&outcome)
}

async fn handle_chat(config: &Config, question: String, context: String) -> anyhow::Result<()> {
    let parser = build_parser(config)?;
    let (tx, mut rx) = mpsc::channel(64);

    let task = tokio::spawn(async move { parser.chat(&question, &context, tx).await });

    let mut stdout = std::io::stdout();
    while let Some(chunk) = rx.recv().await {
        stdout
            .write_all(chunk.content.as_bytes())
            .context("failed to write to stdout")?;
        stdout.flush().context("failed to flush stdout")?;
    }
    println!();

    let chunks = task.await.context("chat task panicked")??;
    debug!(chunks, "chat finished");
    Ok(())
}

fn handle_templates(config: &Config, action: TemplatesAction) -> anyhow::Result<()> {
    let mut registry = build_registry(&config.templates)?;
    match action {
        TemplatesAction::List => print_json(&registry.available()),
        TemplatesAction::Export { path } => {
            registry
                .export_to_file(&path)
                .with_context(|| format!("failed to export to {}", path.display()))?;
            info!(path = %path.display(), count = registry.len(), "templates exported");
            Ok(())
        }
        TemplatesAction::Import { path } => {
            let count = registry
                .import_from_file(&path)
                .with_context(|| format!("failed to import {}", path.display()))?;
            info!(path = %path.display(), count, "templates imported");
            print_json(&registry.available())
        }
    }
}

async fn handle_tools(config: &Config) -> anyhow::Result<()> {
    let registry = build_registry(&config.templates)?;
    let server = ToolServer::new(Arc::new(RwLock::new(registry)));
    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    server
        .serve(stdin, tokio::io::stdout())
        .await
        .context("tool server I/O failed")
}

async fn handle_check(config: &Config) -> anyhow::Result<()> {
    let provider = build_provider(config)?;
    let reachable = provider.is_available().await;
    print_json(&json!({
        "base_url": provider.base_url,
        "model": provider.model,
        "reachable": reachable,
    }))?;
    provider
        .ensure_ready()
        .await
        .context("generator is not ready")?;
    info!(model = %provider.model, "generator ready");
    Ok(())
}
