//! # sift
//!
//! Command-line front end: reads content from a file or stdin, runs it
//! through the chunking pipeline against an Ollama-compatible endpoint and
//! prints the answer.

#![deny(unsafe_code)]

use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::Level;

use sift_core::{ContentHint, GenerateOptions, LlmProvider};
use sift_engine::prompts::DEFAULT_TASK;
use sift_engine::{ContentPipeline, PipelineConfig, PlannerConfig, ProcessorConfig};
use sift_llm::{OllamaConfig, OllamaProvider, ReliableConfig, ReliableProvider};
use sift_settings::SiftSettings;
use sift_telemetry::{
    capture_early, init_telemetry, parse_level, parse_module_level, replay, TelemetryConfig,
};

/// Answer a question about content too large for one model call.
#[derive(Parser, Debug)]
#[command(name = "sift", version, about)]
struct Cli {
    /// What to do with the content. Without it the content is analyzed
    /// with a general extraction task.
    #[arg(short, long, alias = "query")]
    prompt: Option<String>,

    /// Read content from this file instead of stdin.
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Content type: html, json, code, text or unknown.
    #[arg(long = "type", default_value = "unknown")]
    content_type: ContentHint,

    /// Always send the content in a single call.
    #[arg(long)]
    no_chunking: bool,

    /// Character count above which content is chunked.
    #[arg(long)]
    threshold: Option<usize>,

    /// Target characters per chunk.
    #[arg(long)]
    chunk_size: Option<usize>,

    /// Per-call timeout in seconds.
    #[arg(long)]
    timeout_secs: Option<u64>,

    #[arg(long)]
    model: Option<String>,

    #[arg(long)]
    base_url: Option<String>,

    /// Per-module log level, e.g. `sift_llm=debug`. Repeatable.
    #[arg(long = "log-module", value_parser = module_level)]
    log_modules: Vec<(String, Level)>,

    /// Print the full result and captured warnings as JSON.
    #[arg(long)]
    json: bool,

    /// Check that the endpoint is reachable and serves the model, then exit.
    #[arg(long)]
    check: bool,
}

fn module_level(value: &str) -> Result<(String, Level), String> {
    parse_module_level(value).map_err(|e| e.to_string())
}

impl Cli {
    fn task(&self) -> &str {
        self.prompt.as_deref().unwrap_or(DEFAULT_TASK)
    }

    fn apply(&self, settings: &mut SiftSettings) {
        if let Some(v) = self.threshold {
            settings.chunking.activation_threshold = v;
        }
        if let Some(v) = self.chunk_size {
            settings.chunking.target_chunk_size = v;
        }
        if let Some(v) = self.timeout_secs {
            settings.llm.timeout_secs = v;
        }
        if let Some(v) = &self.model {
            settings.llm.model.clone_from(v);
        }
        if let Some(v) = &self.base_url {
            settings.llm.base_url.clone_from(v);
        }
    }

    fn read_content(&self) -> Result<String> {
        match &self.file {
            Some(path) => std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display())),
            None => {
                let mut buf = String::new();
                std::io::stdin()
                    .read_to_string(&mut buf)
                    .context("Failed to read stdin")?;
                Ok(buf)
            }
        }
    }
}

fn ollama_config(settings: &SiftSettings) -> OllamaConfig {
    OllamaConfig::new(&settings.llm.base_url, &settings.llm.model)
        .with_idle_timeout(Duration::from_secs(settings.llm.idle_timeout_secs))
}

fn reliable_config(settings: &SiftSettings) -> ReliableConfig {
    let retry = &settings.llm.retry;
    ReliableConfig {
        max_retries: retry.max_retries,
        base_delay: Duration::from_millis(retry.base_delay_ms),
        max_delay: Duration::from_millis(retry.max_delay_ms),
        circuit_breaker_threshold: retry.circuit_breaker_threshold,
        circuit_breaker_cooldown: Duration::from_secs(retry.circuit_breaker_cooldown_secs),
        ..ReliableConfig::default()
    }
}

fn pipeline_config(settings: &SiftSettings) -> PipelineConfig {
    let chunking = &settings.chunking;
    PipelineConfig {
        planner: PlannerConfig {
            activation_threshold: chunking.activation_threshold,
            target_chunk_size: chunking.target_chunk_size,
            hard_cut_factor: chunking.hard_cut_factor,
        },
        processor: ProcessorConfig {
            invoke_timeout: Duration::from_secs(settings.llm.timeout_secs),
            summary_budget: chunking.summary_budget,
        },
        system_prompt: None,
        generation: GenerateOptions {
            max_tokens: settings.llm.max_tokens,
            temperature: Some(settings.llm.temperature),
            ..GenerateOptions::default()
        },
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Settings decide how logging is set up, so their warnings are held
    // until the subscriber exists.
    let settings_path = sift_settings::settings_path();
    let (loaded, early) = capture_early(|| sift_settings::load_settings_from_path(&settings_path));

    let mut settings = loaded
        .with_context(|| format!("Failed to load {}", settings_path.display()))?;
    cli.apply(&mut settings);
    settings.validate().context("Invalid settings")?;

    let guard = init_telemetry(TelemetryConfig {
        log_level: parse_level(&settings.logging.level).unwrap_or(Level::WARN),
        json: settings.logging.json,
        ..TelemetryConfig::default()
    });
    replay(&early);
    for (module, level) in &cli.log_modules {
        guard.set_module_level(module, *level)?;
    }

    let mut ollama = ollama_config(&settings);
    if let Ok(key) = std::env::var("SIFT_API_KEY") {
        ollama = ollama.with_api_key(key);
    }
    let ollama = OllamaProvider::new(ollama).context("Failed to build HTTP client")?;

    if cli.check {
        if !ollama.has_model().await? {
            bail!("model {} is not available at {}", settings.llm.model, settings.llm.base_url);
        }
        println!("ok: {} at {}", settings.llm.model, settings.llm.base_url);
        return Ok(());
    }

    let provider: Arc<dyn LlmProvider> =
        Arc::new(ReliableProvider::new(ollama, reliable_config(&settings)));
    let pipeline = ContentPipeline::new(provider, pipeline_config(&settings))?;

    let content = cli.read_content()?;
    let disable = cli.no_chunking || !settings.chunking.enabled;
    let result = pipeline
        .process_content(cli.task(), &content, cli.content_type, disable)
        .await?;

    if cli.json {
        let warnings = guard
            .diagnostics()
            .map(|sink| sink.for_run(&result.run_id.to_string()))
            .unwrap_or_default();
        let report = serde_json::json!({
            "result": result,
            "warnings": warnings,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", result.answer);
        if result.degraded {
            eprintln!(
                "warning: synthesis failed; answer assembled from {} part notes",
                result.chunks_processed - result.failed_chunks.len()
            );
        } else if !result.failed_chunks.is_empty() {
            eprintln!(
                "warning: {} of {} parts were skipped",
                result.failed_chunks.len(),
                result.chunks_processed
            );
        }
    }
    Ok(())
}
