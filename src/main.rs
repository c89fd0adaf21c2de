use anyhow::{Context, Result};
use ci_explain::config::Config;
use ci_explain::diagnose::Diagnoser;
use ci_explain::llm::OllamaClient;
use ci_explain::report::{render_json, render_text};
use clap::{Parser, ValueEnum};
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "ci-explain",
    about = "Explain a failed CI run with a local language model",
    version
)]
struct Args {
    /// Path to the CI log file ("-" reads stdin)
    #[arg(long)]
    log: PathBuf,

    /// Model name served by the local endpoint (default: phi3:mini)
    #[arg(long)]
    model: Option<String>,

    /// Base URL of the model service
    #[arg(long, env = "OLLAMA_URL")]
    endpoint: Option<String>,

    /// Seconds to wait for the model before giving up
    #[arg(long)]
    timeout: Option<u64>,

    /// Tail lines of the log kept as context
    #[arg(long)]
    max_lines: Option<usize>,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
    format: OutputFormat,

    /// Log debug details to stderr
    #[arg(long)]
    debug: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OutputFormat {
    Json,
    Text,
}

fn init_tracing(debug: bool) {
    let default_level = if debug { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();
}

fn read_log(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut buf = Vec::new();
        std::io::stdin()
            .read_to_end(&mut buf)
            .context("Failed to read log from stdin")?;
        return Ok(String::from_utf8_lossy(&buf).into_owned());
    }
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read log file {}", path.display()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn resolve_config(args: &Args) -> Config {
    let mut config = Config::load();
    if let Some(model) = &args.model {
        config.model = model.clone();
    }
    if let Some(endpoint) = &args.endpoint {
        config.endpoint = endpoint.clone();
    }
    if let Some(timeout) = args.timeout {
        config.timeout_secs = timeout;
    }
    if let Some(max_lines) = args.max_lines {
        config.max_lines = max_lines;
    }
    config.sanitize();
    config
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.debug);

    let config = resolve_config(&args);
    tracing::debug!(
        model = %config.model,
        endpoint = %config.endpoint,
        timeout_secs = config.timeout_secs,
        "resolved configuration"
    );

    let log = read_log(&args.log)?;
    let client = OllamaClient::new(&config)?;
    let diagnosis = Diagnoser::new(client, &config).run(&log).await;

    let rendered = match args.format {
        OutputFormat::Json => render_json(&diagnosis.analysis)?,
        OutputFormat::Text => render_text(&diagnosis),
    };
    println!("{}", rendered);
    Ok(())
}
