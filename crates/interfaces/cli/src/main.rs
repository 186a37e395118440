//! Thin manual-test harness: wires a `Runtime` to mock capability
//! implementations (and, by default, a mocked LLM) so the plan-execute-adapt
//! loop can be exercised from a terminal without touching any real service.
//!
//! Grounded on the teacher's `interfaces/cli/src/main.rs` (`clap` derive CLI,
//! `tracing_subscriber::fmt` + `EnvFilter` installed the same way), shrunk to
//! the one command this workspace's scope calls for.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use aigent_config::AppConfig;
use aigent_exec::SafeShellExecutor;
use aigent_llm::{LlmClient, MockLlmClient, OllamaLlmClient};
use aigent_runtime::Runtime;
use aigent_tools::{MockCalendar, MockContacts, MockTask, MockWeb, Shell};

#[derive(Debug, Parser)]
#[command(name = "aigent", version, about = "Manual-test harness for the personal-assistant core")]
struct Cli {
    /// One-shot request. Omit to start an interactive REPL reading lines from stdin.
    request: Option<String>,

    /// Path to a TOML config file (falls back to documented defaults when absent).
    #[arg(long, default_value = "aigent.toml")]
    config: PathBuf,

    /// Use the deterministic mock LLM instead of a real Ollama endpoint.
    #[arg(long)]
    mock_llm: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let cli = Cli::parse();
    let config = AppConfig::load_from(&cli.config).unwrap_or_default();

    let llm: Arc<dyn LlmClient> = if cli.mock_llm {
        Arc::new(MockLlmClient::new())
    } else {
        Arc::new(OllamaLlmClient::new(config.llm.ollama_model.clone(), config.llm.ollama_model.clone()))
    };
    let shell: Arc<dyn Shell> = Arc::new(SafeShellExecutor::new(std::env::temp_dir()));

    let runtime = Runtime::new(
        config,
        llm,
        Arc::new(MockCalendar::new()),
        Arc::new(MockTask::new()),
        Arc::new(MockContacts::new()),
        Arc::new(MockWeb::new()),
        shell,
    )
    .await?;
    runtime.ensure_self_concept().await?;

    match cli.request {
        Some(request) => run_once(&runtime, &request).await,
        None => run_repl(&runtime).await,
    }

    runtime.shutdown().await;
    Ok(())
}

async fn run_once(runtime: &Runtime, request: &str) {
    let response = runtime.handle(request).await;
    println!("{}", serde_json::to_string_pretty(&response).unwrap_or_default());
}

async fn run_repl(runtime: &Runtime) {
    println!("aigent manual-test harness. Type a request, or 'quit' to exit.");
    let stdin = io::stdin();
    loop {
        print!("> ");
        let _ = io::stdout().flush();

        let mut line = String::new();
        if stdin.lock().read_line(&mut line).unwrap_or(0) == 0 {
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line.eq_ignore_ascii_case("quit") || line.eq_ignore_ascii_case("exit") {
            break;
        }

        run_once(runtime, line).await;
    }
}
