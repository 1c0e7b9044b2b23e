use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use trajcraft_core::{
	from_async_fn, EvalCase, EvalConfig, InferenceProvider, Invocation, ReplayProvider, RunAggregator,
	RunErrorPolicy, TestFileSource,
};

#[derive(Debug, Parser)]
#[command(name = "trajcraft", about = "Evaluate agent tool trajectories against recorded conversations")]
struct Cli {
	#[command(subcommand)]
	command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
	Run(RunArgs),
}

#[derive(Debug, Clone, Parser)]
struct RunArgs {
	/// A `*.test.json` file or a directory searched recursively for them
	#[arg(long)]
	eval_set: PathBuf,

	/// Eval config (JSON or YAML). Defaults to `test_config.json` beside each test file
	#[arg(long)]
	config: Option<PathBuf>,

	/// Runs per case (overrides the config)
	#[arg(long)]
	num_runs: Option<usize>,

	/// Runs in flight at once (overrides the config)
	#[arg(long)]
	concurrency: Option<usize>,

	/// HTTP agent endpoint. Receives POST { "eval_id", "run_index", "conversation" } and returns a JSON array of invocations
	#[arg(long, conflicts_with = "replay")]
	http_url: Option<String>,

	/// JSONL file of recorded trajectories: { "eval_id": string, "invocations": [...] } per line
	#[arg(long)]
	replay: Option<PathBuf>,

	/// Output JSON result to a file
	#[arg(long)]
	json_out: Option<PathBuf>,

	/// Record inference errors as failures instead of aborting
	#[arg(long, action = ArgAction::SetTrue)]
	continue_on_error: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
	init_tracing();
	let cli = Cli::parse();
	let passed = match cli.command {
		Commands::Run(args) => run(args).await?,
	};
	if !passed {
		std::process::exit(1);
	}
	Ok(())
}

fn init_tracing() {
	let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
	tracing_subscriber::registry()
		.with(env_filter)
		.with(fmt::layer().with_target(false).with_writer(std::io::stderr))
		.try_init()
		.ok();
}

async fn run(args: RunArgs) -> Result<bool> {
	let config = match &args.config {
		Some(path) => Some(EvalConfig::load(path).await?),
		None => None,
	};

	let provider: Arc<dyn InferenceProvider> = if let Some(url) = args.http_url.clone() {
		http_provider(url)
	} else if let Some(path) = &args.replay {
		let content = tokio::fs::read_to_string(path)
			.await
			.with_context(|| format!("Failed to read replay file {:?}", path))?;
		Arc::new(ReplayProvider::from_jsonl(&content)?)
	} else {
		// No agent configured: replay each case's expected conversation
		tracing::warn!("no --http-url or --replay given, replaying expected conversations");
		Arc::new(ReplayProvider::expected())
	};

	let mut builder = RunAggregator::builder().provider(provider);
	let mut source = TestFileSource::new(&args.eval_set);
	if let Some(config) = config {
		builder = builder.config(&config);
		source = source.with_config(config);
	}
	if let Some(n) = args.num_runs {
		builder = builder.num_runs(n);
	}
	if let Some(n) = args.concurrency {
		builder = builder.concurrency(n);
	}
	if args.continue_on_error {
		builder = builder.on_run_error(RunErrorPolicy::RecordFailure);
	}

	let outcome = builder.build()?.run_source(&source).await?;
	println!("{}", outcome.summary_table());
	if !outcome.passed() {
		println!("{}", outcome.failure_message());
	}

	if let Some(path) = args.json_out {
		let json = serde_json::to_string_pretty(&outcome)?;
		tokio::fs::write(path, json).await?;
	}

	Ok(outcome.passed())
}

#[derive(Serialize)]
struct InferenceRequest {
	eval_id: String,
	run_index: usize,
	conversation: Vec<Invocation>,
}

fn http_provider(url: String) -> Arc<dyn InferenceProvider> {
	let client = reqwest::Client::new();
	from_async_fn(move |case: &EvalCase, run_index| {
		let client = client.clone();
		let url = url.clone();
		let request = InferenceRequest {
			eval_id: case.eval_id.clone(),
			run_index,
			conversation: case.conversation.clone(),
		};
		async move {
			let resp = client.post(&url).json(&request).send().await?;
			let status = resp.status();
			if !status.is_success() {
				let body = resp.text().await.unwrap_or_default();
				anyhow::bail!("HTTP {}: {}", status.as_u16(), body);
			}
			let v = resp.json::<serde_json::Value>().await?;
			let invocations: Vec<Invocation> = serde_json::from_value(v.clone())
				.with_context(|| format!("Expected a JSON array of invocations, got {}", v))?;
			Ok(invocations)
		}
	})
}
