use std::{env, path::PathBuf, sync::Arc, time::Duration};

use clap::Parser;
use toolprobe::{
    builtin_scenarios, load_scenarios, EndpointClient, EndpointConfig, ProbeReport, Scenario,
    ScenarioRunner,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "toolprobe")]
#[command(about = "Probe tool-calling conformance of an OpenAI-compatible chat endpoint")]
struct Args {
    /// Base URL of the endpoint (or TOOLPROBE_BASE_URL)
    #[arg(long)]
    base_url: Option<String>,

    /// API key; may be empty for local servers (or TOOLPROBE_API_KEY)
    #[arg(long)]
    api_key: Option<String>,

    /// Model identifier or alias (or TOOLPROBE_MODEL)
    #[arg(long)]
    model: Option<String>,

    /// Per-request timeout in seconds (or TOOLPROBE_TIMEOUT_SECS)
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Path to a scenario file or directory (YAML/JSON); built-in scenarios when omitted
    #[arg(long)]
    scenarios: Option<PathBuf>,

    /// Run only scenarios whose id contains this substring (repeatable)
    #[arg(long)]
    filter: Vec<String>,

    /// Append outcomes as JSONL to this path
    #[arg(long)]
    out: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let mut config = EndpointConfig::from_env();
    if let Some(base_url) = args.base_url {
        config = config.with_base_url(base_url);
    }
    if let Some(api_key) = args.api_key {
        config = config.with_api_key(api_key);
    }
    if let Some(secs) = args.timeout_secs {
        config = config.with_timeout(Duration::from_secs(secs));
    }

    let model = args
        .model
        .or_else(|| env::var("TOOLPROBE_MODEL").ok())
        .unwrap_or_else(|| "phi-4".to_string());

    let scenarios = match &args.scenarios {
        Some(path) => load_scenarios(path)?,
        None => builtin_scenarios(),
    };
    let scenarios = filter_scenarios(scenarios, &args.filter);
    if scenarios.is_empty() {
        eprintln!("No scenarios matched.");
        std::process::exit(2);
    }

    let endpoint = Arc::new(EndpointClient::from_config(config)?);
    let runner = ScenarioRunner::new(endpoint, model);
    let outcomes = runner.run(&scenarios).await;
    let report = ProbeReport::from_outcomes(outcomes);

    if let Some(out) = &args.out {
        ensure_parent_dir(out)?;
        report.write_jsonl(out)?;
    }

    print!("{}", report.render());

    if report.all_passed() {
        Ok(())
    } else {
        std::process::exit(1);
    }
}

fn filter_scenarios(mut scenarios: Vec<Scenario>, filters: &[String]) -> Vec<Scenario> {
    if filters.is_empty() {
        return scenarios;
    }
    scenarios.retain(|s| filters.iter().any(|f| s.id.contains(f)));
    scenarios
}

fn ensure_parent_dir(path: &std::path::Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}
