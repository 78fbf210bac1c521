//! GamePulse CLI
//!
//! Command-line interface for the GamePulse gaming analytics assistant.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde_json::json;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{info, warn};

use gamepulse::agent::{ChatAgent, OpenAiBackend};
use gamepulse::config::{available_platforms, RoutingStrategy};
use gamepulse::models::Platform;
use gamepulse::respond::{Assistant, ChartBuilder, JsonChartBuilder, Response};
use gamepulse::routing::Registry;
use gamepulse::usage::{FileUsageStore, UsageTracker};
use gamepulse::Config;

/// GamePulse - Conversational analytics over gaming data APIs
#[derive(Parser)]
#[command(name = "gamepulse")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true, env = "GAMEPULSE_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Answer a single question
    Ask {
        /// The question, e.g. "top games on twitch"
        #[arg(required = true, num_args = 1..)]
        query: Vec<String>,

        /// Routing strategy (registry, intent)
        #[arg(long)]
        strategy: Option<RoutingStrategy>,

        /// Print the answer, rows and chart figure as JSON
        #[arg(long)]
        json: bool,
    },

    /// Start an interactive session
    Chat {
        /// Use the rule-based assistant even when a language model is configured
        #[arg(long)]
        no_llm: bool,
    },

    /// Inspect and manage monthly API usage
    Usage {
        #[command(subcommand)]
        command: UsageCommands,
    },

    /// List registry metrics and whether their source is available
    Metrics,

    /// List data sources and whether they are configured
    Sources,
}

#[derive(Subcommand)]
enum UsageCommands {
    /// Show calls, limits and status per API
    Show {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Reset all monthly counters to zero
    Reset,

    /// Show the estimated cost of this month's calls
    Cost,
}

#[tokio::main]
async fn main() -> ExitCode {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration
    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    init_logging(&config, cli.verbose);

    // Execute command
    let result = match cli.command {
        Commands::Ask {
            query,
            strategy,
            json,
        } => run_ask(config, &query.join(" "), strategy, json).await,
        Commands::Chat { no_llm } => run_chat(config, no_llm).await,
        Commands::Usage { command } => run_usage(&config, command),
        Commands::Metrics => run_metrics(&config),
        Commands::Sources => run_sources(&config),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(config: &Config, verbose: bool) {
    let level = if verbose { "debug" } else { config.logging.level.as_str() };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if config.logging.format.eq_ignore_ascii_case("json") {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn run_ask(
    mut config: Config,
    query: &str,
    strategy: Option<RoutingStrategy>,
    as_json: bool,
) -> anyhow::Result<()> {
    if let Some(strategy) = strategy {
        config.routing.strategy = strategy;
    }
    let assistant = Assistant::from_config(&config)?;
    let response = assistant.respond(query).await;

    if as_json {
        let figure = match (&response.chart, &response.table) {
            (Some(spec), Some(table)) => Some(JsonChartBuilder.build(spec, table)),
            _ => None,
        };
        let output = json!({
            "text": response.text,
            "chart": response.chart,
            "table": response.table,
            "figure": figure,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        print_response(&response);
    }
    Ok(())
}

async fn run_chat(config: Config, no_llm: bool) -> anyhow::Result<()> {
    let assistant = Arc::new(Assistant::from_config(&config)?);
    let mut agent = if no_llm {
        None
    } else {
        match OpenAiBackend::new(&config.nlu) {
            Ok(backend) => Some(ChatAgent::new(
                Arc::new(backend),
                Arc::clone(&assistant),
                config.nlu.max_tool_rounds,
            )),
            Err(e) => {
                warn!(error = %e, "Language model unavailable, using rule-based answers");
                None
            }
        }
    };
    info!(llm = agent.is_some(), "Starting chat session");

    println!("GamePulse - ask about games, players and viewers. Type 'exit' to quit, '/clear' to start over.");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    loop {
        stdout.write_all(b"\n> ").await?;
        stdout.flush().await?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        match line {
            "" => continue,
            "exit" | "quit" => break,
            "/clear" => {
                if let Some(agent) = agent.as_mut() {
                    agent.clear_history();
                }
                println!("Conversation cleared.");
                continue;
            }
            _ => {}
        }

        let response = match agent.as_mut() {
            Some(agent) => agent.respond(line).await,
            None => assistant.respond(line).await,
        };
        print_response(&response);
    }
    Ok(())
}

fn print_response(response: &Response) {
    println!("{}", response.text);
    if let Some(chart) = &response.chart {
        println!("\n[{} chart] {}", chart.chart_type.as_str(), chart.title);
    }
}

fn usage_tracker(config: &Config) -> anyhow::Result<UsageTracker> {
    let store = Arc::new(FileUsageStore::new(config.usage.file_path()));
    Ok(UsageTracker::new(store, config.usage.limits.clone())?)
}

fn run_usage(config: &Config, command: UsageCommands) -> anyhow::Result<()> {
    let tracker = usage_tracker(config)?;
    match command {
        UsageCommands::Show { json } => {
            let summary = tracker.summary();
            if json {
                let output = json!({
                    "usage": summary,
                    "last_reset": tracker.last_reset(),
                });
                println!("{}", serde_json::to_string_pretty(&output)?);
                return Ok(());
            }
            println!("API usage since {}", tracker.last_reset().format("%Y-%m-%d"));
            println!("{:<12} {:>10} {:>10} {:>8}  STATUS", "API", "CALLS", "LIMIT", "USED");
            for (api, entry) in &summary {
                let limit = entry
                    .limit
                    .map_or_else(|| "unlimited".to_string(), |l| l.to_string());
                println!(
                    "{:<12} {:>10} {:>10} {:>7.1}%  {}",
                    api,
                    entry.usage,
                    limit,
                    entry.percentage,
                    entry.status.as_str()
                );
            }
        }
        UsageCommands::Reset => {
            tracker.reset()?;
            println!("Monthly API usage counters have been reset.");
        }
        UsageCommands::Cost => {
            let cost = tracker.cost_estimate();
            for (api, amount) in &cost.individual_costs {
                println!("{api:<12} ${amount:.2}");
            }
            println!("{:<12} ${:.2} {}", "total", cost.total_estimated, cost.currency);
        }
    }
    Ok(())
}

fn run_metrics(config: &Config) -> anyhow::Result<()> {
    let available = Registry::available(&available_platforms(config));
    let available: Vec<&str> = available.keys().collect();
    for metric in Registry::default().iter() {
        let marker = if available.contains(&metric.key) { "+" } else { "-" };
        println!(
            "{marker} {:<34} {:<16} {}",
            metric.key,
            metric.api.as_str(),
            metric.description
        );
    }
    Ok(())
}

fn run_sources(config: &Config) -> anyhow::Result<()> {
    let available = available_platforms(config);
    for platform in Platform::ALL {
        let status = if available.contains(&platform) {
            "configured"
        } else {
            "missing credentials"
        };
        println!("{:<10} {status}", platform.display_name());
    }
    Ok(())
}
