mod doctor;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{CommandFactory, Parser, Subcommand};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use marketmate_agent::{keys, Context, MarketAnalyzer, Ports, RunLogger, RunRecord, TextReportSink};
use marketmate_core::config::AppConfig;
use marketmate_core::types::RunId;

#[derive(Parser)]
#[command(name = "marketmate", version, about = "Market analysis for a product line")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "marketmate.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a full market analysis
    Analyze {
        /// Product line to analyze
        #[arg(trailing_var_arg = true, required = true)]
        subject: Vec<String>,
        /// Preferred region, e.g. "Indore, Madhya Pradesh, India"
        #[arg(long, short)]
        region: Option<String>,
        /// Print the final context and run record as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the stored snapshot for a subject
    History {
        #[arg(trailing_var_arg = true, required = true)]
        subject: Vec<String>,
    },
    /// Show current configuration
    Config,
    /// Run system health checks
    Doctor,
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("marketmate=info,warn")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    // Handle completions before config loading
    if let Commands::Completions { shell } = cli.command {
        let mut cmd = Cli::command();
        clap_complete::generate(shell, &mut cmd, "marketmate", &mut std::io::stdout());
        return Ok(());
    }

    let config = load_config(&cli.config)?;

    match cli.command {
        Commands::Analyze {
            subject,
            region,
            json,
        } => {
            run_analysis(&config, subject.join(" "), region, json).await?;
        }
        Commands::History { subject } => {
            let subject = subject.join(" ");
            let store = marketmate_memory::open_store(&config)?;
            let key = marketmate_memory::normalize_key(&subject);
            match store.get(&key).await? {
                Some(snapshot) => println!("{}", serde_json::to_string_pretty(&snapshot)?),
                None => println!("No stored snapshot for \"{}\" (key {})", subject, key),
            }
        }
        Commands::Config => {
            println!("{}", toml::to_string_pretty(&config)?);
        }
        Commands::Doctor => {
            println!("MarketMate Doctor");
            println!("=================");
            println!();
            doctor::run_doctor(&config).await;
        }
        Commands::Completions { .. } => {}
    }

    Ok(())
}

/// Config lookup: explicit path, then `~/.marketmate/config.toml`, then environment.
fn load_config(path: &Path) -> anyhow::Result<AppConfig> {
    if path.exists() {
        return Ok(AppConfig::load(path)?);
    }

    if let Some(home_config) = dirs_home().map(|h| h.join(".marketmate").join("config.toml")) {
        if home_config.exists() {
            info!(path = %home_config.display(), "Loading config from home directory");
            return Ok(AppConfig::load(&home_config)?);
        }
    }

    eprintln!("Warning: No config file found. Using environment variables.");
    eprintln!("Set GOOGLE_API_KEY or OPENAI_API_KEY, and SERPAPI_API_KEY or TAVILY_API_KEY.");
    Ok(AppConfig::from_env())
}

async fn run_analysis(
    config: &AppConfig,
    subject: String,
    region: Option<String>,
    json: bool,
) -> anyhow::Result<()> {
    let workspace = config.workspace_dir();
    std::fs::create_dir_all(&workspace).ok();

    let store = marketmate_memory::open_store(config)?;
    let ports = Ports::new(
        marketmate_llm::create_invoker(&config.model),
        marketmate_search::create_search_provider(config.search.as_ref()),
        Arc::new(TextReportSink::from_config(config)),
    );
    if config.search.is_none() {
        warn!("No [search] section configured; search-backed steps will use fallbacks");
    }
    let analyzer = MarketAnalyzer::new(ports, store, &config.pipeline);

    let run_id = RunId::new();
    let cancel = CancellationToken::new();
    let logger = config.log.as_ref().filter(|l| l.enabled).map(|l| {
        RunLogger::new(config.log_dir(), l.level).spawn(
            &analyzer.events(),
            run_id.clone(),
            cancel.clone(),
        )
    });

    let mut initial = Context::with_subject(subject);
    if let Some(region) = region {
        initial.set_str(keys::REGION, region);
    }

    let result = analyzer.analyze_with_id(initial, run_id).await;

    if let Some(handle) = logger {
        if result.is_err() {
            cancel.cancel();
        }
        if let Err(e) = handle.await {
            warn!(error = %e, "Run logger task failed");
        }
    }

    let (ctx, record) = result?;
    if json {
        let out = serde_json::json!({ "context": ctx, "run": record });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        print_summary(&ctx, &record);
    }
    Ok(())
}

fn print_summary(ctx: &Context, record: &RunRecord) {
    println!("Market analysis: {}", ctx.get_str(keys::SUBJECT).unwrap_or("-"));
    if let Some(region) = ctx.get_str(keys::REGION) {
        println!("Region: {}", region);
    }
    println!();

    let competitors = strings(ctx.get(keys::COMPETITORS));
    if competitors.is_empty() {
        println!("Competitors: none found");
    } else {
        println!("Competitors: {}", competitors.join(", "));
    }

    if let Some(reviews) = ctx.get(keys::REVIEWS) {
        println!(
            "Sentiment: {}",
            reviews.get("sentiment").and_then(Value::as_str).unwrap_or("-")
        );
    }

    let trends = strings(ctx.get(keys::TRENDS));
    if !trends.is_empty() {
        println!("Trends:");
        for trend in trends {
            println!("  - {}", trend);
        }
    }

    if let Some(recommendations) = ctx.get_str(keys::RECOMMENDATIONS) {
        println!();
        println!("{}", recommendations);
    }
    if let Some(report) = ctx.get_str(keys::REPORT) {
        println!();
        println!("Report: {}", report);
    }

    println!();
    println!("{}", record.summary());
}

fn strings(value: Option<&Value>) -> Vec<&str> {
    value
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default()
}

fn dirs_home() -> Option<PathBuf> {
    std::env::var("HOME").ok().map(PathBuf::from)
}
