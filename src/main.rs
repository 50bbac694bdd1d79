//! Work Order Safety: command line entry point
//!
//! Lists work orders, runs safety checks (polled or streamed), looks up
//! nearby emergencies, renders the browser runtime config and edits the
//! stored settings.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Args, Parser, Subcommand, ValueEnum};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use workorder_safety::models::settings::{AppConfig, LogFormat, LogLevel, SettingsUpdate};
use workorder_safety::services::runtime_config::{
    handle_resource_event, write_config_js, ResourceEvent, RuntimeConfigParams,
};
use workorder_safety::services::{
    ApiClient, ReportSnapshot, SafetyCheckService, WatchMode, WebSocketConnector,
};
use workorder_safety::storage::ConfigService;

#[derive(Parser)]
#[command(name = "workorder-safety")]
#[command(about = "Hazard and weather safety checks for field work orders")]
#[command(version)]
struct Cli {
    /// Configuration file path (defaults to ~/.workorder-safety/config.json)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Verbosity level (overrides the configured log level)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List work orders with their locations
    List,

    /// Run a safety check for a work order
    Check {
        /// Work order id
        work_order_id: String,

        /// How to follow the submitted job
        #[arg(short, long, value_enum, default_value_t = CliWatchMode::Poll)]
        mode: CliWatchMode,
    },

    /// Show emergencies near a work order's location
    Emergencies {
        /// Work order id
        work_order_id: String,
    },

    /// Write the browser runtime config (config.js)
    RenderConfig {
        /// Output path
        #[arg(short, long)]
        out: PathBuf,

        /// Lifecycle event JSON to apply instead of the local configuration
        #[arg(long)]
        event: Option<PathBuf>,

        /// Physical id reported for create and update events
        #[arg(long, default_value = "workorder-safety-runtime-config")]
        physical_id: String,
    },

    /// Show or change the stored configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the configuration as JSON (the auth token is never shown)
    Show,

    /// Change individual settings and save them
    Set(ConfigSetArgs),
}

#[derive(Args)]
struct ConfigSetArgs {
    #[arg(long)]
    api_endpoint: Option<String>,

    #[arg(long)]
    workorder_api_endpoint: Option<String>,

    /// Push endpoint (ws:// or wss://); an empty value clears it
    #[arg(long)]
    websocket_endpoint: Option<String>,

    #[arg(long)]
    region_name: Option<String>,

    #[arg(long)]
    poll_max_attempts: Option<u32>,

    #[arg(long)]
    poll_interval_ms: Option<u64>,

    #[arg(long)]
    subscription_timeout_ms: Option<u64>,
}

impl From<ConfigSetArgs> for SettingsUpdate {
    fn from(args: ConfigSetArgs) -> Self {
        SettingsUpdate {
            api_endpoint: args.api_endpoint,
            workorder_api_endpoint: args.workorder_api_endpoint,
            websocket_endpoint: args.websocket_endpoint,
            region_name: args.region_name,
            poll_max_attempts: args.poll_max_attempts,
            poll_interval_ms: args.poll_interval_ms,
            subscription_timeout_ms: args.subscription_timeout_ms,
            logging: None,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum CliWatchMode {
    Poll,
    Subscribe,
}

impl From<CliWatchMode> for WatchMode {
    fn from(mode: CliWatchMode) -> Self {
        match mode {
            CliWatchMode::Poll => WatchMode::Poll,
            CliWatchMode::Subscribe => WatchMode::Subscribe,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut service = match &cli.config {
        Some(path) => ConfigService::open(path),
        None => ConfigService::new(),
    }
    .context("loading configuration")?;
    init_tracing(service.get_config(), cli.verbose)?;
    info!(path = %service.path().display(), "configuration loaded");

    match cli.command {
        Commands::Config { action } => configure(&mut service, action),
        Commands::List => list_work_orders(service.get_config()).await,
        Commands::Check {
            work_order_id,
            mode,
        } => run_safety_check(service.get_config(), &work_order_id, mode.into()).await,
        Commands::Emergencies { work_order_id } => {
            show_emergencies(service.get_config(), &work_order_id).await
        }
        Commands::RenderConfig {
            out,
            event,
            physical_id,
        } => render_config(service.get_config(), out, event, &physical_id),
    }
}

fn init_tracing(config: &AppConfig, verbose: u8) -> Result<()> {
    let level = match verbose {
        0 => config.logging.level,
        1 => LogLevel::Debug,
        _ => LogLevel::Trace,
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "workorder_safety={level},workorder_safety_core={level}"
        ))
    });

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    let result = match config.logging.format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    result.map_err(|e| anyhow::anyhow!("installing log subscriber: {}", e))
}

async fn list_work_orders(config: &AppConfig) -> Result<()> {
    let client = ApiClient::new(config)?;
    let orders = client.list_work_orders().await?;

    for order in &orders {
        let location = order
            .location_details
            .as_ref()
            .and_then(|l| l.location_name.as_deref())
            .unwrap_or("-");
        println!(
            "{:<12} {:<8} {:<14} {:<24} {}",
            order.work_order_id,
            order.status_indicator(),
            order.status.as_deref().unwrap_or("-"),
            location,
            order.description.as_deref().unwrap_or("")
        );
    }
    println!("{} work orders", orders.len());
    Ok(())
}

async fn run_safety_check(config: &AppConfig, work_order_id: &str, mode: WatchMode) -> Result<()> {
    let client = ApiClient::new(config)?;
    let work_order = client.get_work_order(work_order_id).await?;

    let connector = match mode {
        WatchMode::Subscribe => Some(WebSocketConnector::from_config(config)?),
        WatchMode::Poll => None,
    };

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, cancelling safety check");
            ctrl_c.cancel();
        }
    });

    let (tx, mut rx) = mpsc::channel::<ReportSnapshot>(32);
    let progress = tokio::spawn(async move {
        while let Some(snapshot) = rx.recv().await {
            if snapshot.missing_indices.is_empty() {
                eprintln!("[{}] {} chars received", snapshot.job_id, snapshot.text.len());
            } else {
                eprintln!(
                    "[{}] {} chars received, waiting for chunks {:?}",
                    snapshot.job_id,
                    snapshot.text.len(),
                    snapshot.missing_indices
                );
            }
        }
    });

    let report = SafetyCheckService::new(&client, connector.as_ref(), config.watch_config())
        .with_snapshots(tx)
        .with_cancellation_token(cancel)
        .run(&work_order, mode)
        .await?;
    let _ = progress.await;

    if !report.text.is_empty() {
        println!("{}", report.text);
    }
    match report.user_message() {
        Some(message) => bail!("{} (job {})", message, report.job_id),
        None => Ok(()),
    }
}

async fn show_emergencies(config: &AppConfig, work_order_id: &str) -> Result<()> {
    let client = ApiClient::new(config)?;
    let work_order = client.get_work_order(work_order_id).await?;
    let emergencies = client.check_emergencies(&work_order).await?;

    for emergency in &emergencies {
        let position = emergency
            .geometry
            .point()
            .map(|(lat, lon)| format!("{:.4},{:.4}", lat, lon))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<10} {:<22} {}",
            emergency.properties.status,
            position,
            emergency.headline()
        );
    }
    println!("{} emergencies near {}", emergencies.len(), work_order_id);
    Ok(())
}

fn render_config(
    config: &AppConfig,
    out: PathBuf,
    event: Option<PathBuf>,
    physical_id: &str,
) -> Result<()> {
    match event {
        Some(event_path) => {
            let raw = std::fs::read_to_string(&event_path)
                .with_context(|| format!("reading {}", event_path.display()))?;
            let event: ResourceEvent = serde_json::from_str(&raw)
                .with_context(|| format!("parsing {}", event_path.display()))?;
            let response = handle_resource_event(&event, &out, physical_id, Utc::now())?;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        None => {
            write_config_js(&out, &RuntimeConfigParams::from(config), Utc::now())?;
            println!("wrote {}", out.display());
        }
    }
    Ok(())
}
