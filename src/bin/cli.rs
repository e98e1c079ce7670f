use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use music_collection_bulk_ops as lib;
use lib::api::{bandcamp::BandcampProvider, mock::MockProvider, Provider};
use lib::config::Config;
use lib::engine::{BulkEngine, EngineOptions};
use lib::protocol::{Command as ChannelCommand, ImportInput, Outbound};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::subscriber as tracing_subscriber_global;
use tracing_appender::rolling::RollingFileAppender;
use tracing_log::LogTracer;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "collection-bulk", version)]
struct Cli {
    /// Path to config TOML
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Use a scripted in-memory provider instead of the live site
    #[arg(long)]
    dry_run: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve WebSocket channels (long-running)
    Serve,
    /// Hide every visible item in the collection
    Hide {
        #[arg(long)]
        crumb: Option<String>,
    },
    /// Unhide every hidden item in the collection
    Unhide {
        #[arg(long)]
        crumb: Option<String>,
        /// One request at a time with a pause between requests
        #[arg(long)]
        legacy: bool,
    },
    /// Add items from a JSON file (array of cart items or of page URLs) to the cart
    Import {
        #[arg(long, value_name = "FILE")]
        file: PathBuf,
    },
    /// Resolve album/track page URLs and add them to the cart
    ImportUrls {
        #[arg(required = true)]
        urls: Vec<String>,
    },
    /// Validate config file and exit
    ConfigValidate,
}

fn load_config(explicit: Option<&PathBuf>) -> Result<Config> {
    // Explicit --config wins; otherwise use the per-user config if present,
    // falling back to built-in defaults.
    let path = match explicit {
        Some(p) => Some(p.clone()),
        None => dirs::config_dir()
            .map(|d| d.join("collection-bulk").join("config.toml"))
            .filter(|p| p.exists()),
    };
    match path {
        Some(p) => Config::from_path(&p).with_context(|| format!("loading config from {}", p.display())),
        None => Ok(Config::default()),
    }
}

fn init_logging(cfg: &Config) -> tracing_appender::non_blocking::WorkerGuard {
    // Logs go to stderr (stdout carries outbound messages) and a
    // daily-rotated file in cfg.log_dir.
    let _ = LogTracer::init();
    let file_appender: RollingFileAppender = tracing_appender::rolling::daily(&cfg.log_dir, "collection-bulk.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let file_layer = fmt::layer().with_ansi(false).with_writer(non_blocking);
    let stderr_layer = fmt::layer().with_writer(std::io::stderr);

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stderr_layer);

    if let Err(e) = tracing_subscriber_global::set_global_default(subscriber) {
        eprintln!("failed to set global tracing subscriber: {}", e);
    }
    guard
}

/// Run one command against a local engine, printing every outbound
/// message as a JSON line. Returns false if the run ended in a fatal error.
async fn run_once(provider: Arc<dyn Provider>, options: EngineOptions, cmd: ChannelCommand) -> Result<bool> {
    let (tx, mut rx) = mpsc::unbounded_channel::<Outbound>();
    let printer = tokio::spawn(async move {
        let mut fatal = false;
        while let Some(msg) = rx.recv().await {
            fatal |= matches!(msg, Outbound::FatalError { .. });
            println!("{}", msg.to_json());
        }
        fatal
    });

    let mut engine = BulkEngine::new(provider, options, tx);
    engine.handle(cmd).await;
    drop(engine);

    let fatal = printer.await.context("joining output printer")?;
    Ok(!fatal)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Commands::ConfigValidate = cli.command {
        match load_config(cli.config.as_ref()) {
            Ok(_) => println!("OK"),
            Err(e) => {
                eprintln!("Config validation failed: {:#}", e);
                std::process::exit(2);
            }
        }
        return Ok(());
    }

    let cfg = load_config(cli.config.as_ref())?;
    let _guard = init_logging(&cfg);

    let provider: Arc<dyn Provider> = if cli.dry_run {
        tracing::info!("Dry run: using mock provider");
        Arc::new(MockProvider::demo())
    } else {
        Arc::new(BandcampProvider::from_config(&cfg))
    };

    let (options, cmd) = match cli.command {
        Commands::Serve => {
            lib::server::serve(cfg, provider).await.context("running channel server")?;
            return Ok(());
        }
        Commands::Hide { crumb } => (EngineOptions::from_config(&cfg), ChannelCommand::StartBulkHide { crumb }),
        Commands::Unhide { crumb, legacy } => {
            let options = if legacy { EngineOptions::legacy(&cfg) } else { EngineOptions::from_config(&cfg) };
            (options, ChannelCommand::StartBulkUnhide { crumb })
        }
        Commands::Import { file } => {
            let s = std::fs::read_to_string(&file)
                .with_context(|| format!("reading import file {}", file.display()))?;
            let input: ImportInput = serde_json::from_str(&s)
                .with_context(|| format!("parsing import file {}", file.display()))?;
            (EngineOptions::from_config(&cfg), ChannelCommand::StartBulkImport(input))
        }
        Commands::ImportUrls { urls } => (
            EngineOptions::from_config(&cfg),
            ChannelCommand::StartBulkImport(ImportInput::Urls(urls)),
        ),
        Commands::ConfigValidate => return Ok(()),
    };

    if !run_once(provider, options, cmd).await? {
        std::process::exit(1);
    }
    Ok(())
}
