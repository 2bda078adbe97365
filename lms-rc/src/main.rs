//! lms-rc (Reclassification) - moves completed training progress between
//! categories
//!
//! `lms-rc run` migrates once and exits; `lms-rc serve` exposes the same
//! migration behind `POST /api/reclassify`.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use lms_common::api::load_api_secret;
use lms_common::config::{
    load_toml_config, locate_config_file, resolve_settings, CliOverrides, Settings,
};
use lms_common::db::init_database;
use lms_common::Category;
use lms_rc::config::load_plans;
use lms_rc::reclassify::{
    run_plans, CompletedDatePolicy, ConflictPolicy, MatchKey, MigrationPlan, MissingTargetPolicy,
};
use lms_rc::{build_router, AppState};
use tokio::signal;
use tracing::{error, info, warn};

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(name = "lms-rc")]
#[command(about = "Training reclassification for the LMS")]
#[command(version)]
struct Cli {
    /// Config file (default: ~/.config/lms/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// SQLite database file
    #[arg(short, long)]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the migration once and print the reports (default)
    Run(RunArgs),
    /// Serve the migration trigger over HTTP
    Serve(ServeArgs),
}

#[derive(Args, Debug, Default)]
struct RunArgs {
    /// Training to migrate instead of the configured plans
    #[arg(long, requires_all = ["from", "to"])]
    training: Option<String>,

    /// Source category
    #[arg(long, requires = "training")]
    from: Option<Category>,

    /// Target category
    #[arg(long, requires = "training")]
    to: Option<Category>,

    /// Match progress records through training definitions
    #[arg(long, requires = "training")]
    by_definition: bool,

    /// Keep the source completion date instead of restamping
    #[arg(long, requires = "training")]
    preserve_completed_date: bool,

    /// Replace an existing target record instead of keeping it
    #[arg(long, requires = "training")]
    replace_target: bool,

    /// Fail when the target definition is missing instead of skipping
    #[arg(long, requires = "training")]
    abort_on_missing_target: bool,
}

impl RunArgs {
    /// Plan described on the command line, if any
    fn plan(&self) -> Option<MigrationPlan> {
        let (training, from, to) = (self.training.as_ref()?, self.from?, self.to?);

        let mut plan = MigrationPlan::new(training.as_str(), from, to);
        if self.by_definition {
            plan = plan.match_key(MatchKey::Definition);
        }
        if self.preserve_completed_date {
            plan = plan.completed_date(CompletedDatePolicy::Preserve);
        }
        if self.replace_target {
            plan = plan.on_conflict(ConflictPolicy::ReplaceTarget);
        }
        if self.abort_on_missing_target {
            plan = plan.on_missing_target(MissingTargetPolicy::Abort);
        }
        Some(plan)
    }
}

#[derive(Args, Debug, Default)]
struct ServeArgs {
    /// Address to bind
    #[arg(long)]
    bind: Option<String>,

    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = locate_config_file(cli.config.as_deref());
    let toml_result = load_toml_config(config_path.as_deref());
    let toml_config = toml_result.as_ref().cloned().unwrap_or_default();

    // Initialize tracing subscriber; RUST_LOG wins over the configured level
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&toml_config.logging.level)),
        )
        .init();

    // Log build identification immediately after tracing init
    info!(
        "Starting LMS Reclassification (lms-rc) v{}",
        env!("CARGO_PKG_VERSION")
    );

    match (&config_path, &toml_result) {
        (Some(path), Ok(_)) => info!("Config file: {}", path.display()),
        (Some(_), Err(e)) => warn!("{} - continuing with defaults", e),
        (None, _) => info!("No config file found, using defaults"),
    }

    let command = cli.command.unwrap_or(Command::Run(RunArgs::default()));
    let overrides = match &command {
        Command::Serve(args) => CliOverrides {
            database_path: cli.database.clone(),
            bind_address: args.bind.clone(),
            port: args.port,
            api_secret: None,
        },
        Command::Run(_) => CliOverrides {
            database_path: cli.database.clone(),
            ..Default::default()
        },
    };
    let settings = resolve_settings(&overrides, &toml_config);
    info!("Database path: {}", settings.database_path.display());

    match command {
        Command::Run(args) => {
            let plans = match args.plan() {
                Some(plan) => vec![plan],
                None => load_plans(config_path.as_deref()).context("Failed to load plans")?,
            };
            run(&settings, &plans).await
        }
        Command::Serve(_) => {
            let plans = load_plans(config_path.as_deref()).context("Failed to load plans")?;
            serve(settings, plans).await
        }
    }
}

/// One-shot migration: print each report as JSON
async fn run(settings: &Settings, plans: &[MigrationPlan]) -> Result<()> {
    let reports = match run_plans(&settings.database_path, plans).await {
        Ok(reports) => reports,
        Err(e) => {
            error!("Reclassification aborted: {}", e);
            if let Some(partial) = e.partial() {
                println!("{}", serde_json::to_string_pretty(partial)?);
            }
            return Err(e.into());
        }
    };

    for report in &reports {
        println!("{}", serde_json::to_string_pretty(report)?);
    }

    let failed: usize = reports.iter().map(|r| r.failed.len()).sum();
    if failed > 0 {
        bail!("{} record(s) failed to migrate; re-run to retry", failed);
    }

    info!("Reclassification complete");
    Ok(())
}

/// HTTP trigger
async fn serve(settings: Settings, plans: Vec<MigrationPlan>) -> Result<()> {
    let pool = init_database(&settings.database_path)
        .await
        .context("Failed to open database")?;
    info!("✓ Connected to database");

    let api_secret = match settings.api_secret {
        Some(secret) => Some(secret),
        None => load_api_secret(&pool).await.unwrap_or_else(|e| {
            warn!("Failed to load API secret from settings: {}", e);
            None
        }),
    };
    if api_secret.is_some() {
        info!("✓ Bearer token authentication enabled");
    } else {
        warn!("API authentication disabled (no api_secret configured)");
    }

    let state = AppState::new(pool.clone(), api_secret, plans);
    let app = build_router(state);

    let addr = format!("{}:{}", settings.bind_address, settings.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("lms-rc listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    pool.close().await;
    info!("Shutdown complete");
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
