use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, warn};

use catalog_mirror::config;
use catalog_mirror::cycle::{CycleDriver, NotifyText};
use catalog_mirror::db;
use catalog_mirror::ingest::IngestClient;
use catalog_mirror::notify::{DesktopNotifier, LogNotifier, Notifier};
use catalog_mirror::reconcile::{ReconcileOptions, Reconciler};
use catalog_mirror::source::SqlCatalog;
use catalog_mirror::staging::Stager;

#[derive(Debug, Parser)]
#[command(author, version, about = "Mirror the product catalog into the ingestion service")]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    /// Run a single sync cycle and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    let cfg = config::load(Some(&args.config))?;
    cfg.ensure_dirs()?;

    // An unreachable catalog is fatal only here, at startup.
    let source = SqlCatalog::connect(&cfg.source)
        .await
        .context("catalog source unavailable")?;

    let database_url = std::env::var("DATABASE_URL").unwrap_or_else(|_| cfg.ledger_url());
    let ledger = db::init_pool(&database_url).await?;
    db::run_migrations(&ledger).await?;

    let stager = Stager::new(cfg.app.resolved_scratch_dir());
    if let Err(err) = stager.purge().await {
        warn!(?err, dir = %stager.dir().display(), "failed to purge staging dir");
    }

    let ingest = IngestClient::from_config(&cfg)?;
    let notifier: Box<dyn Notifier> = if cfg.notify.desktop {
        Box::new(DesktopNotifier)
    } else {
        Box::new(LogNotifier)
    };

    let reconciler = Reconciler::new(&source, &ledger, &stager, &ingest, &ingest)
        .with_options(ReconcileOptions::from(&cfg.sync));
    let text = NotifyText {
        title: cfg.notify.title.clone(),
        subtitle: cfg.notify.subtitle.clone(),
    };
    let mut driver = CycleDriver::new(&reconciler, notifier.as_ref(), text, cfg.app.interval());

    if args.once {
        let report = driver.run_once().await;
        info!(pending = report.pending_count(), "single sync cycle completed");
        return Ok(());
    }

    info!(interval_secs = cfg.app.interval_seconds, "starting catalog mirror");
    driver.run_forever().await;
    Ok(())
}
