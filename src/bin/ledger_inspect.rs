use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

use catalog_mirror::config;
use catalog_mirror::db;

#[derive(Parser, Debug)]
#[command(about = "Print the rows of the sync ledger")]
struct Args {
    /// Path to YAML config
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,
    /// Only report whether this product code has a ledger row
    #[arg(long)]
    code: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let cfg = config::load(Some(&args.config))?;

    let database_url = std::env::var("DATABASE_URL").unwrap_or_else(|_| cfg.ledger_url());
    let pool = db::init_pool(&database_url).await?;
    db::run_migrations(&pool).await?;

    if let Some(code) = args.code.as_deref() {
        let synced = db::exists(&pool, code).await?;
        println!("{}: {}", code, if synced { "synced" } else { "not synced" });
        return Ok(());
    }

    let records = db::list_records(&pool).await?;
    println!("Ledger: {} ({} rows)", database_url, records.len());
    for rec in records {
        println!(
            "  {} -> {{ name: {}, price: {}, photo_size: {}, asset_id: {}, last_synced: {} }}",
            rec.code,
            rec.name,
            rec.price,
            rec.photo_size,
            rec.asset_id.map_or_else(|| "-".to_string(), |id| id.to_string()),
            rec.last_synced.to_rfc3339()
        );
    }
    Ok(())
}
