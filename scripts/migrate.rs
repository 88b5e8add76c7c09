#![allow(clippy::unwrap_used, clippy::expect_used)]

use anyhow::Result;
use clap::{Parser, Subcommand};
use sqlx::Row;
use std::path::PathBuf;

use tripwright::{budget, db, migrate};

#[derive(Parser)]
#[command(name = "migrate", about = "Tripwright migration helper")]
struct Cli {
    /// Database path
    #[arg(long, value_name = "PATH", default_value = "tripwright.sqlite3")]
    db: PathBuf,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Show embedded migrations and whether each is applied
    #[command(about, long_about = None)]
    Status,
    /// Apply pending schema migrations
    #[command(about, long_about = None)]
    Up,
    /// Extract legacy wizardBudget objects into the budgets table for one
    /// owner's trips
    #[command(about, long_about = None)]
    WizardBudgets {
        /// Owner whose trips are scanned
        #[arg(long, value_name = "USER_ID")]
        owner: String,
        /// Count migratable trips without writing
        #[arg(long)]
        dry_run: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tripwright::logging::init();

    let cli = Cli::parse();
    let pool = db::open_sqlite_pool(&cli.db).await?;

    match cli.cmd {
        Cmd::Status => status(&pool, &cli.db).await,
        Cmd::Up => {
            migrate::apply_migrations(&pool).await?;
            println!("Migrations applied.");
            Ok(())
        }
        Cmd::WizardBudgets { owner, dry_run } => {
            migrate::apply_migrations(&pool).await?;
            let report = budget::migrate_wizard_budgets(&pool, &owner, dry_run).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
    }
}

async fn status(pool: &sqlx::SqlitePool, db: &std::path::Path) -> Result<()> {
    let exists: Option<i64> = sqlx::query_scalar(
        "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_migrations'",
    )
    .fetch_optional(pool)
    .await?;

    let applied: Vec<String> = if exists.is_some() {
        sqlx::query("SELECT version FROM schema_migrations")
            .fetch_all(pool)
            .await?
            .into_iter()
            .filter_map(|r| r.try_get::<String, _>("version").ok())
            .collect()
    } else {
        Vec::new()
    };

    println!("DB: {}", db.display());
    for (filename, _) in migrate::MIGRATIONS {
        let state = if applied.iter().any(|v| v == filename) {
            "applied"
        } else {
            "pending"
        };
        println!("{filename:<40}  {state}");
    }
    Ok(())
}
