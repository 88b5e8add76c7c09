use regex::Regex;
use sha2::{Digest, Sha256};
use sqlx::{Executor, Row, SqlitePool};
use std::collections::HashMap;

use crate::time::now_ms;
use tracing::{error, info};

fn preview(sql: &str) -> String {
    let one_line = sql.replace(['\n', '\t'], " ");
    let trimmed = one_line.trim();
    if trimmed.len() > 160 {
        format!("{}…", &trimmed[..160])
    } else {
        trimmed.to_string()
    }
}

pub static MIGRATIONS: &[(&str, &str)] = &[
    (
        "202601121200_initial.sql",
        include_str!("../migrations/202601121200_initial.sql"),
    ),
    (
        "202601121210_trips.sql",
        include_str!("../migrations/202601121210_trips.sql"),
    ),
    (
        "202601121220_domain_tables.sql",
        include_str!("../migrations/202601121220_domain_tables.sql"),
    ),
    (
        "202601201500_members_sharing.sql",
        include_str!("../migrations/202601201500_members_sharing.sql"),
    ),
    (
        "202602021100_read_path_indexes.sql",
        include_str!("../migrations/202602021100_read_path_indexes.sql"),
    ),
];

fn checksum_of(raw_sql: &str) -> String {
    let cleaned = raw_sql
        .lines()
        .filter(|line| {
            let t = line.trim_start();
            !(t.is_empty() || t.starts_with("--"))
        })
        .collect::<Vec<_>>()
        .join("\n");
    format!("{:x}", Sha256::digest(cleaned.as_bytes()))
}

pub async fn apply_migrations(pool: &SqlitePool) -> anyhow::Result<()> {
    pool.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (\
           version   TEXT PRIMARY KEY,\
           applied_at INTEGER NOT NULL,\
           checksum TEXT NOT NULL\
         )",
    )
    .await?;

    let rows = sqlx::query("SELECT version, checksum FROM schema_migrations")
        .fetch_all(pool)
        .await?;
    let mut applied: HashMap<String, String> = HashMap::new();
    for r in rows {
        if let (Ok(v), Ok(c)) = (
            r.try_get::<String, _>("version"),
            r.try_get::<String, _>("checksum"),
        ) {
            applied.insert(v, c);
        }
    }
    let add_col_re = Regex::new(r"(?i)^ALTER\s+TABLE\s+(\w+)\s+ADD\s+COLUMN\s+(\w+)")
        .expect("static pattern compiles");

    for (filename, raw_sql) in MIGRATIONS {
        let checksum = checksum_of(raw_sql);

        if let Some(stored) = applied.get(*filename) {
            if stored != &checksum {
                anyhow::bail!("migration {} edited after application", filename);
            }
            info!(target = "tripwright", event = "migration_skip_file", file = %filename);
            continue;
        }

        let mut tx = pool.begin().await?;
        for stmt in raw_sql.split(';') {
            let s = stmt.trim();
            if s.is_empty() {
                continue;
            }
            let upper = s.to_ascii_uppercase();
            let upper = upper
                .lines()
                .filter(|l| !l.trim_start().starts_with("--"))
                .collect::<Vec<_>>()
                .join("\n");
            let upper = upper.trim();
            if upper.is_empty() || upper == "BEGIN" || upper == "COMMIT" {
                continue;
            }
            // Guard re-runs of column additions on databases that predate
            // the checksum ledger.
            if let Some(caps) = add_col_re.captures(upper) {
                let table = caps.get(1).map(|m| m.as_str().to_ascii_lowercase());
                let col = caps.get(2).map(|m| m.as_str().to_ascii_lowercase());
                if let (Some(table), Some(col)) = (table, col) {
                    let exists: Option<i64> = sqlx::query_scalar(&format!(
                        "SELECT 1 FROM pragma_table_info('{table}') WHERE name='{col}'"
                    ))
                    .fetch_optional(&mut *tx)
                    .await?;
                    if exists.is_some() {
                        info!(target = "tripwright", event = "migration_stmt_skip", file = %filename, sql = %preview(s));
                        continue;
                    }
                }
            }
            info!(target = "tripwright", event = "migration_stmt", file = %filename, sql = %preview(s));
            if let Err(e) = sqlx::query(s).execute(&mut *tx).await {
                error!(target = "tripwright", event = "migration_stmt_error", file = %filename, sql = %preview(s), error = %e);
                return Err(e.into());
            }
        }

        sqlx::query(
            "INSERT INTO schema_migrations (version, applied_at, checksum) VALUES (?, ?, ?)",
        )
        .bind(*filename)
        .bind(now_ms())
        .bind(&checksum)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        info!(target = "tripwright", event = "migration_file_applied", file = %filename);
    }

    Ok(())
}
