use once_cell::sync::Lazy;
use regex::Regex;
use sqlx::{sqlite::SqliteRow, SqlitePool};

/// Tables the generic gateway may touch. Everything else is typed SQL owned
/// by a feature module.
pub const DOMAIN_TABLES: &[&str] = &[
    "trips",
    "trip_days",
    "activities",
    "expenses",
    "budgets",
    "tasks",
    "trip_members",
    "share_links",
];

static ORDER_BY_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?i)[a-z_]+(\s+(ASC|DESC))?(\s*,\s*[a-z_]+(\s+(ASC|DESC))?)*$")
        .expect("order-by validation pattern to compile")
});

pub fn ensure_table(table: &str) -> anyhow::Result<()> {
    if DOMAIN_TABLES.contains(&table) {
        Ok(())
    } else {
        Err(anyhow::anyhow!("invalid table"))
    }
}

fn ensure_order_by(order_by: &str) -> anyhow::Result<()> {
    if ORDER_BY_PATTERN.is_match(order_by.trim()) {
        Ok(())
    } else {
        Err(anyhow::anyhow!("invalid order_by"))
    }
}

/// Every scoped call requires a non-empty trip id; row-level authorization
/// lives in the store, this narrowing is the application's half of the deal.
pub fn require_trip(trip_id: &str) -> anyhow::Result<&str> {
    let trimmed = trip_id.trim();
    if trimmed.is_empty() {
        anyhow::bail!("trip_id required");
    }
    Ok(trimmed)
}

fn scope_column(table: &str) -> &'static str {
    // The trips table is scoped by its own primary key.
    if table == "trips" {
        "id"
    } else {
        "trip_id"
    }
}

pub async fn list(
    pool: &SqlitePool,
    table: &str,
    trip_id: &str,
    order_by: Option<&str>,
    limit: Option<i64>,
    offset: Option<i64>,
) -> anyhow::Result<Vec<SqliteRow>> {
    ensure_table(table)?;
    let trip = require_trip(trip_id)?;
    let order = order_by.unwrap_or("created_at, id");
    ensure_order_by(order)?;
    let mut sql = format!(
        "SELECT * FROM {table} WHERE {} = ? ORDER BY {order}",
        scope_column(table)
    );
    if limit.is_some() {
        sql.push_str(" LIMIT ?");
    }
    if offset.is_some() {
        sql.push_str(" OFFSET ?");
    }
    let mut query = sqlx::query(&sql).bind(trip);
    if let Some(l) = limit {
        query = query.bind(l);
    }
    if let Some(o) = offset {
        query = query.bind(o);
    }
    Ok(query.fetch_all(pool).await?)
}

pub async fn get(
    pool: &SqlitePool,
    table: &str,
    trip_id: Option<&str>,
    id: &str,
) -> anyhow::Result<Option<SqliteRow>> {
    ensure_table(table)?;
    let row = match trip_id {
        Some(trip) if table != "trips" => {
            let trip = require_trip(trip)?;
            sqlx::query(&format!(
                "SELECT * FROM {table} WHERE trip_id = ? AND id = ?"
            ))
            .bind(trip)
            .bind(id)
            .fetch_optional(pool)
            .await?
        }
        _ => {
            sqlx::query(&format!("SELECT * FROM {table} WHERE id = ?"))
                .bind(id)
                .fetch_optional(pool)
                .await?
        }
    };
    Ok(row)
}

pub async fn delete(
    pool: &SqlitePool,
    table: &str,
    trip_id: &str,
    id: &str,
) -> anyhow::Result<()> {
    ensure_table(table)?;
    let trip = require_trip(trip_id)?;
    let sql = if table == "trips" {
        format!("DELETE FROM {table} WHERE id = ?")
    } else {
        format!("DELETE FROM {table} WHERE trip_id = ? AND id = ?")
    };
    let mut query = sqlx::query(&sql);
    if table != "trips" {
        query = query.bind(trip);
    }
    let res = query.bind(id).execute(pool).await?;
    if res.rows_affected() == 0 {
        anyhow::bail!("id not found");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unknown_tables() {
        assert!(ensure_table("sqlite_master").is_err());
        assert!(ensure_table("activities").is_ok());
    }

    #[test]
    fn order_by_accepts_columns_and_directions() {
        assert!(ensure_order_by("order_no").is_ok());
        assert!(ensure_order_by("date ASC, start_time").is_ok());
        assert!(ensure_order_by("created_at DESC, id DESC").is_ok());
    }

    #[test]
    fn order_by_rejects_injection() {
        assert!(ensure_order_by("date; DROP TABLE trips").is_err());
        assert!(ensure_order_by("(SELECT 1)").is_err());
    }

    #[test]
    fn trip_id_must_be_present() {
        assert!(require_trip("  ").is_err());
        assert_eq!(require_trip(" t1 ").unwrap(), "t1");
    }
}
