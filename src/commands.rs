use serde_json::{Map, Value};
use sqlx::{sqlite::SqliteRow, Column, Row, SqlitePool, TypeInfo, ValueRef};

use crate::{id::new_uuid_v7, repo, time::now_ms, AppError, AppResult};

fn row_to_value(row: SqliteRow) -> Value {
    let mut map = Map::new();
    for col in row.columns() {
        let idx = col.ordinal();
        let v = row.try_get_raw(idx).ok();
        let val = match v {
            Some(raw) => {
                if raw.is_null() {
                    Value::Null
                } else {
                    match raw.type_info().name() {
                        "INTEGER" => row
                            .try_get::<i64, _>(idx)
                            .map(Value::from)
                            .unwrap_or(Value::Null),
                        "REAL" => row
                            .try_get::<f64, _>(idx)
                            .map(Value::from)
                            .unwrap_or(Value::Null),
                        _ => row
                            .try_get::<String, _>(idx)
                            .map(Value::from)
                            .unwrap_or(Value::Null),
                    }
                }
            }
            None => Value::Null,
        };
        map.insert(col.name().to_string(), val);
    }
    Value::Object(map)
}

fn bind_value<'q>(
    q: sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>>,
    v: &Value,
) -> sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>> {
    match v {
        Value::Null => q.bind(Option::<i64>::None),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                q.bind(i)
            } else if let Some(f) = n.as_f64() {
                q.bind(f)
            } else {
                q.bind(Option::<i64>::None)
            }
        }
        Value::Bool(b) => q.bind(*b as i64),
        Value::String(s) => q.bind(s.clone()),
        _ => q.bind(v.to_string()),
    }
}

async fn list(
    pool: &SqlitePool,
    table: &str,
    trip_id: &str,
    order_by: Option<&str>,
    limit: Option<i64>,
    offset: Option<i64>,
) -> AppResult<Vec<Value>> {
    let rows = repo::list(pool, table, trip_id, order_by, limit, offset)
        .await
        .map_err(AppError::from)?;
    Ok(rows.into_iter().map(row_to_value).collect())
}

async fn get(
    pool: &SqlitePool,
    table: &str,
    trip_id: Option<&str>,
    id: &str,
) -> AppResult<Option<Value>> {
    let row = repo::get(pool, table, trip_id, id)
        .await
        .map_err(AppError::from)?;
    Ok(row.map(row_to_value))
}

async fn create(pool: &SqlitePool, table: &str, mut data: Map<String, Value>) -> AppResult<Value> {
    repo::ensure_table(table).map_err(AppError::from)?;
    let id = data
        .get("id")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .unwrap_or_else(new_uuid_v7);
    data.insert("id".into(), Value::String(id.clone()));
    let now = now_ms();
    data.entry(String::from("created_at"))
        .or_insert(Value::from(now));
    data.insert("updated_at".into(), Value::from(now));

    let cols: Vec<String> = data.keys().cloned().collect();
    let placeholders: Vec<String> = cols.iter().map(|_| "?".into()).collect();
    let sql = format!(
        "INSERT INTO {table} ({}) VALUES ({})",
        cols.join(","),
        placeholders.join(",")
    );
    let mut query = sqlx::query(&sql);
    for c in &cols {
        let value = data.get(c).ok_or_else(|| {
            AppError::new("COMMANDS/MISSING_FIELD", "Payload missing value for column")
                .with_context("column", c.clone())
        })?;
        query = bind_value(query, value);
    }
    query.execute(pool).await.map_err(AppError::from)?;
    Ok(Value::Object(data))
}

async fn update(
    pool: &SqlitePool,
    table: &str,
    id: &str,
    mut data: Map<String, Value>,
    trip_id: Option<&str>,
) -> AppResult<()> {
    repo::ensure_table(table).map_err(AppError::from)?;
    data.remove("id");
    data.remove("created_at");
    let now = now_ms();
    data.insert("updated_at".into(), Value::from(now));
    let cols: Vec<String> = data.keys().cloned().collect();
    let set_clause: Vec<String> = cols.iter().map(|c| format!("{c} = ?")).collect();
    let sql = if table == "trips" {
        format!("UPDATE {table} SET {} WHERE id = ?", set_clause.join(","))
    } else {
        format!(
            "UPDATE {table} SET {} WHERE trip_id = ? AND id = ?",
            set_clause.join(",")
        )
    };
    let mut query = sqlx::query(&sql);
    for c in &cols {
        let value = data.get(c).ok_or_else(|| {
            AppError::new("COMMANDS/MISSING_FIELD", "Payload missing value for column")
                .with_context("column", c.clone())
        })?;
        query = bind_value(query, value);
    }
    if table == "trips" {
        query = query.bind(id);
    } else {
        let trip = trip_id.unwrap_or("");
        query = query.bind(trip).bind(id);
    }
    query.execute(pool).await.map_err(AppError::from)?;
    Ok(())
}

/// Insert-or-update keyed on an explicit conflict column. The conflict column
/// and `created_at` are never overwritten on the update arm, so the original
/// row identity and creation time survive repeated writes.
async fn upsert(
    pool: &SqlitePool,
    table: &str,
    conflict_col: &str,
    mut data: Map<String, Value>,
) -> AppResult<Value> {
    repo::ensure_table(table).map_err(AppError::from)?;
    let now = now_ms();
    data.entry(String::from("created_at"))
        .or_insert(Value::from(now));
    data.insert("updated_at".into(), Value::from(now));

    let cols: Vec<String> = data.keys().cloned().collect();
    let placeholders: Vec<String> = cols.iter().map(|_| "?".into()).collect();
    let set_clause: Vec<String> = cols
        .iter()
        .filter(|c| c.as_str() != conflict_col && c.as_str() != "created_at")
        .map(|c| format!("{c} = excluded.{c}"))
        .collect();
    let action = if set_clause.is_empty() {
        "NOTHING".to_string()
    } else {
        format!("UPDATE SET {}", set_clause.join(","))
    };
    let sql = format!(
        "INSERT INTO {table} ({}) VALUES ({}) ON CONFLICT({conflict_col}) DO {action}",
        cols.join(","),
        placeholders.join(",")
    );
    let mut query = sqlx::query(&sql);
    for c in &cols {
        let value = data.get(c).ok_or_else(|| {
            AppError::new("COMMANDS/MISSING_FIELD", "Payload missing value for column")
                .with_context("column", c.clone())
        })?;
        query = bind_value(query, value);
    }
    query.execute(pool).await.map_err(AppError::from)?;
    Ok(Value::Object(data))
}

pub async fn list_command(
    pool: &SqlitePool,
    table: &str,
    trip_id: &str,
    order_by: Option<&str>,
    limit: Option<i64>,
    offset: Option<i64>,
) -> AppResult<Vec<Value>> {
    list(pool, table, trip_id, order_by, limit, offset)
        .await
        .map_err(|err| {
            err.with_context("operation", "list")
                .with_context("table", table.to_string())
                .with_context("trip_id", trip_id.to_string())
        })
}

pub async fn get_command(
    pool: &SqlitePool,
    table: &str,
    trip_id: Option<&str>,
    id: &str,
) -> AppResult<Option<Value>> {
    get(pool, table, trip_id, id).await.map_err(|err| {
        err.with_context("operation", "get")
            .with_context("table", table.to_string())
            .with_context("trip_id", trip_id.unwrap_or("").to_string())
            .with_context("id", id.to_string())
    })
}

pub async fn create_command(
    pool: &SqlitePool,
    table: &str,
    data: Map<String, Value>,
) -> AppResult<Value> {
    create(pool, table, data).await.map_err(|err| {
        err.with_context("operation", "create")
            .with_context("table", table.to_string())
    })
}

pub async fn update_command(
    pool: &SqlitePool,
    table: &str,
    id: &str,
    data: Map<String, Value>,
    trip_id: Option<&str>,
) -> AppResult<()> {
    update(pool, table, id, data, trip_id)
        .await
        .map_err(|err| {
            err.with_context("operation", "update")
                .with_context("table", table.to_string())
                .with_context("trip_id", trip_id.unwrap_or("").to_string())
                .with_context("id", id.to_string())
        })
}

pub async fn upsert_command(
    pool: &SqlitePool,
    table: &str,
    conflict_col: &str,
    data: Map<String, Value>,
) -> AppResult<Value> {
    upsert(pool, table, conflict_col, data).await.map_err(|err| {
        err.with_context("operation", "upsert")
            .with_context("table", table.to_string())
            .with_context("conflict_col", conflict_col.to_string())
    })
}

pub async fn delete_command(
    pool: &SqlitePool,
    table: &str,
    trip_id: &str,
    id: &str,
) -> AppResult<()> {
    repo::delete(pool, table, trip_id, id).await.map_err(|err| {
        AppError::from(err)
            .with_context("operation", "delete")
            .with_context("table", table.to_string())
            .with_context("trip_id", trip_id.to_string())
            .with_context("id", id.to_string())
    })
}
