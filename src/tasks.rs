use serde_json::{Map, Value};
use sqlx::SqlitePool;

use crate::{
    commands,
    model::{Task, TaskInput, TRIP_REQUIRED, VALIDATION_TITLE_REQUIRED},
    repo, AppError, AppResult,
};

pub async fn create_task(pool: &SqlitePool, trip_id: &str, input: TaskInput) -> AppResult<Task> {
    let trip = repo::require_trip(trip_id)
        .map_err(|_| AppError::new(TRIP_REQUIRED, "trip_id is required for tasks"))?;
    let title = input.title.trim();
    if title.is_empty() {
        return Err(AppError::new(
            VALIDATION_TITLE_REQUIRED,
            "A task needs a title",
        ));
    }

    let mut data = Map::new();
    data.insert("trip_id".into(), Value::String(trip.to_string()));
    data.insert("title".into(), Value::String(title.to_string()));
    data.insert("kind".into(), Value::String(input.kind.as_str().to_string()));
    data.insert("done".into(), Value::Bool(input.done));
    data.insert(
        "sort_order".into(),
        input.sort_order.map(Value::from).unwrap_or(Value::Null),
    );

    let created = commands::create_command(pool, "tasks", data).await?;
    let obj = created.as_object().ok_or_else(|| {
        AppError::new("MODEL/DECODE", "Expected object payload for created task")
    })?;
    let get_i64 = |key: &str| obj.get(key).and_then(Value::as_i64).unwrap_or_default();
    Ok(Task {
        id: obj
            .get("id")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        trip_id: trip.to_string(),
        title: title.to_string(),
        kind: input.kind,
        done: input.done,
        sort_order: input.sort_order,
        created_at: get_i64("created_at"),
        updated_at: get_i64("updated_at"),
    })
}

pub async fn list_tasks(pool: &SqlitePool, trip_id: &str) -> AppResult<Vec<Task>> {
    let rows = sqlx::query(
        "SELECT * FROM tasks WHERE trip_id = ? \
         ORDER BY kind, sort_order IS NULL, sort_order, created_at, id",
    )
    .bind(trip_id)
    .fetch_all(pool)
    .await
    .map_err(|err| {
        AppError::from(err)
            .with_context("operation", "list_tasks")
            .with_context("trip_id", trip_id.to_string())
    })?;

    rows.iter().map(Task::try_from).collect()
}
