use serde_json::{Map, Value};
use sqlx::SqlitePool;

use crate::{
    commands,
    model::{Activity, ActivityInput, TRIP_REQUIRED, VALIDATION_TITLE_REQUIRED},
    repo, AppError, AppResult,
};

fn opt_string(value: Option<String>) -> Value {
    value.map(Value::String).unwrap_or(Value::Null)
}

async fn next_order_no(
    pool: &SqlitePool,
    trip_id: &str,
    day_id: Option<&str>,
) -> AppResult<i64> {
    // order_no only ranks activities sharing a day bucket, so the next slot
    // is computed within (trip, day).
    sqlx::query_scalar::<_, i64>(
        "SELECT COALESCE(MAX(order_no) + 1, 0) FROM activities WHERE trip_id = ? AND day_id IS ?",
    )
    .bind(trip_id)
    .bind(day_id)
    .fetch_one(pool)
    .await
    .map_err(|err| {
        AppError::from(err)
            .with_context("operation", "next_order_no")
            .with_context("trip_id", trip_id.to_string())
    })
}

pub async fn create_activity(
    pool: &SqlitePool,
    trip_id: &str,
    input: ActivityInput,
) -> AppResult<Activity> {
    let trip = repo::require_trip(trip_id)
        .map_err(|_| AppError::new(TRIP_REQUIRED, "trip_id is required for activities"))?;
    let title = input.title.trim();
    if title.is_empty() {
        return Err(AppError::new(
            VALIDATION_TITLE_REQUIRED,
            "An activity needs a title",
        ));
    }

    let order_no = match input.order_no {
        Some(n) => n,
        None => next_order_no(pool, trip, input.day_id.as_deref()).await?,
    };

    let mut data = Map::new();
    data.insert("trip_id".into(), Value::String(trip.to_string()));
    data.insert("day_id".into(), opt_string(input.day_id));
    data.insert("title".into(), Value::String(title.to_string()));
    data.insert("start_time".into(), opt_string(input.start_time));
    data.insert("end_time".into(), opt_string(input.end_time));
    data.insert("location".into(), opt_string(input.location));
    data.insert("note".into(), opt_string(input.note));
    data.insert("order_no".into(), Value::from(order_no));

    let created = commands::create_command(pool, "activities", data).await?;
    serde_json::from_value(created)
        .map_err(|err| AppError::from(err).with_context("operation", "decode_activity"))
}

pub async fn list_activities(pool: &SqlitePool, trip_id: &str) -> AppResult<Vec<Activity>> {
    sqlx::query_as::<_, Activity>(
        "SELECT * FROM activities WHERE trip_id = ? ORDER BY order_no, id",
    )
    .bind(trip_id)
    .fetch_all(pool)
    .await
    .map_err(|err| {
        AppError::from(err)
            .with_context("operation", "list_activities")
            .with_context("trip_id", trip_id.to_string())
    })
}
