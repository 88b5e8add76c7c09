use chrono::NaiveDate;
use serde_json::{Map, Value};
use sqlx::SqlitePool;

use crate::{
    commands,
    model::{
        Trip, TripCreateInput, TripUpdateInput, DEFAULT_CURRENCY, TRIP_NOT_FOUND,
        VALIDATION_DATE_RANGE, VALIDATION_EMPTY_PATCH, VALIDATION_OWNER_REQUIRED,
    },
    AppError, AppResult,
};

fn validate_date_range(start: Option<NaiveDate>, end: Option<NaiveDate>) -> AppResult<()> {
    if let (Some(start), Some(end)) = (start, end) {
        if start > end {
            return Err(
                AppError::new(VALIDATION_DATE_RANGE, "start_date is after end_date")
                    .with_context("start_date", start.to_string())
                    .with_context("end_date", end.to_string()),
            );
        }
    }
    Ok(())
}

pub(crate) fn normalize_currency(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_uppercase)
}

fn opt_string(value: Option<String>) -> Value {
    value.map(Value::String).unwrap_or(Value::Null)
}

fn opt_date(value: Option<NaiveDate>) -> Value {
    value
        .map(|d| Value::String(d.to_string()))
        .unwrap_or(Value::Null)
}

fn decode_trip(created: Value) -> AppResult<Trip> {
    serde_json::from_value(created).map_err(|err| {
        AppError::from(err).with_context("operation", "decode_trip")
    })
}

pub async fn create_trip(pool: &SqlitePool, input: TripCreateInput) -> AppResult<Trip> {
    let owner = input.owner_id.trim();
    if owner.is_empty() {
        return Err(AppError::new(
            VALIDATION_OWNER_REQUIRED,
            "A trip needs an owner",
        ));
    }
    validate_date_range(input.start_date, input.end_date)?;
    let currency =
        normalize_currency(input.currency_code.as_deref()).unwrap_or_else(|| DEFAULT_CURRENCY.into());

    let mut data = Map::new();
    data.insert("title".into(), opt_string(input.title));
    data.insert("start_date".into(), opt_date(input.start_date));
    data.insert("end_date".into(), opt_date(input.end_date));
    data.insert("owner_id".into(), Value::String(owner.to_string()));
    data.insert("currency_code".into(), Value::String(currency));
    data.insert("description".into(), opt_string(input.description));

    let created = commands::create_command(pool, "trips", data).await?;
    decode_trip(created)
}

pub async fn get_trip(pool: &SqlitePool, trip_id: &str) -> AppResult<Option<Trip>> {
    sqlx::query_as::<_, Trip>("SELECT * FROM trips WHERE id = ?")
        .bind(trip_id)
        .fetch_optional(pool)
        .await
        .map_err(|err| {
            AppError::from(err)
                .with_context("operation", "get_trip")
                .with_context("trip_id", trip_id.to_string())
        })
}

/// Single-row read that must match; the aggregator and share resolver start
/// here so a missing trip aborts before any sub-resource fetch.
pub async fn require_trip(pool: &SqlitePool, trip_id: &str) -> AppResult<Trip> {
    get_trip(pool, trip_id).await?.ok_or_else(|| {
        AppError::new(TRIP_NOT_FOUND, "Trip not found").with_context("trip_id", trip_id.to_string())
    })
}

pub async fn update_trip(
    pool: &SqlitePool,
    trip_id: &str,
    input: TripUpdateInput,
) -> AppResult<Trip> {
    let current = require_trip(pool, trip_id).await?;

    // Absent fields stay untouched; the range check runs against the merged
    // record so a lone start_date cannot jump past the stored end_date.
    let merged_start = input.start_date.or(current.start_date);
    let merged_end = input.end_date.or(current.end_date);
    validate_date_range(merged_start, merged_end)?;

    let mut data = Map::new();
    if let Some(title) = input.title {
        data.insert("title".into(), Value::String(title));
    }
    if let Some(start) = input.start_date {
        data.insert("start_date".into(), Value::String(start.to_string()));
    }
    if let Some(end) = input.end_date {
        data.insert("end_date".into(), Value::String(end.to_string()));
    }
    if let Some(currency) = normalize_currency(input.currency_code.as_deref()) {
        data.insert("currency_code".into(), Value::String(currency));
    }
    if data.is_empty() {
        return Err(AppError::new(
            VALIDATION_EMPTY_PATCH,
            "Nothing to update on this trip",
        ));
    }

    commands::update_command(pool, "trips", trip_id, data, None).await?;
    require_trip(pool, trip_id).await
}

pub async fn list_trips_for_owner(pool: &SqlitePool, owner_id: &str) -> AppResult<Vec<Trip>> {
    sqlx::query_as::<_, Trip>(
        "SELECT * FROM trips WHERE owner_id = ? ORDER BY created_at DESC, id DESC",
    )
    .bind(owner_id)
    .fetch_all(pool)
    .await
    .map_err(|err| {
        AppError::from(err)
            .with_context("operation", "list_trips_for_owner")
            .with_context("owner_id", owner_id.to_string())
    })
}

/// Child rows go with the trip via the store's FK cascades; nothing here
/// walks the child tables.
pub async fn delete_trip(pool: &SqlitePool, trip_id: &str) -> AppResult<()> {
    commands::delete_command(pool, "trips", trip_id, trip_id).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn date_range_rejects_inverted_pairs() {
        let start = NaiveDate::from_ymd_opt(2026, 4, 2).unwrap();
        let end = NaiveDate::from_ymd_opt(2026, 4, 1).unwrap();
        let err = validate_date_range(Some(start), Some(end)).unwrap_err();
        assert_eq!(err.code(), VALIDATION_DATE_RANGE);
    }

    #[test]
    fn date_range_allows_open_ends() {
        let day = NaiveDate::from_ymd_opt(2026, 4, 1).unwrap();
        assert!(validate_date_range(Some(day), None).is_ok());
        assert!(validate_date_range(None, Some(day)).is_ok());
        assert!(validate_date_range(Some(day), Some(day)).is_ok());
    }

    #[test]
    fn currency_is_trimmed_and_uppercased() {
        assert_eq!(normalize_currency(Some(" usd ")), Some("USD".into()));
        assert_eq!(normalize_currency(Some("")), None);
        assert_eq!(normalize_currency(None), None);
    }
}
