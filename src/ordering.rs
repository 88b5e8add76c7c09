use chrono::NaiveDate;
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::warn;
use ts_rs::TS;

use crate::{
    id::new_uuid_v7,
    model::{ReorderPair, TripDay, TRIP_REQUIRED},
    repo,
    time::now_ms,
    AppError, AppResult,
};

#[derive(Debug, Clone, PartialEq, Serialize, TS)]
#[serde(tag = "status", rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum ReorderOutcome {
    /// The row was rewritten with the submitted order_no.
    Applied,
    /// No activity with this id lives in the scoped trip; nothing changed.
    Missing,
    Failed { message: String },
}

#[derive(Debug, Clone, Serialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct ReorderItem {
    pub activity_id: String,
    #[ts(type = "number")]
    pub order_no: i64,
    pub outcome: ReorderOutcome,
}

/// Per-item batch outcome. Applied items stay applied when later items fail;
/// callers re-issue the same batch to converge (each write is a full
/// overwrite, not a delta).
#[derive(Debug, Clone, Serialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct ReorderReport {
    pub items: Vec<ReorderItem>,
    #[ts(type = "number")]
    pub applied: u64,
    #[ts(type = "number")]
    pub missing: u64,
    #[ts(type = "number")]
    pub failed: u64,
}

impl ReorderReport {
    pub fn fully_applied(&self) -> bool {
        self.failed == 0 && self.missing == 0
    }
}

pub async fn reorder_activities(
    pool: &SqlitePool,
    trip_id: &str,
    pairs: &[ReorderPair],
) -> AppResult<ReorderReport> {
    let trip = repo::require_trip(trip_id)
        .map_err(|_| AppError::new(TRIP_REQUIRED, "trip_id is required to reorder activities"))?;

    let mut items = Vec::with_capacity(pairs.len());
    let (mut applied, mut missing, mut failed) = (0u64, 0u64, 0u64);
    for pair in pairs {
        let res = sqlx::query(
            "UPDATE activities SET order_no = ?, updated_at = ? WHERE trip_id = ? AND id = ?",
        )
        .bind(pair.order_no)
        .bind(now_ms())
        .bind(trip)
        .bind(&pair.activity_id)
        .execute(pool)
        .await;

        let outcome = match res {
            Ok(done) if done.rows_affected() == 0 => {
                missing += 1;
                ReorderOutcome::Missing
            }
            Ok(_) => {
                applied += 1;
                ReorderOutcome::Applied
            }
            Err(err) => {
                failed += 1;
                let app = AppError::from(err);
                warn!(
                    target = "tripwright",
                    event = "reorder_item_failed",
                    trip_id = %trip,
                    activity_id = %pair.activity_id,
                    error = %app
                );
                ReorderOutcome::Failed {
                    message: app.message().to_string(),
                }
            }
        };
        items.push(ReorderItem {
            activity_id: pair.activity_id.clone(),
            order_no: pair.order_no,
            outcome,
        });
    }

    Ok(ReorderReport {
        items,
        applied,
        missing,
        failed,
    })
}

/// Find-or-create backed by the UNIQUE(trip_id, date) index: a concurrent
/// creator makes the insert a no-op and the re-read picks up its row.
pub async fn find_or_create_day(
    pool: &SqlitePool,
    trip_id: &str,
    date: NaiveDate,
) -> AppResult<(TripDay, bool)> {
    let trip = repo::require_trip(trip_id)
        .map_err(|_| AppError::new(TRIP_REQUIRED, "trip_id is required for trip days"))?;

    let existing =
        sqlx::query_as::<_, TripDay>("SELECT * FROM trip_days WHERE trip_id = ? AND date = ?")
            .bind(trip)
            .bind(date)
            .fetch_optional(pool)
            .await
            .map_err(AppError::from)?;
    if let Some(day) = existing {
        return Ok((day, false));
    }

    let now = now_ms();
    sqlx::query(
        "INSERT INTO trip_days (id, trip_id, date, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?) ON CONFLICT(trip_id, date) DO NOTHING",
    )
    .bind(new_uuid_v7())
    .bind(trip)
    .bind(date)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .map_err(|err| {
        AppError::from(err)
            .with_context("operation", "find_or_create_day")
            .with_context("trip_id", trip.to_string())
            .with_context("date", date.to_string())
    })?;

    let day = sqlx::query_as::<_, TripDay>("SELECT * FROM trip_days WHERE trip_id = ? AND date = ?")
        .bind(trip)
        .bind(date)
        .fetch_one(pool)
        .await
        .map_err(|err| {
            AppError::from(err)
                .with_context("operation", "find_or_create_day")
                .with_context("trip_id", trip.to_string())
                .with_context("date", date.to_string())
        })?;
    Ok((day, true))
}

#[derive(Debug, Clone, Serialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct AssignDayReport {
    pub day_id: String,
    pub created_day: bool,
    #[ts(type = "number")]
    pub updated: u64,
}

/// Bulk-assign every unscheduled activity in the trip to the day for `date`.
/// Activities that already have a day are excluded by the null filter, so
/// retries only touch work that is still unscheduled.
pub async fn assign_unscheduled_to_day(
    pool: &SqlitePool,
    trip_id: &str,
    date: NaiveDate,
) -> AppResult<AssignDayReport> {
    let (day, created_day) = find_or_create_day(pool, trip_id, date).await?;

    let res = sqlx::query(
        "UPDATE activities SET day_id = ?, updated_at = ? WHERE trip_id = ? AND day_id IS NULL",
    )
    .bind(&day.id)
    .bind(now_ms())
    .bind(&day.trip_id)
    .execute(pool)
    .await
    .map_err(|err| {
        AppError::from(err)
            .with_context("operation", "assign_unscheduled_to_day")
            .with_context("trip_id", day.trip_id.clone())
            .with_context("day_id", day.id.clone())
    })?;

    Ok(AssignDayReport {
        day_id: day.id,
        created_day,
        updated: res.rows_affected(),
    })
}

pub async fn list_days(pool: &SqlitePool, trip_id: &str) -> AppResult<Vec<TripDay>> {
    sqlx::query_as::<_, TripDay>("SELECT * FROM trip_days WHERE trip_id = ? ORDER BY date")
        .bind(trip_id)
        .fetch_all(pool)
        .await
        .map_err(|err| {
            AppError::from(err)
                .with_context("operation", "list_days")
                .with_context("trip_id", trip_id.to_string())
        })
}
