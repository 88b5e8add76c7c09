use sqlx::SqlitePool;
use thiserror::Error;

use crate::{
    aggregate::{self, TripPreview},
    id::new_uuid_v7,
    model::{ShareLink, SHARE_NOT_FOUND, TRIP_REQUIRED},
    repo,
    time::now_ms,
    AppError, AppResult,
};

/// Issue a new enabled link. Older links stay untouched; the read convention
/// is newest-enabled-wins, not a single-active-link invariant.
pub async fn create_share_link(
    pool: &SqlitePool,
    trip_id: &str,
    expires_at: Option<i64>,
) -> AppResult<ShareLink> {
    let trip = repo::require_trip(trip_id)
        .map_err(|_| AppError::new(TRIP_REQUIRED, "trip_id is required for share links"))?;
    let id = new_uuid_v7();
    let now = now_ms();
    sqlx::query(
        "INSERT INTO share_links (id, trip_id, is_enabled, expires_at, created_at, updated_at) \
         VALUES (?, ?, 1, ?, ?, ?)",
    )
    .bind(&id)
    .bind(trip)
    .bind(expires_at)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .map_err(|err| {
        AppError::from(err)
            .with_context("operation", "create_share_link")
            .with_context("trip_id", trip.to_string())
    })?;

    sqlx::query_as::<_, ShareLink>("SELECT * FROM share_links WHERE id = ?")
        .bind(&id)
        .fetch_one(pool)
        .await
        .map_err(|err| {
            AppError::from(err)
                .with_context("operation", "create_share_link")
                .with_context("id", id.clone())
        })
}

pub async fn disable_share_link(pool: &SqlitePool, trip_id: &str, id: &str) -> AppResult<()> {
    let trip = repo::require_trip(trip_id)
        .map_err(|_| AppError::new(TRIP_REQUIRED, "trip_id is required for share links"))?;
    let res = sqlx::query(
        "UPDATE share_links SET is_enabled = 0, updated_at = ? WHERE trip_id = ? AND id = ?",
    )
    .bind(now_ms())
    .bind(trip)
    .bind(id)
    .execute(pool)
    .await
    .map_err(AppError::from)?;
    if res.rows_affected() == 0 {
        return Err(AppError::new(SHARE_NOT_FOUND, "No such share link")
            .with_context("trip_id", trip.to_string())
            .with_context("id", id.to_string()));
    }
    Ok(())
}

/// The link honoured for a trip: the most recently created enabled row.
pub async fn active_share_link(pool: &SqlitePool, trip_id: &str) -> AppResult<Option<ShareLink>> {
    sqlx::query_as::<_, ShareLink>(
        "SELECT * FROM share_links WHERE trip_id = ? AND is_enabled = 1 \
         ORDER BY created_at DESC, id DESC LIMIT 1",
    )
    .bind(trip_id)
    .fetch_optional(pool)
    .await
    .map_err(|err| {
        AppError::from(err)
            .with_context("operation", "active_share_link")
            .with_context("trip_id", trip_id.to_string())
    })
}

#[derive(Debug, Error)]
pub enum ShareResolveError {
    #[error("share link not found")]
    NotFound,
    #[error("share link is disabled")]
    Disabled,
    #[error("share link has expired")]
    Expired,
    #[error(transparent)]
    App(#[from] AppError),
}

/// Unauthenticated read surface: resolve a share identifier to the trip
/// preview. Enabled/expiry gating happens here, at the serving boundary.
pub async fn resolve_share(
    pool: &SqlitePool,
    share_id: &str,
    now: i64,
) -> Result<TripPreview, ShareResolveError> {
    let link = sqlx::query_as::<_, ShareLink>("SELECT * FROM share_links WHERE id = ?")
        .bind(share_id)
        .fetch_optional(pool)
        .await
        .map_err(AppError::from)?
        .ok_or(ShareResolveError::NotFound)?;

    if !link.is_enabled {
        return Err(ShareResolveError::Disabled);
    }
    if !link.is_active(now) {
        return Err(ShareResolveError::Expired);
    }

    Ok(aggregate::trip_preview(pool, &link.trip_id).await?)
}
