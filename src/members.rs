use std::collections::HashSet;

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use tracing::info;

use crate::{
    model::{MemberRole, TripMember, MEMBER_EMAIL_UNRESOLVED, MEMBER_NOT_FOUND, TRIP_REQUIRED},
    repo,
    time::now_ms,
    AppError, AppResult,
};

/// Page size used when enumerating the directory.
pub const SYNC_PAGE_SIZE: i64 = 200;
/// Upper bound on pages scanned per batch resolution. The sync is
/// best-effort: addresses past the bound simply stay unresolved.
pub const MAX_SYNC_PAGES: usize = 20;

fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

#[derive(Debug, Clone)]
pub struct DirectoryEntry {
    pub user_id: String,
    pub email: String,
}

/// Out-of-band identity resolution against the hosted auth service's user
/// records. Batch resolution walks the directory page by page rather than
/// issuing one lookup per address.
#[async_trait]
pub trait IdentityDirectory: Send + Sync {
    async fn resolve_email(&self, email: &str) -> AppResult<Option<String>>;

    /// Zero-based paged enumeration; an underfull page is the last one.
    async fn scan_page(&self, page: usize, page_size: i64) -> AppResult<Vec<DirectoryEntry>>;

    /// Resolve the subset of `emails` found within the page bound, each
    /// paired with its account id.
    async fn resolve_emails(&self, emails: &[String]) -> AppResult<Vec<(String, String)>> {
        let mut wanted: HashSet<String> = emails.iter().map(|e| normalize_email(e)).collect();
        wanted.remove("");
        let mut found = Vec::new();
        for page in 0..MAX_SYNC_PAGES {
            if wanted.is_empty() {
                break;
            }
            let entries = self.scan_page(page, SYNC_PAGE_SIZE).await?;
            let last_page = (entries.len() as i64) < SYNC_PAGE_SIZE;
            for entry in entries {
                let email = normalize_email(&entry.email);
                if wanted.remove(&email) {
                    found.push((email, entry.user_id));
                }
            }
            if last_page {
                break;
            }
        }
        Ok(found)
    }
}

pub struct UsersDirectory {
    pool: SqlitePool,
}

impl UsersDirectory {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl IdentityDirectory for UsersDirectory {
    async fn resolve_email(&self, email: &str) -> AppResult<Option<String>> {
        let normalized = normalize_email(email);
        if normalized.is_empty() {
            return Ok(None);
        }
        sqlx::query_scalar::<_, String>("SELECT id FROM users WHERE email = ?")
            .bind(&normalized)
            .fetch_optional(&self.pool)
            .await
            .map_err(|err| {
                AppError::from(err)
                    .with_context("operation", "resolve_email")
                    .with_context("email", normalized)
            })
    }

    async fn scan_page(&self, page: usize, page_size: i64) -> AppResult<Vec<DirectoryEntry>> {
        let offset = (page as i64) * page_size;
        let rows = sqlx::query("SELECT id, email FROM users ORDER BY created_at, id LIMIT ? OFFSET ?")
            .bind(page_size)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
            .map_err(|err| {
                AppError::from(err)
                    .with_context("operation", "scan_page")
                    .with_context("page", page.to_string())
            })?;
        rows.into_iter()
            .map(|row| {
                Ok(DirectoryEntry {
                    user_id: row.try_get("id").map_err(AppError::from)?,
                    email: row.try_get("email").map_err(AppError::from)?,
                })
            })
            .collect()
    }
}

async fn fetch_member(pool: &SqlitePool, trip_id: &str, user_id: &str) -> AppResult<TripMember> {
    let row = sqlx::query("SELECT * FROM trip_members WHERE trip_id = ? AND user_id = ?")
        .bind(trip_id)
        .bind(user_id)
        .fetch_one(pool)
        .await
        .map_err(|err| {
            AppError::from(err)
                .with_context("operation", "fetch_member")
                .with_context("trip_id", trip_id.to_string())
                .with_context("user_id", user_id.to_string())
        })?;
    TripMember::try_from(&row)
}

async fn upsert_member(
    pool: &SqlitePool,
    trip_id: &str,
    user_id: &str,
    role: MemberRole,
) -> AppResult<TripMember> {
    let now = now_ms();
    sqlx::query(
        "INSERT INTO trip_members (trip_id, user_id, role, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?) \
         ON CONFLICT(trip_id, user_id) DO UPDATE SET role = excluded.role, updated_at = excluded.updated_at",
    )
    .bind(trip_id)
    .bind(user_id)
    .bind(role.as_str())
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .map_err(|err| {
        AppError::from(err)
            .with_context("operation", "upsert_member")
            .with_context("trip_id", trip_id.to_string())
            .with_context("user_id", user_id.to_string())
    })?;
    fetch_member(pool, trip_id, user_id).await
}

/// Interactive single add: resolution must succeed or the whole add is
/// rejected.
pub async fn add_member_by_email(
    pool: &SqlitePool,
    directory: &dyn IdentityDirectory,
    trip_id: &str,
    email: &str,
    role: MemberRole,
) -> AppResult<TripMember> {
    let trip = repo::require_trip(trip_id)
        .map_err(|_| AppError::new(TRIP_REQUIRED, "trip_id is required for members"))?;
    let user_id = directory.resolve_email(email).await?.ok_or_else(|| {
        AppError::new(MEMBER_EMAIL_UNRESOLVED, "No account matches that email")
            .with_context("email", email.trim().to_string())
    })?;
    upsert_member(pool, trip, &user_id, role).await
}

/// Trip-creation batch add: unresolved addresses are dropped from the batch
/// without per-address reporting. Only the inserted rows come back.
pub async fn add_members_bulk(
    pool: &SqlitePool,
    directory: &dyn IdentityDirectory,
    trip_id: &str,
    emails: &[String],
    role: MemberRole,
) -> AppResult<Vec<TripMember>> {
    let trip = repo::require_trip(trip_id)
        .map_err(|_| AppError::new(TRIP_REQUIRED, "trip_id is required for members"))?;
    let resolved = directory.resolve_emails(emails).await?;
    let dropped = emails.len().saturating_sub(resolved.len());
    if dropped > 0 {
        info!(
            target = "tripwright",
            event = "member_bulk_dropped",
            trip_id = %trip,
            dropped = dropped
        );
    }

    let mut members = Vec::with_capacity(resolved.len());
    for (_email, user_id) in resolved {
        members.push(upsert_member(pool, trip, &user_id, role).await?);
    }
    Ok(members)
}

pub async fn set_member_role(
    pool: &SqlitePool,
    trip_id: &str,
    user_id: &str,
    role: MemberRole,
) -> AppResult<()> {
    let res = sqlx::query(
        "UPDATE trip_members SET role = ?, updated_at = ? WHERE trip_id = ? AND user_id = ?",
    )
    .bind(role.as_str())
    .bind(now_ms())
    .bind(trip_id)
    .bind(user_id)
    .execute(pool)
    .await
    .map_err(AppError::from)?;
    if res.rows_affected() == 0 {
        return Err(
            AppError::new(MEMBER_NOT_FOUND, "No such member on this trip")
                .with_context("trip_id", trip_id.to_string())
                .with_context("user_id", user_id.to_string()),
        );
    }
    Ok(())
}

pub async fn remove_member(pool: &SqlitePool, trip_id: &str, user_id: &str) -> AppResult<()> {
    let res = sqlx::query("DELETE FROM trip_members WHERE trip_id = ? AND user_id = ?")
        .bind(trip_id)
        .bind(user_id)
        .execute(pool)
        .await
        .map_err(AppError::from)?;
    if res.rows_affected() == 0 {
        return Err(
            AppError::new(MEMBER_NOT_FOUND, "No such member on this trip")
                .with_context("trip_id", trip_id.to_string())
                .with_context("user_id", user_id.to_string()),
        );
    }
    Ok(())
}

pub async fn list_members(pool: &SqlitePool, trip_id: &str) -> AppResult<Vec<TripMember>> {
    let rows =
        sqlx::query("SELECT * FROM trip_members WHERE trip_id = ? ORDER BY created_at, user_id")
            .bind(trip_id)
            .fetch_all(pool)
            .await
            .map_err(|err| {
                AppError::from(err)
                    .with_context("operation", "list_members")
                    .with_context("trip_id", trip_id.to_string())
            })?;
    rows.iter().map(TripMember::try_from).collect()
}
