#![allow(clippy::unwrap_used, clippy::expect_used)]
#![allow(dead_code)]

use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use tripwright::{migrate, model::TripCreateInput, time::now_ms, trips, Trip};

pub async fn memory_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("connect sqlite::memory:");
    sqlx::query("PRAGMA foreign_keys=ON;")
        .execute(&pool)
        .await
        .unwrap();
    migrate::apply_migrations(&pool)
        .await
        .expect("apply migrations");
    pool
}

pub async fn seed_trip(pool: &SqlitePool, owner_id: &str, title: &str) -> Trip {
    trips::create_trip(
        pool,
        TripCreateInput {
            title: Some(title.to_string()),
            owner_id: owner_id.to_string(),
            ..Default::default()
        },
    )
    .await
    .expect("create trip")
}

pub async fn seed_user(pool: &SqlitePool, id: &str, email: &str) {
    let now = now_ms();
    sqlx::query(
        "INSERT INTO users (id, email, display_name, created_at, updated_at) VALUES (?, ?, NULL, ?, ?)",
    )
    .bind(id)
    .bind(email)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .expect("seed user");
}
