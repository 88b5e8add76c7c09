use anyhow::Result;
use chrono::NaiveDate;
use serde_json::{Map, Value};
use tripwright::{
    activities_update, create_activity, create_expense, create_share_link, create_task,
    delete_trip, get_trip, list_trips_for_owner, model::{
        ActivityInput, ExpenseCategory, ExpenseInput, TaskInput, TaskKind, TripCreateInput,
        TripUpdateInput,
    },
    require_trip, trips, update_budget, update_trip, BudgetPatch,
};

#[path = "util.rs"]
mod util;

fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[tokio::test]
async fn create_defaults_and_normalizes_currency() -> Result<()> {
    let pool = util::memory_pool().await;

    let plain = util::seed_trip(&pool, "u-owner", "Kyoto").await;
    assert_eq!(plain.currency_code, "JPY");
    assert_eq!(plain.owner_id, "u-owner");

    let custom = trips::create_trip(
        &pool,
        TripCreateInput {
            title: Some("Lisbon".into()),
            owner_id: "u-owner".into(),
            currency_code: Some(" eur ".into()),
            ..Default::default()
        },
    )
    .await?;
    assert_eq!(custom.currency_code, "EUR");
    Ok(())
}

#[tokio::test]
async fn create_rejects_inverted_date_range() -> Result<()> {
    let pool = util::memory_pool().await;
    let err = trips::create_trip(
        &pool,
        TripCreateInput {
            owner_id: "u-owner".into(),
            start_date: Some(day(2026, 4, 2)),
            end_date: Some(day(2026, 4, 1)),
            ..Default::default()
        },
    )
    .await
    .expect_err("inverted range should fail");
    assert_eq!(err.code(), "VALIDATION/DATE_RANGE");
    Ok(())
}

#[tokio::test]
async fn create_requires_owner() -> Result<()> {
    let pool = util::memory_pool().await;
    let err = trips::create_trip(
        &pool,
        TripCreateInput {
            owner_id: "   ".into(),
            ..Default::default()
        },
    )
    .await
    .expect_err("blank owner should fail");
    assert_eq!(err.code(), "VALIDATION/OWNER_REQUIRED");
    Ok(())
}

#[tokio::test]
async fn update_checks_range_against_merged_record() -> Result<()> {
    let pool = util::memory_pool().await;
    let trip = trips::create_trip(
        &pool,
        TripCreateInput {
            owner_id: "u-owner".into(),
            start_date: Some(day(2026, 4, 1)),
            end_date: Some(day(2026, 4, 10)),
            ..Default::default()
        },
    )
    .await?;

    let err = update_trip(
        &pool,
        &trip.id,
        TripUpdateInput {
            start_date: Some(day(2026, 4, 20)),
            ..Default::default()
        },
    )
    .await
    .expect_err("start past stored end should fail");
    assert_eq!(err.code(), "VALIDATION/DATE_RANGE");

    let updated = update_trip(
        &pool,
        &trip.id,
        TripUpdateInput {
            title: Some("Golden Week".into()),
            ..Default::default()
        },
    )
    .await?;
    assert_eq!(updated.title.as_deref(), Some("Golden Week"));
    assert_eq!(updated.end_date, Some(day(2026, 4, 10)));
    Ok(())
}

#[tokio::test]
async fn update_rejects_empty_patch() -> Result<()> {
    let pool = util::memory_pool().await;
    let trip = util::seed_trip(&pool, "u-owner", "Kyoto").await;
    let err = update_trip(&pool, &trip.id, TripUpdateInput::default())
        .await
        .expect_err("empty patch should fail");
    assert_eq!(err.code(), "VALIDATION/EMPTY_PATCH");
    Ok(())
}

#[tokio::test]
async fn missing_trip_is_distinguished_from_errors() -> Result<()> {
    let pool = util::memory_pool().await;
    assert!(get_trip(&pool, "no-such-trip").await?.is_none());
    let err = require_trip(&pool, "no-such-trip")
        .await
        .expect_err("require should fail");
    assert_eq!(err.code(), "TRIP/NOT_FOUND");
    Ok(())
}

#[tokio::test]
async fn list_is_scoped_to_owner_newest_first() -> Result<()> {
    let pool = util::memory_pool().await;
    let first = util::seed_trip(&pool, "u-a", "First").await;
    // Force distinct created_at values; same-millisecond rows tie-break on id.
    std::thread::sleep(std::time::Duration::from_millis(5));
    let second = util::seed_trip(&pool, "u-a", "Second").await;
    util::seed_trip(&pool, "u-b", "Other owner").await;

    let mine = list_trips_for_owner(&pool, "u-a").await?;
    assert_eq!(mine.len(), 2);
    assert_eq!(mine[0].id, second.id);
    assert_eq!(mine[1].id, first.id);
    Ok(())
}

#[tokio::test]
async fn delete_cascades_to_children_via_store() -> Result<()> {
    let pool = util::memory_pool().await;
    let trip = util::seed_trip(&pool, "u-owner", "Doomed").await;

    create_activity(
        &pool,
        &trip.id,
        ActivityInput {
            title: "Walk".into(),
            day_id: None,
            start_time: None,
            end_time: None,
            location: None,
            note: None,
            order_no: None,
        },
    )
    .await?;
    create_expense(
        &pool,
        &trip.id,
        ExpenseInput {
            date: day(2026, 5, 1),
            title: "Lunch".into(),
            category: ExpenseCategory::Meal,
            amount: 800.0,
            paid_by: None,
            split_with: Vec::new(),
        },
    )
    .await?;
    create_task(
        &pool,
        &trip.id,
        TaskInput {
            title: "Pack".into(),
            kind: TaskKind::Packing,
            done: false,
            sort_order: None,
        },
    )
    .await?;
    update_budget(
        &pool,
        &trip.id,
        BudgetPatch {
            amount: Some(100_000.0),
            currency: None,
        },
    )
    .await?;
    create_share_link(&pool, &trip.id, None).await?;

    delete_trip(&pool, &trip.id).await?;

    for table in ["activities", "expenses", "tasks", "budgets", "share_links"] {
        let remaining: i64 =
            sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table} WHERE trip_id = ?"))
                .bind(&trip.id)
                .fetch_one(&pool)
                .await?;
        assert_eq!(remaining, 0, "{table} rows should cascade away");
    }
    Ok(())
}

#[tokio::test]
async fn generic_update_is_scoped_by_trip() -> Result<()> {
    let pool = util::memory_pool().await;
    let trip_a = util::seed_trip(&pool, "u-owner", "A").await;
    let trip_b = util::seed_trip(&pool, "u-owner", "B").await;

    let activity = create_activity(
        &pool,
        &trip_a.id,
        ActivityInput {
            title: "Shrine".into(),
            day_id: None,
            start_time: None,
            end_time: None,
            location: None,
            note: None,
            order_no: None,
        },
    )
    .await?;

    // Supplying the wrong trip id must not touch the row.
    let mut data = Map::new();
    data.insert("title".into(), Value::String("Hijacked".into()));
    activities_update(&pool, activity.id.clone(), data, Some(trip_b.id.clone())).await?;

    let title: String = sqlx::query_scalar("SELECT title FROM activities WHERE id = ?")
        .bind(&activity.id)
        .fetch_one(&pool)
        .await?;
    assert_eq!(title, "Shrine");
    Ok(())
}
