use anyhow::Result;
use chrono::NaiveDate;
use tripwright::{
    create_activity, create_expense, create_task, find_or_create_day,
    model::{ActivityInput, ExpenseCategory, ExpenseInput, TaskInput, TaskKind},
    trip_preview,
};

#[path = "util.rs"]
mod util;

fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn activity_input(title: &str, day_id: Option<String>, start: Option<&str>) -> ActivityInput {
    ActivityInput {
        title: title.into(),
        day_id,
        start_time: start.map(Into::into),
        end_time: None,
        location: None,
        note: None,
        order_no: None,
    }
}

fn expense_input(title: &str, amount: f64) -> ExpenseInput {
    ExpenseInput {
        date: day(2025, 3, 1),
        title: title.into(),
        category: ExpenseCategory::Other,
        amount,
        paid_by: None,
        split_with: Vec::new(),
    }
}

#[tokio::test]
async fn preview_groups_days_ascending_with_unscheduled_last() -> Result<()> {
    let pool = util::memory_pool().await;
    let trip = util::seed_trip(&pool, "u-owner", "Grouping").await;

    // Days created out of order on purpose.
    let (later, _) = find_or_create_day(&pool, &trip.id, day(2025, 3, 2)).await?;
    let (earlier, _) = find_or_create_day(&pool, &trip.id, day(2025, 3, 1)).await?;

    create_activity(
        &pool,
        &trip.id,
        activity_input("Market", Some(later.id.clone()), Some("10:00")),
    )
    .await?;
    create_activity(
        &pool,
        &trip.id,
        activity_input("Castle", Some(earlier.id.clone()), Some("13:00")),
    )
    .await?;
    create_activity(
        &pool,
        &trip.id,
        activity_input("Somewhere sometime", None, None),
    )
    .await?;

    let preview = trip_preview(&pool, &trip.id).await?;
    let dates: Vec<_> = preview.days.iter().map(|b| b.date).collect();
    assert_eq!(
        dates,
        vec![Some(day(2025, 3, 1)), Some(day(2025, 3, 2)), None]
    );
    assert_eq!(preview.days[2].activities[0].title, "Somewhere sometime");
    Ok(())
}

#[tokio::test]
async fn preview_sorts_within_day_by_start_time_then_title() -> Result<()> {
    let pool = util::memory_pool().await;
    let trip = util::seed_trip(&pool, "u-owner", "Within-day").await;
    let (trip_day, _) = find_or_create_day(&pool, &trip.id, day(2025, 3, 1)).await?;

    for (title, start) in [("Zoo", "14:00"), ("Breakfast", "09:30"), ("Aquarium", "14:00")] {
        create_activity(
            &pool,
            &trip.id,
            activity_input(title, Some(trip_day.id.clone()), Some(start)),
        )
        .await?;
    }

    let preview = trip_preview(&pool, &trip.id).await?;
    assert_eq!(preview.days.len(), 1);
    let titles: Vec<_> = preview.days[0]
        .activities
        .iter()
        .map(|a| a.title.as_str())
        .collect();
    assert_eq!(titles, ["Breakfast", "Aquarium", "Zoo"]);
    Ok(())
}

#[tokio::test]
async fn preview_totals_expenses_regardless_of_order() -> Result<()> {
    let pool = util::memory_pool().await;
    let trip = util::seed_trip(&pool, "u-owner", "Totals").await;

    for (title, amount) in [("Dinner", 800.0), ("Hotel", 1200.0), ("Freebie", 0.0)] {
        create_expense(&pool, &trip.id, expense_input(title, amount)).await?;
    }

    let preview = trip_preview(&pool, &trip.id).await?;
    assert_eq!(preview.expense_total, 2000.0);
    assert_eq!(preview.expenses.len(), 3);
    Ok(())
}

#[tokio::test]
async fn preview_aborts_on_missing_trip() -> Result<()> {
    let pool = util::memory_pool().await;
    let err = trip_preview(&pool, "no-such-trip")
        .await
        .expect_err("missing trip should abort");
    assert_eq!(err.code(), "TRIP/NOT_FOUND");
    Ok(())
}

#[tokio::test]
async fn preview_tolerates_a_failing_section() -> Result<()> {
    let pool = util::memory_pool().await;
    let trip = util::seed_trip(&pool, "u-owner", "Partial").await;
    create_expense(&pool, &trip.id, expense_input("Lunch", 500.0)).await?;

    // Knock one sub-resource out from under the preview; the trip should
    // still render with that section empty.
    sqlx::query("DROP TABLE tasks").execute(&pool).await?;

    let preview = trip_preview(&pool, &trip.id).await?;
    assert!(preview.tasks.is_empty());
    assert_eq!(preview.expense_total, 500.0);
    Ok(())
}

#[tokio::test]
async fn preview_orders_tasks_with_unsorted_last() -> Result<()> {
    let pool = util::memory_pool().await;
    let trip = util::seed_trip(&pool, "u-owner", "Tasks").await;

    for (title, sort_order) in [("Loose", None), ("First", Some(0)), ("Second", Some(5))] {
        create_task(
            &pool,
            &trip.id,
            TaskInput {
                title: title.into(),
                kind: TaskKind::Todo,
                done: false,
                sort_order,
            },
        )
        .await?;
    }

    let preview = trip_preview(&pool, &trip.id).await?;
    let titles: Vec<_> = preview.tasks.iter().map(|t| t.title.as_str()).collect();
    assert_eq!(titles, ["First", "Second", "Loose"]);
    Ok(())
}
