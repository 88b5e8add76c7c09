use std::collections::HashMap;

use chrono::NaiveDate;
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::warn;
use ts_rs::TS;

use crate::{
    activities, expenses,
    model::{Activity, Expense, Task, Trip},
    ordering, tasks, trips, AppResult,
};

/// One display bucket: a resolved calendar date, or `None` for the trailing
/// unscheduled group.
#[derive(Debug, Clone, Serialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct DayBucket {
    #[ts(optional, type = "string")]
    pub date: Option<NaiveDate>,
    pub activities: Vec<Activity>,
}

#[derive(Debug, Clone, Serialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct TripPreview {
    pub trip: Trip,
    pub days: Vec<DayBucket>,
    pub expenses: Vec<Expense>,
    #[ts(type = "number")]
    pub expense_total: f64,
    pub tasks: Vec<Task>,
}

fn section_or_empty<T>(section: &'static str, trip_id: &str, result: AppResult<Vec<T>>) -> Vec<T> {
    match result {
        Ok(rows) => rows,
        Err(err) => {
            // A trip missing one sub-resource should still render; the
            // failed section simply comes back empty.
            warn!(
                target = "tripwright",
                event = "preview_section_failed",
                section = %section,
                trip_id = %trip_id,
                error = %err
            );
            Vec::new()
        }
    }
}

/// Compose a trip's preview: header, day buckets, expenses with their total,
/// and tasks. Read-only. A missing trip aborts before any sub-fetch.
pub async fn trip_preview(pool: &SqlitePool, trip_id: &str) -> AppResult<TripPreview> {
    let trip = trips::require_trip(pool, trip_id).await?;

    let activity_rows = section_or_empty(
        "activities",
        trip_id,
        activities::list_activities(pool, trip_id).await,
    );
    let day_rows = section_or_empty("trip_days", trip_id, ordering::list_days(pool, trip_id).await);
    let expense_rows = section_or_empty(
        "expenses",
        trip_id,
        expenses::list_expenses(pool, trip_id).await,
    );
    let task_rows = section_or_empty("tasks", trip_id, tasks::list_tasks(pool, trip_id).await);

    let day_dates: HashMap<String, NaiveDate> = day_rows
        .into_iter()
        .map(|day| (day.id, day.date))
        .collect();

    let days = bucket_activities(activity_rows, &day_dates);
    let expense_total = expense_total(&expense_rows);

    Ok(TripPreview {
        trip,
        days,
        expenses: expense_rows,
        expense_total,
        tasks: task_rows,
    })
}

/// Order activities by (resolved date, start_time, title) and group them one
/// bucket per date, ascending, with everything unresolved in a single
/// unscheduled bucket at the end. An activity whose day_id points at a
/// vanished day counts as unscheduled.
pub(crate) fn bucket_activities(
    mut rows: Vec<Activity>,
    day_dates: &HashMap<String, NaiveDate>,
) -> Vec<DayBucket> {
    let resolve = |activity: &Activity| -> Option<NaiveDate> {
        activity
            .day_id
            .as_deref()
            .and_then(|day_id| day_dates.get(day_id).copied())
    };

    rows.sort_by(|a, b| {
        let da = resolve(a);
        let db = resolve(b);
        da.is_none()
            .cmp(&db.is_none())
            .then(da.cmp(&db))
            .then(a.start_time.cmp(&b.start_time))
            .then(a.title.cmp(&b.title))
    });

    let mut buckets: Vec<DayBucket> = Vec::new();
    for activity in rows {
        let date = resolve(&activity);
        match buckets.last_mut() {
            Some(bucket) if bucket.date == date => bucket.activities.push(activity),
            _ => buckets.push(DayBucket {
                date,
                activities: vec![activity],
            }),
        }
    }
    buckets
}

/// Order-insensitive sum, clamped to a non-negative display number.
pub(crate) fn expense_total(rows: &[Expense]) -> f64 {
    let total: f64 = rows.iter().map(|e| e.amount).sum();
    if total.is_finite() {
        total.max(0.0)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ExpenseCategory;
    use proptest::prelude::*;

    fn activity(id: &str, day_id: Option<&str>, start: Option<&str>, title: &str) -> Activity {
        Activity {
            id: id.into(),
            trip_id: "t1".into(),
            day_id: day_id.map(Into::into),
            title: title.into(),
            start_time: start.map(Into::into),
            end_time: None,
            location: None,
            note: None,
            order_no: 0,
            created_at: 0,
            updated_at: 0,
        }
    }

    fn expense(amount: f64) -> Expense {
        Expense {
            id: "e".into(),
            trip_id: "t1".into(),
            date: NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
            title: "x".into(),
            category: ExpenseCategory::Other,
            amount,
            paid_by: None,
            paid_by_name: None,
            split_with: Vec::new(),
            created_at: 0,
            updated_at: 0,
        }
    }

    #[test]
    fn buckets_sort_dates_ascending_with_unscheduled_last() {
        let mut day_dates = HashMap::new();
        day_dates.insert("d2".to_string(), NaiveDate::from_ymd_opt(2025, 3, 2).unwrap());
        day_dates.insert("d1".to_string(), NaiveDate::from_ymd_opt(2025, 3, 1).unwrap());

        let rows = vec![
            activity("a", Some("d2"), Some("09:00"), "Museum"),
            activity("b", None, None, "Souvenirs"),
            activity("c", Some("d1"), Some("10:00"), "Temple"),
        ];
        let buckets = bucket_activities(rows, &day_dates);

        assert_eq!(buckets.len(), 3);
        assert_eq!(buckets[0].date, NaiveDate::from_ymd_opt(2025, 3, 1));
        assert_eq!(buckets[1].date, NaiveDate::from_ymd_opt(2025, 3, 2));
        assert_eq!(buckets[2].date, None);
        assert_eq!(buckets[2].activities[0].title, "Souvenirs");
    }

    #[test]
    fn buckets_sort_within_day_by_start_time_then_title() {
        let mut day_dates = HashMap::new();
        day_dates.insert("d1".to_string(), NaiveDate::from_ymd_opt(2025, 3, 1).unwrap());

        let rows = vec![
            activity("a", Some("d1"), Some("14:00"), "Zoo"),
            activity("b", Some("d1"), Some("09:30"), "Breakfast"),
            activity("c", Some("d1"), Some("14:00"), "Aquarium"),
        ];
        let buckets = bucket_activities(rows, &day_dates);

        assert_eq!(buckets.len(), 1);
        let titles: Vec<_> = buckets[0]
            .activities
            .iter()
            .map(|a| a.title.as_str())
            .collect();
        assert_eq!(titles, ["Breakfast", "Aquarium", "Zoo"]);
    }

    #[test]
    fn unmapped_day_id_counts_as_unscheduled() {
        let day_dates = HashMap::new();
        let rows = vec![activity("a", Some("ghost-day"), None, "Orphaned")];
        let buckets = bucket_activities(rows, &day_dates);
        assert_eq!(buckets.len(), 1);
        assert_eq!(buckets[0].date, None);
    }

    #[test]
    fn total_sums_and_clamps() {
        let rows = vec![expense(800.0), expense(1200.0), expense(0.0)];
        assert_eq!(expense_total(&rows), 2000.0);
        assert_eq!(expense_total(&[]), 0.0);
    }

    proptest! {
        #[test]
        fn total_is_order_insensitive(mut amounts in proptest::collection::vec(0.0f64..10_000.0, 0..12)) {
            let forward: Vec<Expense> = amounts.iter().copied().map(expense).collect();
            let a = expense_total(&forward);
            amounts.reverse();
            let reversed: Vec<Expense> = amounts.iter().copied().map(expense).collect();
            let b = expense_total(&reversed);
            prop_assert!((a - b).abs() < 1e-6);
        }
    }
}
