use serde_json::{Map, Value};
use sqlx::SqlitePool;

use crate::{
    commands,
    model::{
        Expense, ExpenseInput, Payer, TRIP_REQUIRED, VALIDATION_AMOUNT_NEGATIVE,
        VALIDATION_AMOUNT_NOT_FINITE, VALIDATION_TITLE_REQUIRED,
    },
    repo, AppError, AppResult,
};

pub async fn create_expense(
    pool: &SqlitePool,
    trip_id: &str,
    input: ExpenseInput,
) -> AppResult<Expense> {
    let trip = repo::require_trip(trip_id)
        .map_err(|_| AppError::new(TRIP_REQUIRED, "trip_id is required for expenses"))?;
    let title = input.title.trim();
    if title.is_empty() {
        return Err(AppError::new(
            VALIDATION_TITLE_REQUIRED,
            "An expense needs a title",
        ));
    }
    if !input.amount.is_finite() {
        return Err(AppError::new(
            VALIDATION_AMOUNT_NOT_FINITE,
            "Expense amount must be a number",
        ));
    }
    if input.amount < 0.0 {
        return Err(AppError::new(
            VALIDATION_AMOUNT_NEGATIVE,
            "Expense amount cannot be negative",
        )
        .with_context("amount", input.amount.to_string()));
    }

    // The payer is routed to exactly one of the two storage slots here and
    // nowhere else.
    let payer = input.paid_by.as_deref().and_then(Payer::from_raw);
    let (paid_by, paid_by_name) = payer
        .map(Payer::into_columns)
        .unwrap_or((None, None));

    let split_json = serde_json::to_string(&input.split_with).map_err(AppError::from)?;

    let mut data = Map::new();
    data.insert("trip_id".into(), Value::String(trip.to_string()));
    data.insert("date".into(), Value::String(input.date.to_string()));
    data.insert("title".into(), Value::String(title.to_string()));
    data.insert(
        "category".into(),
        Value::String(input.category.as_str().to_string()),
    );
    data.insert("amount".into(), Value::from(input.amount));
    data.insert(
        "paid_by".into(),
        paid_by.clone().map(Value::String).unwrap_or(Value::Null),
    );
    data.insert(
        "paid_by_name".into(),
        paid_by_name
            .clone()
            .map(Value::String)
            .unwrap_or(Value::Null),
    );
    data.insert("split_with".into(), Value::String(split_json));

    let created = commands::create_command(pool, "expenses", data).await?;
    let obj = created.as_object().ok_or_else(|| {
        AppError::new("MODEL/DECODE", "Expected object payload for created expense")
    })?;
    let get_i64 = |key: &str| obj.get(key).and_then(Value::as_i64).unwrap_or_default();
    Ok(Expense {
        id: obj
            .get("id")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        trip_id: trip.to_string(),
        date: input.date,
        title: title.to_string(),
        category: input.category,
        amount: input.amount,
        paid_by,
        paid_by_name,
        split_with: input.split_with,
        created_at: get_i64("created_at"),
        updated_at: get_i64("updated_at"),
    })
}

pub async fn list_expenses(pool: &SqlitePool, trip_id: &str) -> AppResult<Vec<Expense>> {
    let rows = sqlx::query(
        "SELECT * FROM expenses WHERE trip_id = ? ORDER BY date, created_at, id",
    )
    .bind(trip_id)
    .fetch_all(pool)
    .await
    .map_err(|err| {
        AppError::from(err)
            .with_context("operation", "list_expenses")
            .with_context("trip_id", trip_id.to_string())
    })?;

    rows.iter().map(Expense::try_from).collect()
}
