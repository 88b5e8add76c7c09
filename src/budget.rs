use serde::Serialize;
use serde_json::{Map, Value};
use sqlx::{Row, SqlitePool};
use tracing::{info, warn};
use ts_rs::TS;

use crate::{
    commands,
    model::{
        Budget, BudgetPatch, BudgetSnapshot, DEFAULT_CURRENCY, TRIP_REQUIRED,
        VALIDATION_AMOUNT_NOT_FINITE, VALIDATION_EMPTY_PATCH,
    },
    repo,
    time::now_ms,
    trips::normalize_currency,
    AppError, AppResult,
};

async fn fetch_budget(pool: &SqlitePool, trip_id: &str) -> AppResult<Option<Budget>> {
    sqlx::query_as::<_, Budget>("SELECT * FROM budgets WHERE trip_id = ?")
        .bind(trip_id)
        .fetch_optional(pool)
        .await
        .map_err(|err| {
            AppError::from(err)
                .with_context("operation", "fetch_budget")
                .with_context("trip_id", trip_id.to_string())
        })
}

/// Side-effect-free read: a trip with no budget row reports the defaults
/// without creating one.
pub async fn get_budget(pool: &SqlitePool, trip_id: &str) -> AppResult<BudgetSnapshot> {
    let trip = repo::require_trip(trip_id)
        .map_err(|_| AppError::new(TRIP_REQUIRED, "trip_id is required for budgets"))?;
    Ok(fetch_budget(pool, trip)
        .await?
        .map(|row| BudgetSnapshot {
            amount: row.amount,
            currency: row.currency,
        })
        .unwrap_or_else(|| BudgetSnapshot {
            amount: 0.0,
            currency: DEFAULT_CURRENCY.into(),
        }))
}

/// Partial update resolved against the stored row, written through an upsert
/// keyed on trip_id so exactly one row per trip exists afterwards.
pub async fn update_budget(
    pool: &SqlitePool,
    trip_id: &str,
    patch: BudgetPatch,
) -> AppResult<Budget> {
    let trip = repo::require_trip(trip_id)
        .map_err(|_| AppError::new(TRIP_REQUIRED, "trip_id is required for budgets"))?;

    let currency_patch = normalize_currency(patch.currency.as_deref());
    if patch.amount.is_none() && currency_patch.is_none() {
        return Err(AppError::new(
            VALIDATION_EMPTY_PATCH,
            "Provide an amount or a currency to update the budget",
        ));
    }
    if let Some(amount) = patch.amount {
        if !amount.is_finite() {
            return Err(AppError::new(
                VALIDATION_AMOUNT_NOT_FINITE,
                "Budget amount must be a number",
            ));
        }
    }

    let current = fetch_budget(pool, trip).await?;
    let amount = patch
        .amount
        .or(current.as_ref().map(|row| row.amount))
        .unwrap_or(0.0);
    let currency = currency_patch
        .or(current.map(|row| row.currency))
        .unwrap_or_else(|| DEFAULT_CURRENCY.into());

    let mut data = Map::new();
    data.insert("trip_id".into(), Value::String(trip.to_string()));
    data.insert("amount".into(), Value::from(amount));
    data.insert("currency".into(), Value::String(currency));
    commands::upsert_command(pool, "budgets", "trip_id", data).await?;

    fetch_budget(pool, trip).await?.ok_or_else(|| {
        AppError::new("BUDGET/NOT_FOUND", "Budget missing after upsert")
            .with_context("trip_id", trip.to_string())
    })
}

#[derive(Debug, Clone, Serialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct WizardBudgetReport {
    #[ts(type = "number")]
    pub scanned: u64,
    #[ts(type = "number")]
    pub migrated: u64,
    #[ts(type = "number")]
    pub skipped: u64,
    #[ts(type = "number")]
    pub cleanup_failures: u64,
    pub dry_run: bool,
}

struct WizardBudget {
    amount: f64,
    currency: String,
}

/// Pull the `wizardBudget` object out of a JSON-bearing description. Returns
/// the extracted budget plus the sibling keys that must survive the rewrite.
/// Anything that is not a JSON object with a `wizardBudget` object inside is
/// a skip, never an error.
fn parse_wizard(description: Option<&str>) -> Option<(WizardBudget, Map<String, Value>)> {
    let text = description?.trim();
    if text.is_empty() {
        return None;
    }
    let parsed: Value = serde_json::from_str(text).ok()?;
    let Value::Object(mut siblings) = parsed else {
        return None;
    };
    let wizard = siblings.remove("wizardBudget")?;
    let Value::Object(wizard) = wizard else {
        return None;
    };

    let amount = wizard
        .get("amount")
        .and_then(Value::as_f64)
        .filter(|amount| amount.is_finite())
        .unwrap_or(0.0);
    let currency = wizard
        .get("currency")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|currency| !currency.is_empty())
        .map(str::to_uppercase)
        .unwrap_or_else(|| DEFAULT_CURRENCY.into());

    Some((WizardBudget { amount, currency }, siblings))
}

/// One-time migration of legacy embedded budgets for every trip the caller
/// owns. The budget upsert is the operation of record; rewriting the cleaned
/// description is best-effort. Re-runs find no `wizardBudget` key and skip.
pub async fn migrate_wizard_budgets(
    pool: &SqlitePool,
    owner_id: &str,
    dry_run: bool,
) -> AppResult<WizardBudgetReport> {
    let rows = sqlx::query("SELECT id, description FROM trips WHERE owner_id = ? ORDER BY id")
        .bind(owner_id)
        .fetch_all(pool)
        .await
        .map_err(|err| {
            AppError::from(err)
                .with_context("operation", "migrate_wizard_budgets")
                .with_context("owner_id", owner_id.to_string())
        })?;

    let mut report = WizardBudgetReport {
        scanned: rows.len() as u64,
        migrated: 0,
        skipped: 0,
        cleanup_failures: 0,
        dry_run,
    };

    for row in rows {
        let trip_id: String = row.try_get("id").map_err(AppError::from)?;
        let description: Option<String> = row.try_get("description").map_err(AppError::from)?;

        let Some((wizard, siblings)) = parse_wizard(description.as_deref()) else {
            report.skipped += 1;
            continue;
        };
        report.migrated += 1;
        if dry_run {
            continue;
        }

        let mut data = Map::new();
        data.insert("trip_id".into(), Value::String(trip_id.clone()));
        data.insert("amount".into(), Value::from(wizard.amount));
        data.insert("currency".into(), Value::String(wizard.currency));
        commands::upsert_command(pool, "budgets", "trip_id", data)
            .await
            .map_err(|err| err.with_context("operation", "migrate_wizard_budgets"))?;

        let cleaned =
            serde_json::to_string(&Value::Object(siblings)).map_err(AppError::from)?;
        let cleanup = sqlx::query("UPDATE trips SET description = ?, updated_at = ? WHERE id = ?")
            .bind(&cleaned)
            .bind(now_ms())
            .bind(&trip_id)
            .execute(pool)
            .await;
        if let Err(err) = cleanup {
            report.cleanup_failures += 1;
            warn!(
                target = "tripwright",
                event = "wizard_cleanup_failed",
                trip_id = %trip_id,
                error = %err
            );
        }
    }

    info!(
        target = "tripwright",
        event = "wizard_budget_migration",
        owner_id = %owner_id,
        scanned = report.scanned,
        migrated = report.migrated,
        skipped = report.skipped,
        dry_run = report.dry_run
    );
    Ok(report)
}
