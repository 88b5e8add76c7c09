use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqliteRow, Row};
use ts_rs::TS;
use uuid::Uuid;

use crate::AppError;

pub const TRIP_NOT_FOUND: &str = "TRIP/NOT_FOUND";
pub const TRIP_REQUIRED: &str = "TRIP/REQUIRED";

/// Currency written when neither the caller nor a stored row supplies one.
pub const DEFAULT_CURRENCY: &str = "JPY";

pub const VALIDATION_TITLE_REQUIRED: &str = "VALIDATION/TITLE_REQUIRED";
pub const VALIDATION_OWNER_REQUIRED: &str = "VALIDATION/OWNER_REQUIRED";
pub const VALIDATION_DATE_RANGE: &str = "VALIDATION/DATE_RANGE";
pub const VALIDATION_AMOUNT_NOT_FINITE: &str = "VALIDATION/AMOUNT_NOT_FINITE";
pub const VALIDATION_AMOUNT_NEGATIVE: &str = "VALIDATION/AMOUNT_NEGATIVE";
pub const VALIDATION_EMPTY_PATCH: &str = "VALIDATION/EMPTY_PATCH";

pub const MEMBER_EMAIL_UNRESOLVED: &str = "MEMBER/EMAIL_UNRESOLVED";
pub const MEMBER_NOT_FOUND: &str = "MEMBER/NOT_FOUND";
pub const SHARE_NOT_FOUND: &str = "SHARE/NOT_FOUND";

pub const DECODE_ERROR: &str = "MODEL/DECODE";

fn decode_err(entity: &'static str, err: impl std::fmt::Display) -> AppError {
    AppError::new(DECODE_ERROR, format!("Failed to decode {entity} row"))
        .with_context("error", err.to_string())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Trip {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional, type = "string")]
    pub start_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional, type = "string")]
    pub end_date: Option<NaiveDate>,
    pub owner_id: String,
    pub currency_code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub description: Option<String>,
    #[ts(type = "number")]
    pub created_at: i64,
    #[ts(type = "number")]
    pub updated_at: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow, TS)]
#[ts(export, export_to = "bindings/")]
pub struct TripDay {
    pub id: String,
    pub trip_id: String,
    #[ts(type = "string")]
    pub date: NaiveDate,
    #[ts(type = "number")]
    pub created_at: i64,
    #[ts(type = "number")]
    pub updated_at: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Activity {
    pub id: String,
    pub trip_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub day_id: Option<String>,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub start_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub end_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub note: Option<String>,
    #[ts(type = "number")]
    pub order_no: i64,
    #[ts(type = "number")]
    pub created_at: i64,
    #[ts(type = "number")]
    pub updated_at: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum ExpenseCategory {
    Meal,
    Transport,
    Lodging,
    Ticket,
    Other,
}

impl ExpenseCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExpenseCategory::Meal => "meal",
            ExpenseCategory::Transport => "transport",
            ExpenseCategory::Lodging => "lodging",
            ExpenseCategory::Ticket => "ticket",
            ExpenseCategory::Other => "other",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "meal" => Some(ExpenseCategory::Meal),
            "transport" => Some(ExpenseCategory::Transport),
            "lodging" => Some(ExpenseCategory::Lodging),
            "ticket" => Some(ExpenseCategory::Ticket),
            "other" => Some(ExpenseCategory::Other),
            _ => None,
        }
    }
}

/// Who paid an expense, decided once at the boundary: a value that parses as
/// an account UUID is a registered member, anything else is a free-text name.
/// The two storage columns stay mutually exclusive by construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payer {
    Member(String),
    Name(String),
}

impl Payer {
    pub fn from_raw(raw: &str) -> Option<Payer> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        if Uuid::parse_str(trimmed).is_ok() {
            Some(Payer::Member(trimmed.to_string()))
        } else {
            Some(Payer::Name(trimmed.to_string()))
        }
    }

    pub fn from_columns(paid_by: Option<String>, paid_by_name: Option<String>) -> Option<Payer> {
        match (paid_by, paid_by_name) {
            (Some(id), _) => Some(Payer::Member(id)),
            (None, Some(name)) => Some(Payer::Name(name)),
            (None, None) => None,
        }
    }

    pub fn into_columns(self) -> (Option<String>, Option<String>) {
        match self {
            Payer::Member(id) => (Some(id), None),
            Payer::Name(name) => (None, Some(name)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Expense {
    pub id: String,
    pub trip_id: String,
    #[ts(type = "string")]
    pub date: NaiveDate,
    pub title: String,
    pub category: ExpenseCategory,
    #[ts(type = "number")]
    pub amount: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub paid_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub paid_by_name: Option<String>,
    #[serde(default)]
    pub split_with: Vec<String>,
    #[ts(type = "number")]
    pub created_at: i64,
    #[ts(type = "number")]
    pub updated_at: i64,
}

impl Expense {
    pub fn payer(&self) -> Option<Payer> {
        Payer::from_columns(self.paid_by.clone(), self.paid_by_name.clone())
    }
}

impl TryFrom<&SqliteRow> for Expense {
    type Error = AppError;

    fn try_from(row: &SqliteRow) -> Result<Self, Self::Error> {
        let category_raw: String = row.try_get("category").map_err(AppError::from)?;
        let category = ExpenseCategory::parse(&category_raw)
            .ok_or_else(|| decode_err("expense", format!("unknown category {category_raw}")))?;
        let split_raw: String = row.try_get("split_with").map_err(AppError::from)?;
        let split_with: Vec<String> =
            serde_json::from_str(&split_raw).map_err(|e| decode_err("expense", e))?;
        Ok(Self {
            id: row.try_get("id").map_err(AppError::from)?,
            trip_id: row.try_get("trip_id").map_err(AppError::from)?,
            date: row.try_get("date").map_err(AppError::from)?,
            title: row.try_get("title").map_err(AppError::from)?,
            category,
            amount: row.try_get("amount").map_err(AppError::from)?,
            paid_by: row.try_get("paid_by").map_err(AppError::from)?,
            paid_by_name: row.try_get("paid_by_name").map_err(AppError::from)?,
            split_with,
            created_at: row.try_get("created_at").map_err(AppError::from)?,
            updated_at: row.try_get("updated_at").map_err(AppError::from)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Budget {
    pub trip_id: String,
    #[ts(type = "number")]
    pub amount: f64,
    pub currency: String,
    #[ts(type = "number")]
    pub created_at: i64,
    #[ts(type = "number")]
    pub updated_at: i64,
}

/// Read-side view of a trip's budget; the defaults stand in when no row has
/// been written yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct BudgetSnapshot {
    #[ts(type = "number")]
    pub amount: f64,
    pub currency: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum TaskKind {
    Todo,
    Packing,
}

impl TaskKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::Todo => "todo",
            TaskKind::Packing => "packing",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "todo" => Some(TaskKind::Todo),
            "packing" => Some(TaskKind::Packing),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Task {
    pub id: String,
    pub trip_id: String,
    pub title: String,
    pub kind: TaskKind,
    pub done: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional, type = "number")]
    pub sort_order: Option<i64>,
    #[ts(type = "number")]
    pub created_at: i64,
    #[ts(type = "number")]
    pub updated_at: i64,
}

impl TryFrom<&SqliteRow> for Task {
    type Error = AppError;

    fn try_from(row: &SqliteRow) -> Result<Self, Self::Error> {
        let kind_raw: String = row.try_get("kind").map_err(AppError::from)?;
        let kind = TaskKind::parse(&kind_raw)
            .ok_or_else(|| decode_err("task", format!("unknown kind {kind_raw}")))?;
        Ok(Self {
            id: row.try_get("id").map_err(AppError::from)?,
            trip_id: row.try_get("trip_id").map_err(AppError::from)?,
            title: row.try_get("title").map_err(AppError::from)?,
            kind,
            done: row
                .try_get::<i64, _>("done")
                .map(|value| value != 0)
                .map_err(AppError::from)?,
            sort_order: row.try_get("sort_order").map_err(AppError::from)?,
            created_at: row.try_get("created_at").map_err(AppError::from)?,
            updated_at: row.try_get("updated_at").map_err(AppError::from)?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum MemberRole {
    Owner,
    Editor,
    Viewer,
}

impl MemberRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemberRole::Owner => "owner",
            MemberRole::Editor => "editor",
            MemberRole::Viewer => "viewer",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "owner" => Some(MemberRole::Owner),
            "editor" => Some(MemberRole::Editor),
            "viewer" => Some(MemberRole::Viewer),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct TripMember {
    pub trip_id: String,
    pub user_id: String,
    pub role: MemberRole,
    #[ts(type = "number")]
    pub created_at: i64,
    #[ts(type = "number")]
    pub updated_at: i64,
}

impl TryFrom<&SqliteRow> for TripMember {
    type Error = AppError;

    fn try_from(row: &SqliteRow) -> Result<Self, Self::Error> {
        let role_raw: String = row.try_get("role").map_err(AppError::from)?;
        let role = MemberRole::parse(&role_raw)
            .ok_or_else(|| decode_err("trip member", format!("unknown role {role_raw}")))?;
        Ok(Self {
            trip_id: row.try_get("trip_id").map_err(AppError::from)?,
            user_id: row.try_get("user_id").map_err(AppError::from)?,
            role,
            created_at: row.try_get("created_at").map_err(AppError::from)?,
            updated_at: row.try_get("updated_at").map_err(AppError::from)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow, TS)]
#[ts(export, export_to = "bindings/")]
pub struct ShareLink {
    pub id: String,
    pub trip_id: String,
    pub is_enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional, type = "number")]
    pub expires_at: Option<i64>,
    #[ts(type = "number")]
    pub created_at: i64,
    #[ts(type = "number")]
    pub updated_at: i64,
}

impl ShareLink {
    /// Expiry is enforced at the serving boundary; an enabled link with a
    /// past expiry still exists as a row.
    pub fn is_active(&self, now_ms: i64) -> bool {
        self.is_enabled && self.expires_at.map_or(true, |at| at > now_ms)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TripCreateInput {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, alias = "startDate")]
    pub start_date: Option<NaiveDate>,
    #[serde(default, alias = "endDate")]
    pub end_date: Option<NaiveDate>,
    #[serde(alias = "ownerId")]
    pub owner_id: String,
    #[serde(default, alias = "currencyCode")]
    pub currency_code: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TripUpdateInput {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, alias = "startDate")]
    pub start_date: Option<NaiveDate>,
    #[serde(default, alias = "endDate")]
    pub end_date: Option<NaiveDate>,
    #[serde(default, alias = "currencyCode")]
    pub currency_code: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ActivityInput {
    pub title: String,
    #[serde(default, alias = "dayId")]
    pub day_id: Option<String>,
    #[serde(default, alias = "startTime")]
    pub start_time: Option<String>,
    #[serde(default, alias = "endTime")]
    pub end_time: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default, alias = "orderNo")]
    pub order_no: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExpenseInput {
    pub date: NaiveDate,
    pub title: String,
    pub category: ExpenseCategory,
    pub amount: f64,
    /// Raw payer value from the form; routed to a tagged `Payer` once.
    #[serde(default, alias = "paidBy")]
    pub paid_by: Option<String>,
    #[serde(default, alias = "splitWith")]
    pub split_with: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TaskInput {
    pub title: String,
    pub kind: TaskKind,
    #[serde(default)]
    pub done: bool,
    #[serde(default, alias = "sortOrder")]
    pub sort_order: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BudgetPatch {
    #[serde(default)]
    pub amount: Option<f64>,
    #[serde(default)]
    pub currency: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReorderPair {
    #[serde(alias = "activityId")]
    pub activity_id: String,
    #[serde(alias = "orderNo")]
    pub order_no: i64,
}
