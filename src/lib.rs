use paste::paste;

pub mod activities;
pub mod aggregate;
pub mod budget;
pub mod commands;
pub mod db;
pub mod error;
pub mod expenses;
pub mod id;
pub mod logging;
pub mod members;
pub mod migrate;
pub mod model;
pub mod ordering;
pub mod repo;
pub mod share;
pub mod tasks;
pub mod time;
pub mod trips;

pub use error::{AppError, AppResult};
pub use model::*;

pub use activities::{create_activity, list_activities};
pub use aggregate::{trip_preview, DayBucket, TripPreview};
pub use budget::{
    get_budget, migrate_wizard_budgets, update_budget, WizardBudgetReport,
};
pub use expenses::{create_expense, list_expenses};
pub use members::{
    add_member_by_email, add_members_bulk, list_members, remove_member, set_member_role,
    DirectoryEntry, IdentityDirectory, UsersDirectory, MAX_SYNC_PAGES, SYNC_PAGE_SIZE,
};
pub use ordering::{
    assign_unscheduled_to_day, find_or_create_day, list_days, reorder_activities, AssignDayReport,
    ReorderItem, ReorderOutcome, ReorderReport,
};
pub use share::{
    active_share_link, create_share_link, disable_share_link, resolve_share, ShareResolveError,
};
pub use tasks::{create_task, list_tasks};
pub use trips::{
    create_trip, delete_trip, get_trip, list_trips_for_owner, require_trip, update_trip,
};

/// Thin generic handlers over the gateway, one set per trip-scoped table
/// with its own `id` column. Trips, budgets, and members have typed modules
/// instead (different scoping or keys).
macro_rules! gen_trip_cmds {
    ( $( $table:ident ),+ $(,)? ) => {
        paste! {
            $(
                pub async fn [<$table _list>](
                    pool: &sqlx::SqlitePool,
                    trip_id: String,
                    order_by: Option<String>,
                    limit: Option<i64>,
                    offset: Option<i64>,
                ) -> AppResult<Vec<serde_json::Value>> {
                    commands::list_command(
                        pool,
                        stringify!($table),
                        &trip_id,
                        order_by.as_deref(),
                        limit,
                        offset,
                    ).await
                }

                pub async fn [<$table _get>](
                    pool: &sqlx::SqlitePool,
                    trip_id: Option<String>,
                    id: String,
                ) -> AppResult<Option<serde_json::Value>> {
                    commands::get_command(
                        pool,
                        stringify!($table),
                        trip_id.as_deref(),
                        &id,
                    ).await
                }

                pub async fn [<$table _create>](
                    pool: &sqlx::SqlitePool,
                    data: serde_json::Map<String, serde_json::Value>,
                ) -> AppResult<serde_json::Value> {
                    commands::create_command(
                        pool,
                        stringify!($table),
                        data,
                    ).await
                }

                pub async fn [<$table _update>](
                    pool: &sqlx::SqlitePool,
                    id: String,
                    data: serde_json::Map<String, serde_json::Value>,
                    trip_id: Option<String>,
                ) -> AppResult<()> {
                    commands::update_command(
                        pool,
                        stringify!($table),
                        &id,
                        data,
                        trip_id.as_deref(),
                    ).await
                }

                pub async fn [<$table _delete>](
                    pool: &sqlx::SqlitePool,
                    trip_id: String,
                    id: String,
                ) -> AppResult<()> {
                    commands::delete_command(
                        pool,
                        stringify!($table),
                        &trip_id,
                        &id,
                    ).await
                }
            )+
        }
    };
}

gen_trip_cmds!(trip_days, activities, expenses, tasks, share_links);
