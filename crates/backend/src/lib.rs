//! SQLite persistence layer for the cadence engine.
//!
//! Stores expose `sqlx::Error` directly; the engine crate converts at its
//! boundary. `sqlx` is re-exported so callers can match on those errors
//! without a direct dependency.

pub use sqlx;

pub mod accounts;
pub mod db;
pub mod logs;
mod row;
pub mod rules;
pub mod tasks;

pub use accounts::AccountStore;
pub use db::Database;
pub use logs::{ExecutionLogStore, NewExecutionLog};
pub use rules::RuleStore;
pub use tasks::{NewGeneratedTask, TaskInsert, TaskStore};
