//! SQLite storage.

mod db;

pub use db::{Database, StoreError};
pub(crate) use db::is_constraint_violation;
