//! DigiLearn - Local Account Store
//!
//! Offline-first account, settings and progress storage for the DigiLearn
//! learning app, backed by an embedded SQLite database.

pub mod account;
pub mod cli;
pub mod progress;
pub mod storage;

// Re-export commonly used types
pub use account::{AccountStore, NewUser, SecurityQa, SignupOutcome, User};
pub use progress::{ProgressRecord, ProgressStore};
pub use storage::{Database, StoreError};
