//! Lesson progress tracking.

mod store;

pub use store::{ProgressRecord, ProgressStore};
