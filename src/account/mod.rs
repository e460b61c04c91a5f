//! User accounts - signup, lookup, update.

mod password;
mod store;
mod types;

pub use password::{hash_password, verify_password};
pub use store::AccountStore;
pub use types::{NewUser, SecurityQa, SignupOutcome, User};
