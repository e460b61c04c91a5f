//! Account record types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A stored user account.
///
/// The credential field holds an Argon2 hash, never the password itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub username: String,
    pub email: Option<String>,
    pub password_hash: String,
    pub security_q1: String,
    pub security_a1: String,
    pub security_q2: String,
    pub security_a2: String,
    pub created_at: DateTime<Utc>,
    /// Opaque payload owned by the caller; stored as JSON.
    pub aux_data: Option<serde_json::Value>,
}

/// A security question/answer pair supplied at signup.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SecurityQa {
    pub question: String,
    pub answer: String,
}

/// Flat-field signup input, mirroring the form the UI submits.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewUser {
    pub username: String,
    pub email: Option<String>,
    pub password: String,
    pub q1: Option<String>,
    pub a1: Option<String>,
    pub q2: Option<String>,
    pub a2: Option<String>,
}

/// Outcome of a signup attempt.
///
/// Business rejections (duplicate username, constraint-rejected insert) are
/// values of this type, not errors; only engine failures become [`StoreError`].
///
/// [`StoreError`]: crate::storage::StoreError
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignupOutcome {
    pub success: bool,
    pub message: String,
}

impl SignupOutcome {
    pub(crate) fn created() -> Self {
        Self {
            success: true,
            message: "User created successfully".to_string(),
        }
    }

    pub(crate) fn rejected(message: &str) -> Self {
        Self {
            success: false,
            message: message.to_string(),
        }
    }
}
