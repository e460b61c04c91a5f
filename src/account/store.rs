//! Account CRUD against the local database.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};

use super::password::hash_password;
use super::types::{NewUser, SecurityQa, SignupOutcome, User};
use crate::storage::{is_constraint_violation, Database, StoreError};

const USER_COLUMNS: &str = "username, email, password_hash, \
     security_q1, security_a1, security_q2, security_a2, created_at, aux_data";

/// Raw column values pulled out of a `users` row before decoding.
type UserRow = (
    String,
    Option<String>,
    String,
    String,
    String,
    String,
    String,
    String,
    Option<String>,
);

fn read_user_row(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
        row.get(8)?,
    ))
}

fn decode_user(row: UserRow) -> Result<User, StoreError> {
    let (username, email, password_hash, q1, a1, q2, a2, created_at, aux_data) = row;
    let created_at = DateTime::parse_from_rfc3339(&created_at)
        .map_err(|e| StoreError::Decode(format!("created_at for {username}: {e}")))?
        .with_timezone(&Utc);
    let aux_data = aux_data
        .map(|raw| serde_json::from_str(&raw))
        .transpose()
        .map_err(|e| StoreError::Decode(format!("aux_data for {username}: {e}")))?;
    Ok(User {
        username,
        email,
        password_hash,
        security_q1: q1,
        security_a1: a1,
        security_q2: q2,
        security_a2: a2,
        created_at,
        aux_data,
    })
}

fn encode_aux(aux: &Option<serde_json::Value>) -> Option<String> {
    aux.as_ref().map(|v| v.to_string())
}

/// User account store.
///
/// Holds a clone of the shared [`Database`] handle; every operation is a
/// single round trip against it.
#[derive(Clone)]
pub struct AccountStore {
    db: Database,
}

impl AccountStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Look up a user by username, falling back to the unique email index.
    ///
    /// A missing user is `Ok(None)`, never an error.
    pub async fn find_user(&self, identifier: &str) -> Result<Option<User>, StoreError> {
        let by_username = self
            .db
            .with_conn(|conn| {
                conn.query_row(
                    &format!("SELECT {USER_COLUMNS} FROM users WHERE username = ?1"),
                    [identifier],
                    read_user_row,
                )
                .optional()
            })
            .map_err(StoreError::Read)?;

        let raw = match by_username {
            Some(raw) => Some(raw),
            None => self
                .db
                .with_conn(|conn| {
                    conn.query_row(
                        &format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1"),
                        [identifier],
                        read_user_row,
                    )
                    .optional()
                })
                .map_err(StoreError::Read)?,
        };

        raw.map(decode_user).transpose()
    }

    /// Whether a user with this username (or email) exists.
    pub async fn user_exists(&self, username: &str) -> Result<bool, StoreError> {
        Ok(self.find_user(username).await?.is_some())
    }

    /// Create a new account.
    ///
    /// The existence pre-check and the insert are separate round trips, so
    /// two racing signups can both pass the check; the UNIQUE constraints on
    /// username and email are the real guard, and a constraint rejection is
    /// reported as a failed outcome, not an error. Only the first two
    /// security Q/A pairs are kept; missing ones default to empty strings.
    pub async fn signup(
        &self,
        username: &str,
        email: Option<&str>,
        password: &str,
        security_qa: &[SecurityQa],
        aux_data: Option<serde_json::Value>,
    ) -> Result<SignupOutcome, StoreError> {
        if username.trim().is_empty() {
            return Ok(SignupOutcome::rejected("Username is required"));
        }
        if self.find_user(username).await?.is_some() {
            return Ok(SignupOutcome::rejected("Username already exists"));
        }

        let qa = |i: usize| security_qa.get(i).cloned().unwrap_or_default();
        let user = User {
            username: username.to_string(),
            email: email.map(str::to_string),
            password_hash: hash_password(password)?,
            security_q1: qa(0).question,
            security_a1: qa(0).answer,
            security_q2: qa(1).question,
            security_a2: qa(1).answer,
            created_at: Utc::now(),
            aux_data,
        };

        let inserted = self.db.with_conn(|conn| {
            conn.execute(
                &format!(
                    "INSERT INTO users ({USER_COLUMNS}) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"
                ),
                params![
                    user.username,
                    user.email,
                    user.password_hash,
                    user.security_q1,
                    user.security_a1,
                    user.security_q2,
                    user.security_a2,
                    user.created_at.to_rfc3339(),
                    encode_aux(&user.aux_data),
                ],
            )
        });

        match inserted {
            Ok(_) => Ok(SignupOutcome::created()),
            Err(e) if is_constraint_violation(&e) => {
                Ok(SignupOutcome::rejected("Failed to create user"))
            }
            Err(e) => Err(StoreError::Write(e)),
        }
    }

    /// Signup from a flat form submission.
    pub async fn create_user(&self, form: NewUser) -> Result<SignupOutcome, StoreError> {
        let qa = [
            SecurityQa {
                question: form.q1.unwrap_or_default(),
                answer: form.a1.unwrap_or_default(),
            },
            SecurityQa {
                question: form.q2.unwrap_or_default(),
                answer: form.a2.unwrap_or_default(),
            },
        ];
        self.signup(
            &form.username,
            form.email.as_deref(),
            &form.password,
            &qa,
            None,
        )
        .await
    }

    /// Replace the stored record for `user.username` with `user`, inserting
    /// if absent. No field merge: the caller supplies the complete record.
    /// A unique-email collision with a different user propagates as a write
    /// error.
    pub async fn update_user(&self, user: &User) -> Result<(), StoreError> {
        self.db
            .with_conn(|conn| {
                conn.execute(
                    &format!(
                        "INSERT INTO users ({USER_COLUMNS}) \
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9) \
                         ON CONFLICT(username) DO UPDATE SET \
                         email = ?2, password_hash = ?3, \
                         security_q1 = ?4, security_a1 = ?5, \
                         security_q2 = ?6, security_a2 = ?7, \
                         created_at = ?8, aux_data = ?9"
                    ),
                    params![
                        user.username,
                        user.email,
                        user.password_hash,
                        user.security_q1,
                        user.security_a1,
                        user.security_q2,
                        user.security_a2,
                        user.created_at.to_rfc3339(),
                        encode_aux(&user.aux_data),
                    ],
                )
                .map(|_| ())
            })
            .map_err(StoreError::Write)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::password::verify_password;
    use serde_json::json;

    fn store() -> AccountStore {
        AccountStore::new(Database::open_in_memory().unwrap())
    }

    fn qa(q1: &str, a1: &str, q2: &str, a2: &str) -> Vec<SecurityQa> {
        vec![
            SecurityQa {
                question: q1.to_string(),
                answer: a1.to_string(),
            },
            SecurityQa {
                question: q2.to_string(),
                answer: a2.to_string(),
            },
        ]
    }

    #[tokio::test]
    async fn signup_then_find_by_username() {
        let store = store();
        let outcome = store
            .signup(
                "ann",
                Some("a@x.com"),
                "p",
                &qa("pet", "cat", "city", "NY"),
                None,
            )
            .await
            .unwrap();
        assert!(outcome.success);

        let user = store.find_user("ann").await.unwrap().unwrap();
        assert_eq!(user.username, "ann");
        assert_eq!(user.email.as_deref(), Some("a@x.com"));
        assert_eq!(user.security_q1, "pet");
        assert_eq!(user.security_a1, "cat");
        assert_eq!(user.security_q2, "city");
        assert_eq!(user.security_a2, "NY");
    }

    #[tokio::test]
    async fn find_by_email_matches_find_by_username() {
        let store = store();
        store
            .signup("ann", Some("a@x.com"), "p", &[], None)
            .await
            .unwrap();

        let by_name = store.find_user("ann").await.unwrap().unwrap();
        let by_email = store.find_user("a@x.com").await.unwrap().unwrap();
        assert_eq!(by_name, by_email);
    }

    #[tokio::test]
    async fn unknown_identifier_is_none_not_error() {
        let store = store();
        assert!(store.find_user("nobody").await.unwrap().is_none());
        assert!(!store.user_exists("nobody").await.unwrap());
    }

    #[tokio::test]
    async fn duplicate_username_rejected_and_record_untouched() {
        let store = store();
        store
            .signup("ann", Some("a@x.com"), "first", &[], None)
            .await
            .unwrap();
        let original = store.find_user("ann").await.unwrap().unwrap();

        let outcome = store
            .signup("ann", Some("other@x.com"), "second", &[], None)
            .await
            .unwrap();
        assert!(!outcome.success);
        assert_eq!(outcome.message, "Username already exists");

        let after = store.find_user("ann").await.unwrap().unwrap();
        assert_eq!(after, original);
    }

    #[tokio::test]
    async fn duplicate_email_rejected_for_different_username() {
        let store = store();
        store
            .signup("ann", Some("shared@x.com"), "p", &[], None)
            .await
            .unwrap();

        let outcome = store
            .signup("bob", Some("shared@x.com"), "p", &[], None)
            .await
            .unwrap();
        assert!(!outcome.success);
        assert_eq!(outcome.message, "Failed to create user");
        assert!(store.find_user("bob").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn multiple_accounts_without_email_coexist() {
        // The unique email index must not collapse NULLs together.
        let store = store();
        let first = store.signup("ann", None, "p", &[], None).await.unwrap();
        let second = store.signup("bob", None, "p", &[], None).await.unwrap();

        assert!(first.success);
        assert!(second.success);
        assert!(store.find_user("ann").await.unwrap().is_some());
        assert!(store.find_user("bob").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn empty_username_rejected() {
        let store = store();
        let outcome = store.signup("  ", None, "p", &[], None).await.unwrap();
        assert!(!outcome.success);
    }

    #[tokio::test]
    async fn missing_qa_defaults_to_empty_strings() {
        let store = store();
        store.signup("ann", None, "p", &[], None).await.unwrap();

        let user = store.find_user("ann").await.unwrap().unwrap();
        assert_eq!(user.security_q1, "");
        assert_eq!(user.security_a1, "");
        assert_eq!(user.security_q2, "");
        assert_eq!(user.security_a2, "");
        assert!(user.email.is_none());
    }

    #[tokio::test]
    async fn password_is_hashed_not_stored() {
        let store = store();
        store.signup("ann", None, "hunter2", &[], None).await.unwrap();

        let user = store.find_user("ann").await.unwrap().unwrap();
        assert_ne!(user.password_hash, "hunter2");
        assert!(verify_password(&user.password_hash, "hunter2"));
        assert!(!verify_password(&user.password_hash, "wrong"));
    }

    #[tokio::test]
    async fn create_user_from_flat_form() {
        let store = store();
        let outcome = store
            .create_user(NewUser {
                username: "ann".to_string(),
                email: Some("a@x.com".to_string()),
                password: "p".to_string(),
                q1: Some("pet".to_string()),
                a1: Some("cat".to_string()),
                q2: Some("city".to_string()),
                a2: Some("NY".to_string()),
            })
            .await
            .unwrap();
        assert!(outcome.success);

        let user = store.find_user("a@x.com").await.unwrap().unwrap();
        assert_eq!(user.username, "ann");
        assert_eq!(user.security_a2, "NY");
    }

    #[tokio::test]
    async fn update_replaces_whole_record() {
        let store = store();
        store
            .signup("ann", Some("a@x.com"), "p", &[], Some(json!({"level": 3})))
            .await
            .unwrap();
        let mut user = store.find_user("ann").await.unwrap().unwrap();
        assert!(user.aux_data.is_some());

        user.email = Some("new@x.com".to_string());
        user.aux_data = None;
        store.update_user(&user).await.unwrap();

        let after = store.find_user("ann").await.unwrap().unwrap();
        assert_eq!(after.email.as_deref(), Some("new@x.com"));
        assert!(after.aux_data.is_none());
        assert!(store.find_user("a@x.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn update_email_collision_is_write_error() {
        let store = store();
        store
            .signup("ann", Some("a@x.com"), "p", &[], None)
            .await
            .unwrap();
        store
            .signup("bob", Some("b@x.com"), "p", &[], None)
            .await
            .unwrap();

        let mut bob = store.find_user("bob").await.unwrap().unwrap();
        bob.email = Some("a@x.com".to_string());
        let err = store.update_user(&bob).await.unwrap_err();
        assert!(matches!(err, StoreError::Write(_)));

        // ann's record survived the rejected write
        let ann = store.find_user("a@x.com").await.unwrap().unwrap();
        assert_eq!(ann.username, "ann");
    }

    #[tokio::test]
    async fn aux_data_round_trips_as_json() {
        let store = store();
        let payload = json!({"grade": 7, "tags": ["math", "intro"]});
        store
            .signup("ann", None, "p", &[], Some(payload.clone()))
            .await
            .unwrap();

        let user = store.find_user("ann").await.unwrap().unwrap();
        assert_eq!(user.aux_data, Some(payload));
    }
}
