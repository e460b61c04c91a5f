//! CLI command implementations.

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};

use crate::account::{AccountStore, NewUser};
use crate::progress::ProgressStore;
use crate::storage::Database;

/// Database file name inside the data directory.
pub const DB_FILE: &str = "digilearn.db";

fn open_db(data_dir: &Path) -> Result<Database> {
    fs::create_dir_all(data_dir)
        .with_context(|| format!("Failed to create data directory {}", data_dir.display()))?;
    Ok(Database::open(&data_dir.join(DB_FILE))?)
}

/// Initialize the local store.
pub async fn handle_init(data_dir: &Path) -> Result<()> {
    open_db(data_dir)?;
    println!("Store ready at {}", data_dir.join(DB_FILE).display());
    Ok(())
}

/// Create a new account.
#[allow(clippy::too_many_arguments)]
pub async fn handle_signup(
    data_dir: &Path,
    username: &str,
    email: Option<String>,
    password: &str,
    q1: Option<String>,
    a1: Option<String>,
    q2: Option<String>,
    a2: Option<String>,
) -> Result<()> {
    let store = AccountStore::new(open_db(data_dir)?);
    let outcome = store
        .create_user(NewUser {
            username: username.to_string(),
            email,
            password: password.to_string(),
            q1,
            a1,
            q2,
            a2,
        })
        .await?;

    if outcome.success {
        println!("{}", outcome.message);
        Ok(())
    } else {
        bail!(outcome.message)
    }
}

/// Show an account by username or email.
pub async fn handle_show(data_dir: &Path, identifier: &str) -> Result<()> {
    let store = AccountStore::new(open_db(data_dir)?);
    match store.find_user(identifier).await? {
        Some(user) => {
            println!("username:  {}", user.username);
            println!("email:     {}", user.email.as_deref().unwrap_or("-"));
            println!("created:   {}", user.created_at.to_rfc3339());
            if let Some(aux) = &user.aux_data {
                println!("aux data:  {aux}");
            }
        }
        None => println!("No account matches '{identifier}'"),
    }
    Ok(())
}

/// Report whether a username is taken.
pub async fn handle_exists(data_dir: &Path, username: &str) -> Result<()> {
    let store = AccountStore::new(open_db(data_dir)?);
    if store.user_exists(username).await? {
        println!("'{username}' exists");
    } else {
        println!("'{username}' is available");
    }
    Ok(())
}

/// Write an application setting.
pub async fn handle_set(data_dir: &Path, key: &str, value: &str) -> Result<()> {
    let db = open_db(data_dir)?;
    db.set_setting(key, value)?;
    println!("{key} = {value}");
    Ok(())
}

/// Read an application setting.
pub async fn handle_get(data_dir: &Path, key: &str) -> Result<()> {
    let db = open_db(data_dir)?;
    match db.get_setting(key)? {
        Some(value) => println!("{value}"),
        None => println!("'{key}' is not set"),
    }
    Ok(())
}

/// Record lesson progress for a user.
pub async fn handle_record(
    data_dir: &Path,
    username: &str,
    course_id: &str,
    lesson_id: &str,
    payload: Option<String>,
) -> Result<()> {
    let payload = payload
        .map(|raw| serde_json::from_str(&raw))
        .transpose()
        .context("Payload must be valid JSON")?;

    let store = ProgressStore::new(open_db(data_dir)?);
    let rec = store.record(username, course_id, lesson_id, payload).await?;
    println!(
        "Recorded {}/{} for {} (updated {})",
        rec.course_id,
        rec.lesson_id,
        rec.username,
        rec.updated_at.to_rfc3339()
    );
    Ok(())
}

/// List a user's lesson progress.
pub async fn handle_progress(data_dir: &Path, username: &str) -> Result<()> {
    let store = ProgressStore::new(open_db(data_dir)?);
    let records = store.for_user(username).await?;
    if records.is_empty() {
        println!("No progress recorded for '{username}'");
        return Ok(());
    }
    for rec in records {
        let payload = rec
            .payload
            .map(|v| v.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!("{}/{}  {}", rec.course_id, rec.lesson_id, payload);
    }
    Ok(())
}
