//! DigiLearn - Local Account Store
//!
//! Accounts, settings and lesson progress, all on your own disk.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use digilearn::cli;

/// Local account and progress storage for DigiLearn.
#[derive(Parser)]
#[command(name = "digilearn")]
#[command(author = "Katie")]
#[command(version)]
#[command(about = "Local account, settings and progress storage for DigiLearn.")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Data directory for the database
    #[arg(long, default_value = "~/.digilearn")]
    data_dir: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the database and schema
    Init,

    /// Create a new account
    Signup {
        /// Username (primary key)
        username: String,
        /// Password, hashed before storage
        password: String,
        /// Optional email, unique across accounts
        #[arg(long)]
        email: Option<String>,
        /// First security question
        #[arg(long)]
        q1: Option<String>,
        /// Answer to the first security question
        #[arg(long)]
        a1: Option<String>,
        /// Second security question
        #[arg(long)]
        q2: Option<String>,
        /// Answer to the second security question
        #[arg(long)]
        a2: Option<String>,
    },

    /// Show an account by username or email
    Show {
        /// Username or email
        identifier: String,
    },

    /// Check whether a username is taken
    Exists {
        /// Username
        username: String,
    },

    /// Write an application setting
    Set {
        /// Setting key
        key: String,
        /// Setting value
        value: String,
    },

    /// Read an application setting
    Get {
        /// Setting key
        key: String,
    },

    /// Record lesson progress for a user
    Record {
        /// Username
        username: String,
        /// Course identifier
        course_id: String,
        /// Lesson identifier
        lesson_id: String,
        /// Optional JSON payload
        #[arg(long)]
        payload: Option<String>,
    },

    /// List a user's lesson progress
    Progress {
        /// Username
        username: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    // Expand ~ in data_dir
    let data_dir = if cli.data_dir.starts_with("~") {
        dirs::home_dir()
            .expect("Could not find home directory")
            .join(cli.data_dir.strip_prefix("~").unwrap())
    } else {
        cli.data_dir
    };

    match cli.command {
        Commands::Init => cli::handle_init(&data_dir).await?,
        Commands::Signup {
            username,
            password,
            email,
            q1,
            a1,
            q2,
            a2,
        } => cli::handle_signup(&data_dir, &username, email, &password, q1, a1, q2, a2).await?,
        Commands::Show { identifier } => cli::handle_show(&data_dir, &identifier).await?,
        Commands::Exists { username } => cli::handle_exists(&data_dir, &username).await?,
        Commands::Set { key, value } => cli::handle_set(&data_dir, &key, &value).await?,
        Commands::Get { key } => cli::handle_get(&data_dir, &key).await?,
        Commands::Record {
            username,
            course_id,
            lesson_id,
            payload,
        } => cli::handle_record(&data_dir, &username, &course_id, &lesson_id, payload).await?,
        Commands::Progress { username } => cli::handle_progress(&data_dir, &username).await?,
    }

    Ok(())
}
