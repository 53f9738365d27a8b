//! Database module for SQLite persistence.
//!
//! SQLite is the source of truth for all application data. Uniqueness of
//! votes, check-ins and speaker votes is enforced here, not by callers.

mod repository;

pub use repository::*;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;

/// Initialize the database connection pool and run migrations.
pub async fn init_database(db_path: &Path) -> Result<SqlitePool, sqlx::Error> {
    // Ensure the parent directory exists
    if let Some(parent) = db_path.parent() {
        tokio::fs::create_dir_all(parent).await.ok();
    }

    let db_url = format!("sqlite:{}?mode=rwc", db_path.display());

    let options = SqliteConnectOptions::from_str(&db_url)?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
        .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
        .busy_timeout(std::time::Duration::from_secs(30));

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    // Run embedded migrations
    run_migrations(&pool).await?;

    Ok(pool)
}

/// Run database migrations.
async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS meta (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            schema_version INTEGER NOT NULL DEFAULT 1,
            revision_id INTEGER NOT NULL DEFAULT 0,
            generated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        INSERT OR IGNORE INTO meta (id, schema_version, revision_id, generated_at)
        VALUES (1, 1, 0, datetime('now'));
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS classes (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            subtitle TEXT,
            description TEXT NOT NULL DEFAULT '',
            location TEXT NOT NULL DEFAULT '',
            class_date TEXT NOT NULL,
            duration_minutes INTEGER NOT NULL DEFAULT 60,
            qa_open INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS questions (
            id TEXT PRIMARY KEY,
            class_id TEXT NOT NULL REFERENCES classes(id) ON DELETE CASCADE,
            body TEXT NOT NULL,
            is_answered INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS question_upvotes (
            id TEXT PRIMARY KEY,
            question_id TEXT NOT NULL REFERENCES questions(id) ON DELETE CASCADE,
            voter_kind TEXT NOT NULL,
            voter_id TEXT NOT NULL,
            created_at TEXT NOT NULL,
            UNIQUE (question_id, voter_kind, voter_id)
        );

        CREATE TABLE IF NOT EXISTS question_replies (
            id TEXT PRIMARY KEY,
            question_id TEXT NOT NULL REFERENCES questions(id) ON DELETE CASCADE,
            body TEXT NOT NULL,
            created_at TEXT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS attendance (
            id TEXT PRIMARY KEY,
            class_id TEXT NOT NULL REFERENCES classes(id) ON DELETE CASCADE,
            user_id TEXT NOT NULL,
            attendee_name TEXT NOT NULL,
            checked_in_at TEXT NOT NULL,
            UNIQUE (class_id, user_id)
        );

        CREATE TABLE IF NOT EXISTS speaker_suggestions (
            id TEXT PRIMARY KEY,
            class_id TEXT NOT NULL REFERENCES classes(id) ON DELETE CASCADE,
            name TEXT NOT NULL,
            topic TEXT NOT NULL,
            votes INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS speaker_votes (
            id TEXT PRIMARY KEY,
            suggestion_id TEXT NOT NULL REFERENCES speaker_suggestions(id) ON DELETE CASCADE,
            user_id TEXT NOT NULL,
            created_at TEXT NOT NULL,
            UNIQUE (suggestion_id, user_id)
        );

        CREATE TABLE IF NOT EXISTS slides (
            id TEXT PRIMARY KEY,
            class_id TEXT REFERENCES classes(id) ON DELETE SET NULL,
            title TEXT NOT NULL,
            url TEXT NOT NULL,
            created_at TEXT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    // Create indexes for common queries
    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_classes_class_date ON classes(class_date);
        CREATE INDEX IF NOT EXISTS idx_questions_class_id ON questions(class_id, created_at);
        CREATE INDEX IF NOT EXISTS idx_replies_question_id ON question_replies(question_id, created_at);
        CREATE INDEX IF NOT EXISTS idx_attendance_class_id ON attendance(class_id);
        CREATE INDEX IF NOT EXISTS idx_suggestions_class_id ON speaker_suggestions(class_id);
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
