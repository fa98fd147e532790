//! Database initialization
//!
//! Opens (or creates) the SQLite database, applies pragmas, creates the
//! schema idempotently and seeds default settings.

use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::info;

/// Default runtime settings, inserted only when absent
pub const DEFAULT_SETTINGS: &[(&str, &str)] = &[
    ("audiobook_chunk_limit", "3800"),
    ("audiobook_max_retries", "3"),
    ("audiobook_synthesis_concurrency", "1"),
    ("db_max_lock_wait_ms", "5000"),
    ("db_lock_retry_ms", "250"),
];

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .min_connections(1)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    // WAL allows concurrent readers with one writer
    sqlx::query("PRAGMA journal_mode = WAL").execute(&pool).await?;

    init_schema(&pool).await?;

    // Short busy timeout; longer waits are retried by the service's lock-wait policy
    let timeout_ms: i64 = sqlx::query_scalar(
        "SELECT CAST(value AS INTEGER) FROM settings WHERE key = 'db_lock_retry_ms'",
    )
    .fetch_optional(&pool)
    .await?
    .unwrap_or(250);

    sqlx::query(&format!("PRAGMA busy_timeout = {}", timeout_ms))
        .execute(&pool)
        .await?;

    info!("Database busy timeout set to {} ms", timeout_ms);

    Ok(pool)
}

/// Single-connection in-memory database with the full schema
///
/// The connection is never recycled, so the data lives as long as the pool.
pub async fn init_in_memory() -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await?;

    init_schema(&pool).await?;
    Ok(pool)
}

/// Create all tables and seed default settings (idempotent)
pub async fn init_schema(pool: &SqlitePool) -> Result<()> {
    create_settings_table(pool).await?;
    create_audiobook_jobs_table(pool).await?;
    create_user_profiles_table(pool).await?;
    init_default_settings(pool).await?;
    Ok(())
}

async fn create_settings_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

/// One row per chapter, keyed `{project_id}_{chapter_id}`
async fn create_audiobook_jobs_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS audiobook_jobs (
            job_key TEXT PRIMARY KEY,
            project_id TEXT NOT NULL,
            chapter_id TEXT NOT NULL,
            chapter_title TEXT NOT NULL DEFAULT '',
            user_id TEXT NOT NULL,
            audio_url TEXT,
            audio_size INTEGER,
            error TEXT,
            completed_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_audiobook_jobs_user ON audiobook_jobs(user_id)",
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn create_user_profiles_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS user_profiles (
            user_id TEXT PRIMARY KEY,
            tier TEXT NOT NULL DEFAULT 'free',
            page_quota INTEGER NOT NULL DEFAULT 30,
            ai_generations INTEGER NOT NULL DEFAULT 0 CHECK (ai_generations >= 0),
            audiobook_chapters INTEGER NOT NULL DEFAULT 0 CHECK (audiobook_chapters >= 0),
            cover_generations INTEGER NOT NULL DEFAULT 0 CHECK (cover_generations >= 0),
            stripe_customer_id TEXT,
            stripe_subscription_id TEXT,
            subscription_status TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_user_profiles_customer ON user_profiles(stripe_customer_id)",
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn init_default_settings(pool: &SqlitePool) -> Result<()> {
    for (key, value) in DEFAULT_SETTINGS {
        sqlx::query("INSERT OR IGNORE INTO settings (key, value) VALUES (?, ?)")
            .bind(key)
            .bind(value)
            .execute(pool)
            .await?;
    }
    Ok(())
}
