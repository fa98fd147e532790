//! Database initialization tests

use inkf_common::db::{init_database, init_in_memory, init_schema, DEFAULT_SETTINGS};

#[tokio::test]
async fn test_init_database_creates_file_and_tables() {
    let temp = tempfile::TempDir::new().unwrap();
    let db_path = temp.path().join("sub").join("inkfluence.db");

    let pool = init_database(&db_path).await.unwrap();
    assert!(db_path.exists());

    let tables: Vec<String> = sqlx::query_scalar(
        "SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name",
    )
    .fetch_all(&pool)
    .await
    .unwrap();

    for expected in ["audiobook_jobs", "settings", "user_profiles"] {
        assert!(tables.iter().any(|t| t == expected), "missing table {}", expected);
    }
}

#[tokio::test]
async fn test_default_settings_seeded() {
    let pool = init_in_memory().await.unwrap();

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM settings")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count as usize, DEFAULT_SETTINGS.len());

    let chunk_limit: String =
        sqlx::query_scalar("SELECT value FROM settings WHERE key = 'audiobook_chunk_limit'")
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(chunk_limit, "3800");
}

#[tokio::test]
async fn test_init_schema_is_idempotent_and_keeps_overrides() {
    let pool = init_in_memory().await.unwrap();

    sqlx::query("UPDATE settings SET value = '2000' WHERE key = 'audiobook_chunk_limit'")
        .execute(&pool)
        .await
        .unwrap();

    init_schema(&pool).await.unwrap();

    let chunk_limit: String =
        sqlx::query_scalar("SELECT value FROM settings WHERE key = 'audiobook_chunk_limit'")
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(chunk_limit, "2000");
}

#[tokio::test]
async fn test_usage_counters_cannot_go_negative() {
    let pool = init_in_memory().await.unwrap();

    let result = sqlx::query(
        "INSERT INTO user_profiles (user_id, ai_generations, created_at, updated_at)
         VALUES ('u1', -1, '2024-01-01T00:00:00Z', '2024-01-01T00:00:00Z')",
    )
    .execute(&pool)
    .await;

    assert!(result.is_err());
}
