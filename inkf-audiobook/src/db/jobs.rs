//! Audiobook job record persistence
//!
//! One row per chapter. Writes are terminal: a run either records the
//! uploaded audio or the error that stopped it.

use chrono::{DateTime, Utc};
use inkf_common::{Error, Result};
use sqlx::{Row, SqlitePool};
use std::time::Duration;

use crate::db::settings::get_db_max_lock_wait_ms;
use crate::models::{job_key, AudiobookJobRecord};
use crate::utils::RetryPolicy;

/// Insert or replace the record for a chapter
pub async fn save_record(pool: &SqlitePool, record: &AudiobookJobRecord) -> Result<()> {
    let audio_size = record.audio_size.map(|size| size as i64);
    let completed_at = record.completed_at.to_rfc3339();
    let max_wait = Duration::from_millis(get_db_max_lock_wait_ms(pool).await?);

    RetryPolicy::for_lock_wait(max_wait)
        .run("save record", &record.job_key, || async {
            sqlx::query(
                r#"
                INSERT INTO audiobook_jobs (
                    job_key, project_id, chapter_id, chapter_title, user_id,
                    audio_url, audio_size, error, completed_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(job_key) DO UPDATE SET
                    chapter_title = excluded.chapter_title,
                    user_id = excluded.user_id,
                    audio_url = excluded.audio_url,
                    audio_size = excluded.audio_size,
                    error = excluded.error,
                    completed_at = excluded.completed_at
                "#,
            )
            .bind(&record.job_key)
            .bind(&record.project_id)
            .bind(&record.chapter_id)
            .bind(&record.chapter_title)
            .bind(&record.user_id)
            .bind(&record.audio_url)
            .bind(audio_size)
            .bind(&record.error)
            .bind(&completed_at)
            .execute(pool)
            .await
            .map_err(Error::Database)?;

            Ok(())
        })
        .await
}

/// Load the record for a chapter, if any run has finished
pub async fn load_record(
    pool: &SqlitePool,
    project_id: &str,
    chapter_id: &str,
) -> Result<Option<AudiobookJobRecord>> {
    let row = sqlx::query(
        r#"
        SELECT job_key, project_id, chapter_id, chapter_title, user_id,
               audio_url, audio_size, error, completed_at
        FROM audiobook_jobs
        WHERE job_key = ?
        "#,
    )
    .bind(job_key(project_id, chapter_id))
    .fetch_optional(pool)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let completed_at: String = row.get("completed_at");
    let completed_at = DateTime::parse_from_rfc3339(&completed_at)
        .map_err(|e| Error::Internal(format!("Failed to parse completed_at: {}", e)))?
        .with_timezone(&Utc);

    let audio_size: Option<i64> = row.get("audio_size");

    Ok(Some(AudiobookJobRecord {
        job_key: row.get("job_key"),
        project_id: row.get("project_id"),
        chapter_id: row.get("chapter_id"),
        chapter_title: row.get("chapter_title"),
        user_id: row.get("user_id"),
        audio_url: row.get("audio_url"),
        audio_size: audio_size.map(|size| size.max(0) as u64),
        error: row.get("error"),
        completed_at,
    }))
}

/// Remove the record for a chapter so a new run reports "processing"
pub async fn delete_record(pool: &SqlitePool, project_id: &str, chapter_id: &str) -> Result<bool> {
    let result = sqlx::query("DELETE FROM audiobook_jobs WHERE job_key = ?")
        .bind(job_key(project_id, chapter_id))
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AudiobookJob;
    use crate::services::speech_client::{SpeechQuality, Voice};
    use inkf_common::db::init_in_memory;

    fn job() -> AudiobookJob {
        AudiobookJob::new(
            "u1".into(),
            "p1".into(),
            "c1".into(),
            "The Beginning".into(),
            vec!["Once.".into()],
            Voice::Nova,
            SpeechQuality::Hd,
        )
    }

    #[tokio::test]
    async fn test_missing_record_is_none() {
        let pool = init_in_memory().await.unwrap();
        assert!(load_record(&pool, "p1", "c1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_completed_record_round_trips() {
        let pool = init_in_memory().await.unwrap();
        let record = AudiobookJobRecord::completed(&job(), "http://h/files/a.mp3".into(), 1234);

        save_record(&pool, &record).await.unwrap();
        let loaded = load_record(&pool, "p1", "c1").await.unwrap().unwrap();

        assert_eq!(loaded.job_key, "p1_c1");
        assert_eq!(loaded.audio_url.as_deref(), Some("http://h/files/a.mp3"));
        assert_eq!(loaded.audio_size, Some(1234));
        assert_eq!(loaded.error, None);
        assert_eq!(loaded.chapter_title, "The Beginning");
    }

    #[tokio::test]
    async fn test_second_run_overwrites_single_record() {
        let pool = init_in_memory().await.unwrap();
        save_record(&pool, &AudiobookJobRecord::failed(&job(), "timeout".into()))
            .await
            .unwrap();
        save_record(&pool, &AudiobookJobRecord::completed(&job(), "http://h/b.mp3".into(), 9))
            .await
            .unwrap();

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM audiobook_jobs")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 1);

        let loaded = load_record(&pool, "p1", "c1").await.unwrap().unwrap();
        assert_eq!(loaded.error, None);
        assert_eq!(loaded.audio_url.as_deref(), Some("http://h/b.mp3"));
    }

    #[tokio::test]
    async fn test_delete_record() {
        let pool = init_in_memory().await.unwrap();
        save_record(&pool, &AudiobookJobRecord::failed(&job(), "x".into()))
            .await
            .unwrap();

        assert!(delete_record(&pool, "p1", "c1").await.unwrap());
        assert!(!delete_record(&pool, "p1", "c1").await.unwrap());
        assert!(load_record(&pool, "p1", "c1").await.unwrap().is_none());
    }
}
