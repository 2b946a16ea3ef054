use async_trait::async_trait;
use chrono::Utc;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};
use std::str::FromStr;

use super::{JobStore, StoreError};
use crate::models::job::{GenImageJob, JobStatus};

/// PostgreSQL-backed [`JobStore`].
#[derive(Clone)]
pub struct PgJobStore {
    pool: PgPool,
    /// Max WAITING_FOR_APPROVAL records kept per identity; `None` keeps all.
    retention: Option<u32>,
}

impl PgJobStore {
    pub fn new(pool: PgPool, retention: Option<u32>) -> Self {
        Self { pool, retention }
    }

    /// All jobs recorded for an identity, newest first.
    #[cfg(test)]
    async fn jobs_for(&self, identity: &str) -> Result<Vec<GenImageJob>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT key, email, prompt, status, image_url, error, create_time, modify_time
            FROM gen_image_jobs
            WHERE email = $1
            ORDER BY modify_time DESC
            "#,
        )
        .bind(identity)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(job_from_row).collect()
    }

    /// Look up one job by its exact key.
    #[cfg(test)]
    async fn get_job(&self, key: &str) -> Result<Option<GenImageJob>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT key, email, prompt, status, image_url, error, create_time, modify_time
            FROM gen_image_jobs
            WHERE key = $1
            "#,
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(job_from_row).transpose()
    }

    async fn prune_waiting(
        tx: &mut Transaction<'_, Postgres>,
        identity: &str,
        keep: u32,
    ) -> Result<u64, StoreError> {
        let result = sqlx::query(
            r#"
            DELETE FROM gen_image_jobs
            WHERE key IN (
                SELECT key FROM gen_image_jobs
                WHERE email = $1 AND status = 'WAITING_FOR_APPROVAL'
                ORDER BY modify_time DESC
                OFFSET $2
            )
            "#,
        )
        .bind(identity)
        .bind(i64::from(keep))
        .execute(&mut **tx)
        .await?;

        Ok(result.rows_affected())
    }
}

fn job_from_row(row: &PgRow) -> Result<GenImageJob, StoreError> {
    let key: String = row.try_get("key")?;
    let status_str: String = row.try_get("status")?;
    let status = JobStatus::from_str(&status_str).map_err(|_| StoreError::Corrupt {
        key: key.clone(),
        reason: format!("unknown status {status_str}"),
    })?;

    Ok(GenImageJob {
        key,
        email: row.try_get("email")?,
        prompt: row.try_get("prompt")?,
        status,
        image_url: row.try_get("image_url")?,
        error: row.try_get("error")?,
        create_time: row.try_get("create_time")?,
        modify_time: row.try_get("modify_time")?,
    })
}

/// Upsert a job row inside a transaction.
async fn put_job(
    tx: &mut Transaction<'_, Postgres>,
    job: &GenImageJob,
) -> Result<(), StoreError> {
    sqlx::query(
        r#"
        INSERT INTO gen_image_jobs
            (key, email, prompt, status, image_url, error, create_time, modify_time)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        ON CONFLICT (key) DO UPDATE
        SET email = EXCLUDED.email,
            prompt = EXCLUDED.prompt,
            status = EXCLUDED.status,
            image_url = EXCLUDED.image_url,
            error = EXCLUDED.error,
            create_time = EXCLUDED.create_time,
            modify_time = EXCLUDED.modify_time
        "#,
    )
    .bind(&job.key)
    .bind(&job.email)
    .bind(&job.prompt)
    .bind(job.status.as_ref())
    .bind(&job.image_url)
    .bind(&job.error)
    .bind(job.create_time)
    .bind(job.modify_time)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

#[async_trait]
impl JobStore for PgJobStore {
    async fn create_job(&self, identity: &str, prompt: &str) -> Result<GenImageJob, StoreError> {
        let job = GenImageJob::new(identity, prompt, Utc::now());

        let mut tx = self.pool.begin().await?;
        put_job(&mut tx, &job).await?;
        tx.commit().await?;

        Ok(job)
    }

    async fn promote_job(
        &self,
        identity: &str,
        image_url: &str,
    ) -> Result<GenImageJob, StoreError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(
            r#"
            SELECT key, email, prompt, status, image_url, error, create_time, modify_time
            FROM gen_image_jobs
            WHERE key = $1
            FOR UPDATE
            "#,
        )
        .bind(identity)
        .fetch_optional(&mut *tx)
        .await?;

        let current = match row {
            Some(r) => job_from_row(&r)?,
            None => return Err(StoreError::NotFound(identity.to_string())),
        };

        let promoted = current.promoted(image_url, Utc::now());
        put_job(&mut tx, &promoted).await?;

        sqlx::query("DELETE FROM gen_image_jobs WHERE key = $1")
            .bind(&current.key)
            .execute(&mut *tx)
            .await?;

        if let Some(keep) = self.retention {
            let pruned = Self::prune_waiting(&mut tx, identity, keep).await?;
            if pruned > 0 {
                tracing::debug!(email = %identity, pruned, "Pruned old approval records");
            }
        }

        tx.commit().await?;

        Ok(promoted)
    }

    async fn mark_failed(&self, key: &str, reason: &str) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE gen_image_jobs
            SET status = $1,
                error = $2,
                modify_time = $3
            WHERE key = $4
            "#,
        )
        .bind(JobStatus::Failed.as_ref())
        .bind(reason)
        .bind(Utc::now())
        .bind(key)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(key.to_string()));
        }
        Ok(())
    }

    async fn most_recent_job(&self, identity: &str) -> Result<Option<GenImageJob>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT key, email, prompt, status, image_url, error, create_time, modify_time
            FROM gen_image_jobs
            WHERE email = $1
            ORDER BY modify_time DESC
            LIMIT 1
            "#,
        )
        .bind(identity)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(job_from_row).transpose()
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
