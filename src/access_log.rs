use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres};
use tracing::{info, warn};

use crate::models::{AccessLogEntry, NewAccessLogEntry};
use crate::store::StoreResult;

/// Destination for per-request access records.
#[async_trait]
pub trait AccessLogSink: Send + Sync {
    async fn record(&self, entry: NewAccessLogEntry) -> StoreResult<()>;
    /// Delete entries older than `cutoff`; returns the number removed.
    async fn purge_older_than(&self, cutoff: DateTime<Utc>) -> StoreResult<u64>;
}

#[derive(Clone)]
pub struct PgAccessLog {
    pool: Pool<Postgres>,
}

impl PgAccessLog {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    pub async fn recent(&self, limit: i64) -> StoreResult<Vec<AccessLogEntry>> {
        let recs = sqlx::query_as::<_, AccessLogEntry>(
            "SELECT id, ts, path, remote_ip, user_agent, auth_user, status FROM access_logs ORDER BY ts DESC, id DESC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(recs)
    }
}

#[async_trait]
impl AccessLogSink for PgAccessLog {
    async fn record(&self, entry: NewAccessLogEntry) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO access_logs (path, remote_ip, user_agent, auth_user, status) VALUES ($1,$2,$3,$4,$5)",
        )
        .bind(&entry.path)
        .bind(&entry.remote_ip)
        .bind(&entry.user_agent)
        .bind(&entry.auth_user)
        .bind(i32::from(entry.status))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn purge_older_than(&self, cutoff: DateTime<Utc>) -> StoreResult<u64> {
        let res = sqlx::query("DELETE FROM access_logs WHERE ts < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected())
    }
}

/// Cutoff for a retention window ending now.
pub fn retention_cutoff(now: DateTime<Utc>, retention: Duration) -> DateTime<Utc> {
    let window = chrono::Duration::from_std(retention).unwrap_or(chrono::Duration::MAX);
    now.checked_sub_signed(window).unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Run one purge pass and log the outcome.
pub async fn purge_once(sink: &dyn AccessLogSink, retention: Duration) -> StoreResult<u64> {
    let cutoff = retention_cutoff(Utc::now(), retention);
    let deleted = sink.purge_older_than(cutoff).await?;
    info!(deleted, %cutoff, "purged old access log entries");
    Ok(deleted)
}

/// Periodically purge entries older than `retention` on the current runtime.
pub fn spawn_retention_task(sink: Arc<dyn AccessLogSink>, retention: Duration, every: Duration) {
    actix_web::rt::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            if let Err(e) = purge_once(sink.as_ref(), retention).await {
                warn!("access log purge failed: {e}");
            }
        }
    });
}
