use async_trait::async_trait;

use crate::models::{Message, NewMessage};

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("database: {0}")]
    Database(#[from] sqlx::Error),
    #[error("encode: {0}")]
    Encode(#[from] serde_json::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Append-only message persistence.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Persist one message; returns once the write is durable.
    async fn append(&self, new: NewMessage) -> StoreResult<Message>;
    /// At most `limit` messages, newest first.
    async fn read_recent(&self, limit: usize) -> StoreResult<Vec<Message>>;
    /// Cheap reachability check for the backing storage.
    async fn ping(&self) -> StoreResult<()>;
}

pub mod file {
    use super::*;
    use chrono::Utc;
    use std::io::ErrorKind;
    use std::path::{Path, PathBuf};
    use tokio::fs::OpenOptions;
    use tokio::io::AsyncWriteExt;
    use tracing::debug;

    /// Newline-delimited JSON file, one message per line.
    #[derive(Clone, Debug)]
    pub struct FileMessageStore {
        path: PathBuf,
    }

    impl FileMessageStore {
        pub fn new(path: impl Into<PathBuf>) -> Self {
            Self { path: path.into() }
        }

        pub fn path(&self) -> &Path {
            &self.path
        }
    }

    #[async_trait]
    impl MessageStore for FileMessageStore {
        async fn append(&self, new: NewMessage) -> StoreResult<Message> {
            let message = new.into_message(Utc::now());
            let mut line = serde_json::to_vec(&message)?;
            line.push(b'\n');

            let mut file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)
                .await?;
            // single write per entry; O_APPEND keeps concurrent lines whole
            file.write_all(&line).await?;
            file.flush().await?;
            file.sync_data().await?;
            Ok(message)
        }

        async fn read_recent(&self, limit: usize) -> StoreResult<Vec<Message>> {
            // raw bytes: a line that is not valid UTF-8 is skipped like any other bad line
            let data = match tokio::fs::read(&self.path).await {
                Ok(d) => d,
                Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
                Err(e) => return Err(e.into()),
            };
            let recent = data
                .split(|b| *b == b'\n')
                .rev()
                .map(<[u8]>::trim_ascii)
                .filter(|l| !l.is_empty())
                .filter_map(|l| match serde_json::from_slice::<Message>(l) {
                    Ok(m) => Some(m),
                    Err(e) => {
                        debug!("skipping malformed line in {}: {e}", self.path.display());
                        None
                    }
                })
                .take(limit)
                .collect();
            Ok(recent)
        }

        async fn ping(&self) -> StoreResult<()> {
            match tokio::fs::metadata(&self.path).await {
                Ok(_) => Ok(()),
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    let dir = match self.path.parent() {
                        Some(p) if !p.as_os_str().is_empty() => p,
                        _ => Path::new("."),
                    };
                    tokio::fs::metadata(dir).await?;
                    Ok(())
                }
                Err(e) => Err(e.into()),
            }
        }
    }
}

pub mod pg {
    use super::*;
    use sqlx::{Pool, Postgres};

    const MESSAGE_COLUMNS: &str = "id, author, content, source_ip, user_agent, created_at";

    /// `messages` table in Postgres.
    #[derive(Clone)]
    pub struct PgMessageStore {
        pool: Pool<Postgres>,
    }

    impl PgMessageStore {
        pub fn new(pool: Pool<Postgres>) -> Self {
            Self { pool }
        }
    }

    #[async_trait]
    impl MessageStore for PgMessageStore {
        async fn append(&self, new: NewMessage) -> StoreResult<Message> {
            let sql = format!(
                "INSERT INTO messages (author, content, source_ip, user_agent) VALUES ($1,$2,$3,$4) RETURNING {MESSAGE_COLUMNS}"
            );
            let rec = sqlx::query_as::<_, Message>(&sql)
                .bind(&new.author)
                .bind(&new.text)
                .bind(&new.source_ip)
                .bind(&new.user_agent)
                .fetch_one(&self.pool)
                .await?;
            Ok(rec)
        }

        async fn read_recent(&self, limit: usize) -> StoreResult<Vec<Message>> {
            let sql = format!(
                "SELECT {MESSAGE_COLUMNS} FROM messages ORDER BY created_at DESC, id DESC LIMIT $1"
            );
            let recs = sqlx::query_as::<_, Message>(&sql)
                .bind(i64::try_from(limit).unwrap_or(i64::MAX))
                .fetch_all(&self.pool)
                .await?;
            Ok(recs)
        }

        async fn ping(&self) -> StoreResult<()> {
            sqlx::query("SELECT 1").execute(&self.pool).await?;
            Ok(())
        }
    }
}
