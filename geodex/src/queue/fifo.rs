use async_trait::async_trait;
use chrono::Utc;
use libsql::params;
use uuid::Uuid;

use crate::config::QueueConfig;
use crate::db::Database;
use crate::error::{GeodexError, Result};

use super::{BatchSendOutcome, FailedEntry, MessageQueue, QueueEntry, QueueMessage, MAX_BATCH_SIZE};

/// Durable FIFO queue in two libsql tables.
///
/// `queue_messages.seq` (autoincrement) fixes the global enqueue order;
/// `invisible_until` (epoch millis) doubles as the in-flight marker and
/// the redelivery clock. `queue_dedup` remembers dedup ids for the
/// configured window, surviving ack of the original message.
#[derive(Clone)]
pub struct LibSqlQueue {
    db: Database,
    visibility_timeout_ms: i64,
    dedup_window_ms: i64,
}

impl LibSqlQueue {
    pub async fn new(db: Database, config: &QueueConfig) -> Result<Self> {
        let queue = Self {
            db,
            visibility_timeout_ms: config.visibility_timeout_secs as i64 * 1000,
            dedup_window_ms: config.dedup_window_secs as i64 * 1000,
        };
        queue.init_schema().await?;
        Ok(queue)
    }

    async fn init_schema(&self) -> Result<()> {
        let conn = self.db.connect()?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS queue_messages (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                message_id TEXT NOT NULL UNIQUE,
                group_id TEXT NOT NULL,
                dedup_id TEXT NOT NULL,
                body TEXT NOT NULL,
                enqueued_at TEXT NOT NULL,
                invisible_until INTEGER,
                receive_count INTEGER NOT NULL DEFAULT 0
            );

            CREATE INDEX IF NOT EXISTS idx_queue_messages_group
                ON queue_messages(group_id);

            CREATE TABLE IF NOT EXISTS queue_dedup (
                dedup_id TEXT PRIMARY KEY,
                expires_at INTEGER NOT NULL
            );
            "#,
        )
        .await?;
        Ok(())
    }

    fn now_ms() -> i64 {
        Utc::now().timestamp_millis()
    }
}

#[async_trait]
impl MessageQueue for LibSqlQueue {
    async fn send(&self, entry: &QueueEntry) -> Result<String> {
        let now = Self::now_ms();
        let message_id = Uuid::new_v4().to_string();

        let conn = self.db.connect()?;
        let tx = conn.transaction().await?;

        tx.execute(
            "DELETE FROM queue_dedup WHERE expires_at <= ?1",
            params![now],
        )
        .await?;

        let claimed = tx
            .execute(
                "INSERT OR IGNORE INTO queue_dedup (dedup_id, expires_at) VALUES (?1, ?2)",
                params![entry.dedup_id.clone(), now + self.dedup_window_ms],
            )
            .await?;

        if claimed == 0 {
            // Duplicate within the dedup window: accepted, not enqueued
            tx.commit().await?;
            tracing::debug!(dedup_id = %entry.dedup_id, "Deduplicated queue send");
            return Ok(message_id);
        }

        tx.execute(
            r#"
            INSERT INTO queue_messages (message_id, group_id, dedup_id, body, enqueued_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                message_id.clone(),
                entry.group_id.clone(),
                entry.dedup_id.clone(),
                entry.body.clone(),
                Utc::now().to_rfc3339(),
            ],
        )
        .await?;

        tx.commit().await?;
        Ok(message_id)
    }

    async fn send_batch(&self, entries: &[QueueEntry]) -> Result<BatchSendOutcome> {
        if entries.len() > MAX_BATCH_SIZE {
            return Err(GeodexError::Queue(format!(
                "Batch of {} exceeds the maximum of {MAX_BATCH_SIZE}",
                entries.len()
            )));
        }

        let mut outcome = BatchSendOutcome::default();
        for entry in entries {
            match self.send(entry).await {
                Ok(_) => outcome.successful.push(entry.id.clone()),
                Err(e) => outcome.failed.push(FailedEntry {
                    id: entry.id.clone(),
                    message: e.to_string(),
                }),
            }
        }
        Ok(outcome)
    }

    async fn receive(&self, max_messages: u32) -> Result<Vec<QueueMessage>> {
        let now = Self::now_ms();
        let conn = self.db.connect()?;
        let tx = conn.transaction().await?;

        // Head of each group, for groups with nothing in flight. One
        // message per group per receive preserves strict group order.
        let mut rows = tx
            .query(
                r#"
                SELECT m.message_id, m.group_id, m.body, m.receive_count
                FROM queue_messages m
                WHERE m.seq = (
                        SELECT MIN(m2.seq) FROM queue_messages m2
                        WHERE m2.group_id = m.group_id
                    )
                  AND (m.invisible_until IS NULL OR m.invisible_until <= ?1)
                  AND NOT EXISTS (
                        SELECT 1 FROM queue_messages f
                        WHERE f.group_id = m.group_id
                          AND f.invisible_until IS NOT NULL
                          AND f.invisible_until > ?1
                    )
                ORDER BY m.seq
                LIMIT ?2
                "#,
                params![now, max_messages],
            )
            .await?;

        let mut messages = Vec::new();
        while let Some(row) = rows.next().await? {
            messages.push(QueueMessage {
                message_id: row.get(0)?,
                group_id: row.get(1)?,
                body: row.get(2)?,
                receive_count: row.get::<i64>(3)? as u64 + 1,
            });
        }

        for message in &messages {
            tx.execute(
                r#"
                UPDATE queue_messages
                SET invisible_until = ?2, receive_count = receive_count + 1
                WHERE message_id = ?1
                "#,
                params![
                    message.message_id.clone(),
                    now + self.visibility_timeout_ms
                ],
            )
            .await?;
        }

        tx.commit().await?;
        Ok(messages)
    }

    async fn ack(&self, message_id: &str) -> Result<()> {
        let conn = self.db.connect()?;
        conn.execute(
            "DELETE FROM queue_messages WHERE message_id = ?1",
            params![message_id],
        )
        .await?;
        Ok(())
    }
}
