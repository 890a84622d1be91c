use async_trait::async_trait;
use chrono::{DateTime, Utc};
use event_bus::EventId;
use sqlx::{PgPool, Postgres, Row, Transaction, postgres::PgRow};
use uuid::Uuid;

use crate::dead_letter::{DeadLetter, DeadLetterStore};
use crate::record::OutboxRecord;
use crate::store::{OutboxStore, RecordStream};
use crate::{OutboxError, Result};

/// PostgreSQL-backed outbox.
///
/// Writes join the caller's own transaction via [`append`](Self::append),
/// which is what makes the state change and its outbox row atomic. The
/// relay-facing reads and acknowledgments run on the pool.
#[derive(Clone)]
pub struct PostgresOutbox {
    pool: PgPool,
}

impl PostgresOutbox {
    /// Creates a new PostgreSQL outbox.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    /// Inserts a record inside the caller's transaction.
    ///
    /// The caller commits its state change and this insert together; if the
    /// transaction rolls back, neither persists.
    pub async fn append(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        record: &OutboxRecord,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO outbox (id, event_type, payload, created_at, published, published_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(record.id.as_uuid())
        .bind(&record.event_type)
        .bind(&record.payload)
        .bind(record.created_at)
        .bind(record.published)
        .bind(record.published_at)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    fn row_to_record(row: PgRow) -> Result<OutboxRecord> {
        Ok(OutboxRecord {
            id: EventId::from_uuid(row.try_get::<Uuid, _>("id")?),
            event_type: row.try_get("event_type")?,
            payload: row.try_get("payload")?,
            created_at: row.try_get("created_at")?,
            published: row.try_get("published")?,
            published_at: row.try_get("published_at")?,
        })
    }
}

#[async_trait]
impl OutboxStore for PostgresOutbox {
    async fn fetch_unpublished(&self, limit: usize) -> Result<Vec<OutboxRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT id, event_type, payload, created_at, published, published_at
            FROM outbox
            WHERE published = FALSE
            ORDER BY created_at ASC
            LIMIT $1
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_record).collect()
    }

    async fn mark_published(&self, id: EventId) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE outbox
            SET published = TRUE, published_at = $2
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(OutboxError::RecordNotFound(id));
        }
        Ok(())
    }

    async fn pending_count(&self) -> Result<usize> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM outbox WHERE published = FALSE")
                .fetch_one(&self.pool)
                .await?;
        Ok(count as usize)
    }

    async fn stream_records(&self) -> Result<RecordStream> {
        let rows = sqlx::query(
            r#"
            SELECT id, event_type, payload, created_at, published, published_at
            FROM outbox
            ORDER BY created_at ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let records: Vec<_> = rows.into_iter().map(Self::row_to_record).collect();
        Ok(Box::pin(futures_util::stream::iter(records)))
    }
}

/// PostgreSQL-backed dead-letter store.
#[derive(Clone)]
pub struct PostgresDeadLetterStore {
    pool: PgPool,
}

impl PostgresDeadLetterStore {
    /// Creates a new PostgreSQL dead-letter store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_letter(row: PgRow) -> Result<DeadLetter> {
        Ok(DeadLetter {
            record: OutboxRecord {
                id: EventId::from_uuid(row.try_get::<Uuid, _>("record_id")?),
                event_type: row.try_get("event_type")?,
                payload: row.try_get("payload")?,
                created_at: row.try_get("record_created_at")?,
                published: true,
                published_at: None,
            },
            reason: row.try_get("reason")?,
            failed_at: row.try_get::<DateTime<Utc>, _>("failed_at")?,
        })
    }
}

#[async_trait]
impl DeadLetterStore for PostgresDeadLetterStore {
    async fn push(&self, letter: DeadLetter) -> Result<()> {
        tracing::warn!(
            event_id = %letter.record.id,
            event_type = %letter.record.event_type,
            reason = %letter.reason,
            "record dead-lettered"
        );

        sqlx::query(
            r#"
            INSERT INTO dead_letters (record_id, event_type, payload, record_created_at, reason, failed_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(letter.record.id.as_uuid())
        .bind(&letter.record.event_type)
        .bind(&letter.record.payload)
        .bind(letter.record.created_at)
        .bind(&letter.reason)
        .bind(letter.failed_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn all(&self) -> Result<Vec<DeadLetter>> {
        let rows = sqlx::query(
            r#"
            SELECT record_id, event_type, payload, record_created_at, reason, failed_at
            FROM dead_letters
            ORDER BY failed_at ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_letter).collect()
    }

    async fn len(&self) -> Result<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM dead_letters")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as usize)
    }
}
