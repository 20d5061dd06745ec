//! Persisted identifier sequences
//!
//! Each sequence lives in one row of `id_sequences`, so allocation is a single
//! atomic statement and the counter survives restarts.

use sqlx::SqliteExecutor;
use tracing::trace;

use crate::error::LedgerError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sequence {
    Diagnosis,
    AuditEntry,
}

impl Sequence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sequence::Diagnosis => "diagnosis",
            Sequence::AuditEntry => "audit_entry",
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct IdAllocator;

impl IdAllocator {
    pub fn new() -> Self {
        Self
    }

    /// Hand out the next id of `sequence`. Ids start at 1 and are never
    /// returned twice, even when the caller later abandons the id.
    ///
    /// # Panics
    ///
    /// Panics when the sequence reaches the largest storable integer. There
    /// is no recovery from id-space exhaustion.
    pub async fn next_id<'e, E>(&self, executor: E, sequence: Sequence) -> Result<u64, LedgerError>
    where
        E: SqliteExecutor<'e>,
    {
        let allocated: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE id_sequences
            SET next_value = next_value + 1
            WHERE name = ? AND next_value < 9223372036854775807
            RETURNING next_value - 1
            "#,
        )
        .bind(sequence.as_str())
        .fetch_optional(executor)
        .await?;

        match allocated {
            Some(id) if id >= 1 => {
                trace!("Allocated {} id {}", sequence.as_str(), id);
                Ok(id as u64)
            }
            _ => panic!("{} id space exhausted", sequence.as_str()),
        }
    }

    /// The id the next call to `next_id` would return, without consuming it.
    #[cfg(test)]
    pub async fn peek<'e, E>(&self, executor: E, sequence: Sequence) -> Result<u64, LedgerError>
    where
        E: SqliteExecutor<'e>,
    {
        let next: i64 = sqlx::query_scalar("SELECT next_value FROM id_sequences WHERE name = ?")
            .bind(sequence.as_str())
            .fetch_one(executor)
            .await?;
        Ok(next as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::Database;

    async fn setup() -> Database {
        let db = Database::new_in_memory().await.unwrap();
        db.run_migrations().await.unwrap();
        db
    }

    #[tokio::test]
    async fn test_ids_start_at_one_and_increase() {
        let db = setup().await;
        let allocator = IdAllocator::new();

        let mut previous = 0;
        for expected in 1..=5 {
            let id = allocator.next_id(db.pool(), Sequence::Diagnosis).await.unwrap();
            assert_eq!(id, expected);
            assert!(id > previous);
            previous = id;
        }
    }

    #[tokio::test]
    async fn test_sequences_are_independent() {
        let db = setup().await;
        let allocator = IdAllocator::new();

        allocator.next_id(db.pool(), Sequence::Diagnosis).await.unwrap();
        allocator.next_id(db.pool(), Sequence::Diagnosis).await.unwrap();
        let audit_id = allocator.next_id(db.pool(), Sequence::AuditEntry).await.unwrap();

        assert_eq!(audit_id, 1);
        assert_eq!(allocator.peek(db.pool(), Sequence::Diagnosis).await.unwrap(), 3);
    }

    #[tokio::test]
    #[should_panic(expected = "id space exhausted")]
    async fn test_exhaustion_is_fatal() {
        let db = setup().await;
        sqlx::query("UPDATE id_sequences SET next_value = 9223372036854775807 WHERE name = 'diagnosis'")
            .execute(db.pool())
            .await
            .unwrap();

        let _ = IdAllocator::new().next_id(db.pool(), Sequence::Diagnosis).await;
    }
}
