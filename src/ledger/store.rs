//! Ledger Store
//!
//! Insert-only mapping from diagnosis id to signed record.

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteExecutor, SqlitePool};
use tracing::debug;

use super::types::{ComplianceFlags, DiagnosticRecord};
use crate::error::LedgerError;

#[derive(Clone)]
pub struct LedgerStore {
    pool: SqlitePool,
}

impl LedgerStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a record inside the caller's transaction.
    ///
    /// # Panics
    ///
    /// Panics if a record with the same id already exists. Ids are assigned
    /// exactly once by the ledger service, so a duplicate is a bug.
    pub async fn insert<'e, E>(&self, executor: E, record: &DiagnosticRecord) -> Result<(), LedgerError>
    where
        E: SqliteExecutor<'e>,
    {
        let content = serde_json::to_string(&record.content)?;

        let result = sqlx::query(
            r#"
            INSERT INTO diagnoses
            (id, content, created_at, signature, public_key, fda_compliant, hipaa_compliant)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(record.id as i64)
        .bind(content)
        .bind(record.created_at as i64)
        .bind(&record.signature)
        .bind(&record.public_key)
        .bind(record.compliance_flags.fda_compliant)
        .bind(record.compliance_flags.hipaa_compliant)
        .execute(executor)
        .await;

        match result {
            Ok(_) => {
                debug!("Inserted diagnosis {}", record.id);
                Ok(())
            }
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                panic!("diagnosis id {} inserted twice", record.id)
            }
            Err(e) => Err(LedgerError::StorageFailure(format!(
                "Failed to insert diagnosis {}: {}",
                record.id, e
            ))),
        }
    }

    pub async fn get(&self, id: u64) -> Result<Option<DiagnosticRecord>, LedgerError> {
        let row = sqlx::query(
            r#"
            SELECT id, content, created_at, signature, public_key, fda_compliant, hipaa_compliant
            FROM diagnoses
            WHERE id = ?
            "#,
        )
        .bind(id as i64)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| record_from_row(&row)).transpose()
    }

    pub async fn list_all(&self) -> Result<Vec<DiagnosticRecord>, LedgerError> {
        let rows = sqlx::query(
            r#"
            SELECT id, content, created_at, signature, public_key, fda_compliant, hipaa_compliant
            FROM diagnoses
            ORDER BY id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(record_from_row).collect()
    }

    pub async fn count(&self) -> Result<u64, LedgerError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM diagnoses")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }
}

fn record_from_row(row: &SqliteRow) -> Result<DiagnosticRecord, LedgerError> {
    let content: String = row.try_get("content")?;
    Ok(DiagnosticRecord {
        id: row.try_get::<i64, _>("id")? as u64,
        content: serde_json::from_str(&content)?,
        created_at: row.try_get::<i64, _>("created_at")? as u64,
        signature: row.try_get("signature")?,
        public_key: row.try_get("public_key")?,
        compliance_flags: ComplianceFlags {
            fda_compliant: row.try_get("fda_compliant")?,
            hipaa_compliant: row.try_get("hipaa_compliant")?,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::Database;
    use crate::ledger::types::{DiagnosisContent, PatientMetadata};

    fn record(id: u64) -> DiagnosticRecord {
        DiagnosticRecord {
            id,
            content: DiagnosisContent {
                diagnosis: format!("Finding {}", id),
                findings: vec![],
                confidence_score: 0.5,
                model_version: "test-model".to_string(),
                patient: PatientMetadata {
                    anonymized_id: format!("ANON-{}", id),
                    age_range: "40-50".to_string(),
                    study_type: "CT".to_string(),
                    acquisition_date: "2024-01-01".to_string(),
                },
            },
            created_at: 1_700_000_000_000_000_000 + id,
            signature: vec![1; 64],
            public_key: vec![2; 33],
            compliance_flags: ComplianceFlags {
                fda_compliant: true,
                hipaa_compliant: false,
            },
        }
    }

    async fn setup() -> LedgerStore {
        let db = Database::new_in_memory().await.unwrap();
        db.run_migrations().await.unwrap();
        LedgerStore::new(db.pool().clone())
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let store = setup().await;
        let original = record(1);
        store.insert(&store.pool, &original).await.unwrap();

        let fetched = store.get(1).await.unwrap().unwrap();
        assert_eq!(fetched, original);
        assert!(store.get(2).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_all_orders_by_id() {
        let store = setup().await;
        for id in [3, 1, 2] {
            store.insert(&store.pool, &record(id)).await.unwrap();
        }

        let ids: Vec<u64> = store.list_all().await.unwrap().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(store.count().await.unwrap(), 3);
    }

    #[tokio::test]
    #[should_panic(expected = "inserted twice")]
    async fn test_duplicate_insert_panics() {
        let store = setup().await;
        store.insert(&store.pool, &record(1)).await.unwrap();
        let _ = store.insert(&store.pool, &record(1)).await;
    }

    #[tokio::test]
    async fn test_records_cannot_be_updated() {
        let store = setup().await;
        store.insert(&store.pool, &record(1)).await.unwrap();

        let result = sqlx::query("UPDATE diagnoses SET content = '{}' WHERE id = 1")
            .execute(&store.pool)
            .await;
        assert!(result.is_err());
    }
}
