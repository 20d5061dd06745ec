//! Audit Log
//!
//! Append-only, hash-chained audit trail stored next to the ledger. Appends
//! run inside the caller's transaction so an entry commits together with the
//! change it describes.

use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqliteConnection, SqlitePool};
use tracing::debug;

use crate::audit::entry::{AuditAction, AuditEntry, NewAuditEntry, GENESIS_HASH};
use crate::error::LedgerError;
use crate::ledger::ids::{IdAllocator, Sequence};

const SELECT_ENTRIES: &str = r#"
    SELECT id, diagnosis_id, action, timestamp, actor, details,
           compliance_flags, previous_hash, entry_hash
    FROM audit_entries
"#;

/// Optional constraints for `list_filtered`. All set fields must match.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditFilter {
    pub diagnosis_id: Option<u64>,
    pub action: Option<AuditAction>,
    pub actor: Option<String>,
    /// Inclusive lower bound, ns since epoch.
    pub since: Option<u64>,
    /// Inclusive upper bound, ns since epoch.
    pub until: Option<u64>,
}

#[derive(Clone)]
pub struct AuditLog {
    pool: SqlitePool,
    allocator: IdAllocator,
}

impl AuditLog {
    pub fn new(pool: SqlitePool, allocator: IdAllocator) -> Self {
        Self { pool, allocator }
    }

    /// Append an entry on `conn`, which should carry an open transaction.
    /// The log assigns the id from its own sequence and links the entry to
    /// the current head of the chain.
    pub async fn append(
        &self,
        conn: &mut SqliteConnection,
        entry: NewAuditEntry,
    ) -> Result<AuditEntry, LedgerError> {
        // Write before reading the chain head: a deferred transaction that
        // reads first holds a snapshot that SQLite refuses to upgrade once
        // another connection has committed (SQLITE_BUSY_SNAPSHOT).
        let id = self.allocator.next_id(&mut *conn, Sequence::AuditEntry).await?;

        let previous_hash: Option<String> =
            sqlx::query_scalar("SELECT entry_hash FROM audit_entries ORDER BY id DESC LIMIT 1")
                .fetch_optional(&mut *conn)
                .await?;
        let previous_hash = previous_hash.unwrap_or_else(|| GENESIS_HASH.to_string());

        let sealed = AuditEntry::seal(id, entry, previous_hash);

        sqlx::query(
            r#"
            INSERT INTO audit_entries
            (id, diagnosis_id, action, timestamp, actor, details, compliance_flags, previous_hash, entry_hash)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(sealed.id as i64)
        .bind(sealed.diagnosis_id as i64)
        .bind(sealed.action.as_str())
        .bind(sealed.timestamp as i64)
        .bind(&sealed.actor)
        .bind(&sealed.details)
        .bind(serde_json::to_string(&sealed.compliance_flags)?)
        .bind(&sealed.previous_hash)
        .bind(&sealed.entry_hash)
        .execute(&mut *conn)
        .await
        .map_err(|e| LedgerError::StorageFailure(format!("Failed to append audit entry: {}", e)))?;

        debug!("Appended audit entry: {}", sealed.summary());
        Ok(sealed)
    }

    pub async fn list_all(&self) -> Result<Vec<AuditEntry>, LedgerError> {
        self.list_filtered(&AuditFilter::default()).await
    }

    /// Entries for one diagnosis, in global order.
    pub async fn list_for(&self, diagnosis_id: u64) -> Result<Vec<AuditEntry>, LedgerError> {
        self.list_filtered(&AuditFilter {
            diagnosis_id: Some(diagnosis_id),
            ..AuditFilter::default()
        })
        .await
    }

    pub async fn list_filtered(&self, filter: &AuditFilter) -> Result<Vec<AuditEntry>, LedgerError> {
        let mut query: QueryBuilder<Sqlite> = QueryBuilder::new(SELECT_ENTRIES);
        query.push(" WHERE 1 = 1");

        if let Some(diagnosis_id) = filter.diagnosis_id {
            query.push(" AND diagnosis_id = ").push_bind(to_sql_integer(diagnosis_id));
        }
        if let Some(action) = filter.action {
            query.push(" AND action = ").push_bind(action.as_str());
        }
        if let Some(actor) = &filter.actor {
            query.push(" AND actor = ").push_bind(actor.clone());
        }
        if let Some(since) = filter.since {
            query.push(" AND timestamp >= ").push_bind(to_sql_integer(since));
        }
        if let Some(until) = filter.until {
            query.push(" AND timestamp <= ").push_bind(to_sql_integer(until));
        }
        query.push(" ORDER BY id ASC");

        let rows = query.build().fetch_all(&self.pool).await?;
        rows.iter().map(entry_from_row).collect()
    }

    pub async fn count(&self) -> Result<u64, LedgerError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM audit_entries")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }
}

/// SQLite integers are signed; bounds past `i64::MAX` match nothing stored.
fn to_sql_integer(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn entry_from_row(row: &SqliteRow) -> Result<AuditEntry, LedgerError> {
    let action: String = row.try_get("action")?;
    let flags: String = row.try_get("compliance_flags")?;
    Ok(AuditEntry {
        id: row.try_get::<i64, _>("id")? as u64,
        diagnosis_id: row.try_get::<i64, _>("diagnosis_id")? as u64,
        action: action.parse().map_err(LedgerError::StorageFailure)?,
        timestamp: row.try_get::<i64, _>("timestamp")? as u64,
        actor: row.try_get("actor")?,
        details: row.try_get("details")?,
        compliance_flags: serde_json::from_str(&flags)?,
        previous_hash: row.try_get("previous_hash")?,
        entry_hash: row.try_get("entry_hash")?,
    })
}
