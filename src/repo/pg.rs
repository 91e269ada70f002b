#![cfg(feature = "db")]

use anyhow::{bail, Result};
use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, types::Json, PgPool, Row};

use super::{ComplianceStore, PersistenceError, StoredRecord, StoredViolation};
use crate::domain::{ComplianceRecord, ComplianceStatus};

/// Result table in Postgres, one row per grid id
pub struct PgComplianceStore {
    pool: PgPool,
    upsert_sql: String,
    select_sql: String,
}

impl PgComplianceStore {
    pub async fn connect(url: &str, table: &str) -> Result<Self> {
        if table.is_empty() || !table.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            bail!("invalid result table name: {table:?}");
        }

        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(url)
            .await?;

        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS "{table}" (
                grid_id TEXT PRIMARY KEY,
                timestamp TEXT NOT NULL,
                status TEXT NOT NULL,
                compliance_standard TEXT NOT NULL,
                violations JSONB NOT NULL,
                processed_by TEXT NOT NULL
            )
            "#
        ))
        .execute(&pool)
        .await?;

        Ok(Self {
            pool,
            upsert_sql: format!(
                r#"
                INSERT INTO "{table}" (grid_id, timestamp, status, compliance_standard, violations, processed_by)
                VALUES ($1, $2, $3, $4, $5, $6)
                ON CONFLICT (grid_id) DO UPDATE SET
                    timestamp = EXCLUDED.timestamp,
                    status = EXCLUDED.status,
                    compliance_standard = EXCLUDED.compliance_standard,
                    violations = EXCLUDED.violations,
                    processed_by = EXCLUDED.processed_by
                "#
            ),
            select_sql: format!(
                r#"
                SELECT grid_id, timestamp, status, compliance_standard, violations, processed_by
                FROM "{table}"
                WHERE grid_id = $1
                "#
            ),
        })
    }
}

#[async_trait]
impl ComplianceStore for PgComplianceStore {
    async fn put(&self, record: &ComplianceRecord) -> Result<(), PersistenceError> {
        let stored = StoredRecord::from(record);
        sqlx::query(&self.upsert_sql)
            .bind(&stored.grid_id)
            .bind(&stored.timestamp)
            .bind(stored.status.as_ref())
            .bind(&stored.compliance_standard)
            .bind(Json(&stored.violations))
            .bind(&stored.processed_by)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn get(&self, grid_id: &str) -> Result<Option<StoredRecord>, PersistenceError> {
        let Some(row) = sqlx::query(&self.select_sql)
            .bind(grid_id)
            .fetch_optional(&self.pool)
            .await?
        else {
            return Ok(None);
        };

        let status: String = row.try_get("status")?;
        let status: ComplianceStatus = status
            .parse()
            .map_err(|_| PersistenceError::Unavailable(format!("unknown status {status:?}")))?;
        let Json(violations): Json<Vec<StoredViolation>> = row.try_get("violations")?;

        Ok(Some(StoredRecord {
            grid_id: row.try_get("grid_id")?,
            timestamp: row.try_get("timestamp")?,
            status,
            compliance_standard: row.try_get("compliance_standard")?,
            violations,
            processed_by: row.try_get("processed_by")?,
        }))
    }

    async fn ping(&self) -> Result<(), PersistenceError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "postgres"
    }
}
