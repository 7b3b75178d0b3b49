// Copyright (C) 2025 Permiso Digital
// SPDX-License-Identifier: AGPL-3.0-or-later
//! PostgreSQL-backed folio store.
//!
//! Provides durable storage for permit records and their draft projections.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::debug;

use super::{FolioStore, PermitRecord};
use crate::error::CoreError;
use crate::model::PermitStatus;

/// PostgreSQL-backed persistence implementation.
#[derive(Clone)]
pub struct PostgresFolioStore {
    pool: PgPool,
}

impl PostgresFolioStore {
    /// Create a new Postgres-backed folio store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const PERMIT_COLUMNS: &str = "folio, entidad, marca, linea, anio, numero_serie, numero_motor, \
     color, contribuyente, fecha_expedicion, fecha_vencimiento, estado, user_id, username, \
     fecha_comprobante, fecha_validacion_admin";

/// Bind every record column in declaration order.
macro_rules! bind_record {
    ($query:expr, $record:expr) => {
        $query
            .bind(&$record.folio)
            .bind(&$record.entidad)
            .bind(&$record.marca)
            .bind(&$record.linea)
            .bind(&$record.anio)
            .bind(&$record.numero_serie)
            .bind(&$record.numero_motor)
            .bind(&$record.color)
            .bind(&$record.contribuyente)
            .bind($record.fecha_expedicion)
            .bind($record.fecha_vencimiento)
            .bind(&$record.estado)
            .bind($record.user_id)
            .bind(&$record.username)
            .bind($record.fecha_comprobante)
            .bind($record.fecha_validacion_admin)
    };
}

/// Build the status-update query for a table, stamping the matching
/// transition timestamp column.
fn status_update_sql(table: &str, status: PermitStatus) -> String {
    match status {
        PermitStatus::ProofSubmitted => format!(
            "UPDATE {table} SET estado = $2, fecha_comprobante = $3 WHERE folio = $1"
        ),
        PermitStatus::AdminValidated => format!(
            "UPDATE {table} SET estado = $2, fecha_validacion_admin = $3 WHERE folio = $1"
        ),
        PermitStatus::Pending => format!("UPDATE {table} SET estado = $2 WHERE folio = $1"),
    }
}

impl PostgresFolioStore {
    async fn set_status(
        &self,
        table: &str,
        folio: &str,
        status: PermitStatus,
        at: DateTime<Utc>,
    ) -> Result<(), CoreError> {
        let sql = status_update_sql(table, status);
        let query = sqlx::query(&sql).bind(folio).bind(status.as_str());
        let query = match status {
            PermitStatus::Pending => query,
            _ => query.bind(at),
        };
        let result = query.execute(&self.pool).await?;

        // A missing row is tolerated: the record may already be past its
        // window, and transitions are applied defensively.
        if result.rows_affected() == 0 {
            debug!(folio, table, status = status.as_str(), "status update matched no rows");
        }

        Ok(())
    }

    async fn delete_row(&self, table: &str, folio: &str) -> Result<(), CoreError> {
        let sql = format!("DELETE FROM {table} WHERE folio = $1");
        sqlx::query(&sql).bind(folio).execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl FolioStore for PostgresFolioStore {
    async fn insert_permit(&self, record: &PermitRecord) -> Result<(), CoreError> {
        let sql = format!(
            "INSERT INTO folios_registrados ({PERMIT_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)"
        );
        bind_record!(sqlx::query(&sql), record)
            .execute(&self.pool)
            .await
            .map_err(|e| match CoreError::from(e) {
                CoreError::FolioAlreadyExists { .. } => CoreError::FolioAlreadyExists {
                    folio: record.folio.clone(),
                },
                other => other,
            })?;
        Ok(())
    }

    async fn upsert_draft(&self, record: &PermitRecord) -> Result<(), CoreError> {
        let sql = format!(
            "INSERT INTO borradores_registros ({PERMIT_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16) \
             ON CONFLICT (folio) DO UPDATE \
             SET estado = EXCLUDED.estado, \
                 fecha_comprobante = EXCLUDED.fecha_comprobante, \
                 fecha_validacion_admin = EXCLUDED.fecha_validacion_admin"
        );
        bind_record!(sqlx::query(&sql), record)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn get_permit(&self, folio: &str) -> Result<Option<PermitRecord>, CoreError> {
        let sql = format!("SELECT {PERMIT_COLUMNS} FROM folios_registrados WHERE folio = $1");
        let record = sqlx::query_as::<_, PermitRecord>(&sql)
            .bind(folio)
            .fetch_optional(&self.pool)
            .await?;
        Ok(record)
    }

    async fn list_folios(&self, entidad: &str, prefix: &str) -> Result<Vec<String>, CoreError> {
        let folios = sqlx::query_scalar::<_, String>(
            r#"
            SELECT folio FROM folios_registrados
            WHERE entidad = $1 AND folio LIKE $2
            "#,
        )
        .bind(entidad)
        .bind(format!("{prefix}%"))
        .fetch_all(&self.pool)
        .await?;
        Ok(folios)
    }

    async fn set_permit_status(
        &self,
        folio: &str,
        status: PermitStatus,
        at: DateTime<Utc>,
    ) -> Result<(), CoreError> {
        self.set_status("folios_registrados", folio, status, at).await
    }

    async fn set_draft_status(
        &self,
        folio: &str,
        status: PermitStatus,
        at: DateTime<Utc>,
    ) -> Result<(), CoreError> {
        self.set_status("borradores_registros", folio, status, at).await
    }

    async fn delete_permit(&self, folio: &str) -> Result<(), CoreError> {
        self.delete_row("folios_registrados", folio).await
    }

    async fn delete_draft(&self, folio: &str) -> Result<(), CoreError> {
        self.delete_row("borradores_registros", folio).await
    }

    async fn health_check(&self) -> Result<bool, CoreError> {
        let row: (i32,) = sqlx::query_as("SELECT 1").fetch_one(&self.pool).await?;
        Ok(row.0 == 1)
    }
}
