// Copyright (C) 2025 Permiso Digital
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Persistence interfaces and backends for permiso-core.
//!
//! The store holds two logical tables keyed by folio: `folios_registrados`
//! (the issued-permit records served to read-only consumers) and
//! `borradores_registros` (the draft projection kept for back-office tooling).
//! The lifecycle controller writes both; expiry deletes from both.

pub mod memory;
pub mod postgres;

pub use self::memory::MemoryFolioStore;
pub use self::postgres::PostgresFolioStore;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use crate::error::CoreError;
use crate::model::PermitStatus;

/// Folio record from the persistence layer.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PermitRecord {
    /// Unique folio, fixed numeric prefix plus decimal suffix.
    pub folio: String,
    /// Jurisdiction code, set at creation.
    pub entidad: String,
    /// Vehicle make.
    pub marca: String,
    /// Vehicle line/model.
    pub linea: String,
    /// Model year.
    pub anio: String,
    /// Vehicle identification (serial) number.
    pub numero_serie: String,
    /// Engine number.
    pub numero_motor: String,
    /// Vehicle color.
    pub color: String,
    /// Full name of the permit holder.
    pub contribuyente: String,
    /// Issue date in the configured timezone.
    pub fecha_expedicion: NaiveDate,
    /// End of the legal validity window (never mutated after creation).
    pub fecha_vencimiento: NaiveDate,
    /// Current status (PENDIENTE, COMPROBANTE_ENVIADO, VALIDADO_ADMIN).
    pub estado: String,
    /// Identifier of the requesting user.
    pub user_id: i64,
    /// Requester's handle, if any.
    pub username: Option<String>,
    /// When a payment proof was received.
    pub fecha_comprobante: Option<DateTime<Utc>>,
    /// When an operator validated the folio manually.
    pub fecha_validacion_admin: Option<DateTime<Utc>>,
}

impl PermitRecord {
    /// Typed view of the stored status string.
    pub fn status(&self) -> Option<PermitStatus> {
        PermitStatus::parse(&self.estado)
    }
}

/// Record store gateway used by the lifecycle controller.
///
/// Status updates and deletes tolerate an absent folio: the record may have
/// been removed by a racing expiry, and callers apply them defensively.
/// The store enforces folio uniqueness as the backstop against duplicate
/// issuance under concurrent callers; a duplicate insert surfaces as
/// [`CoreError::FolioAlreadyExists`].
#[async_trait]
pub trait FolioStore: Send + Sync {
    /// Insert a freshly issued permit record.
    async fn insert_permit(&self, record: &PermitRecord) -> Result<(), CoreError>;

    /// Insert or replace the draft projection of a record.
    async fn upsert_draft(&self, record: &PermitRecord) -> Result<(), CoreError>;

    /// Fetch a permit record by folio.
    async fn get_permit(&self, folio: &str) -> Result<Option<PermitRecord>, CoreError>;

    /// List all folios under `prefix` for the given jurisdiction.
    async fn list_folios(&self, entidad: &str, prefix: &str) -> Result<Vec<String>, CoreError>;

    /// Update a permit's status, stamping the transition timestamp.
    async fn set_permit_status(
        &self,
        folio: &str,
        status: PermitStatus,
        at: DateTime<Utc>,
    ) -> Result<(), CoreError>;

    /// Update a draft's status, stamping the transition timestamp.
    async fn set_draft_status(
        &self,
        folio: &str,
        status: PermitStatus,
        at: DateTime<Utc>,
    ) -> Result<(), CoreError>;

    /// Delete a permit record. Deleting an absent folio is a no-op.
    async fn delete_permit(&self, folio: &str) -> Result<(), CoreError>;

    /// Delete a draft record. Deleting an absent folio is a no-op.
    async fn delete_draft(&self, folio: &str) -> Result<(), CoreError>;

    /// Probe the backing storage.
    async fn health_check(&self) -> Result<bool, CoreError>;
}
