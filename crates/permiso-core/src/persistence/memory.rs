// Copyright (C) 2025 Permiso Digital
// SPDX-License-Identifier: AGPL-3.0-or-later
//! In-memory folio store.
//!
//! Backs the test suite and local development without a database. Behavior
//! mirrors the Postgres backend: folio uniqueness is enforced on insert,
//! status updates and deletes tolerate absent folios.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{FolioStore, PermitRecord};
use crate::error::CoreError;
use crate::model::PermitStatus;

/// In-memory persistence implementation.
#[derive(Default)]
pub struct MemoryFolioStore {
    inner: Mutex<Tables>,
}

#[derive(Default)]
struct Tables {
    permits: BTreeMap<String, PermitRecord>,
    drafts: BTreeMap<String, PermitRecord>,
}

impl MemoryFolioStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    // A poisoned lock only means a writer panicked mid-mutation; the maps
    // themselves stay usable.
    fn tables(&self) -> std::sync::MutexGuard<'_, Tables> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Fetch the draft projection of a folio, for test assertions.
    pub fn get_draft(&self, folio: &str) -> Option<PermitRecord> {
        self.tables().drafts.get(folio).cloned()
    }

    /// Number of permit records currently stored.
    pub fn permit_count(&self) -> usize {
        self.tables().permits.len()
    }
}

fn apply_status(record: &mut PermitRecord, status: PermitStatus, at: DateTime<Utc>) {
    record.estado = status.as_str().to_string();
    match status {
        PermitStatus::ProofSubmitted => record.fecha_comprobante = Some(at),
        PermitStatus::AdminValidated => record.fecha_validacion_admin = Some(at),
        PermitStatus::Pending => {}
    }
}

#[async_trait]
impl FolioStore for MemoryFolioStore {
    async fn insert_permit(&self, record: &PermitRecord) -> Result<(), CoreError> {
        let mut tables = self.tables();
        if tables.permits.contains_key(&record.folio) {
            return Err(CoreError::FolioAlreadyExists {
                folio: record.folio.clone(),
            });
        }
        tables.permits.insert(record.folio.clone(), record.clone());
        Ok(())
    }

    async fn upsert_draft(&self, record: &PermitRecord) -> Result<(), CoreError> {
        let mut tables = self.tables();
        tables.drafts.insert(record.folio.clone(), record.clone());
        Ok(())
    }

    async fn get_permit(&self, folio: &str) -> Result<Option<PermitRecord>, CoreError> {
        let tables = self.tables();
        Ok(tables.permits.get(folio).cloned())
    }

    async fn list_folios(&self, entidad: &str, prefix: &str) -> Result<Vec<String>, CoreError> {
        let tables = self.tables();
        Ok(tables
            .permits
            .values()
            .filter(|r| r.entidad == entidad && r.folio.starts_with(prefix))
            .map(|r| r.folio.clone())
            .collect())
    }

    async fn set_permit_status(
        &self,
        folio: &str,
        status: PermitStatus,
        at: DateTime<Utc>,
    ) -> Result<(), CoreError> {
        let mut tables = self.tables();
        if let Some(record) = tables.permits.get_mut(folio) {
            apply_status(record, status, at);
        }
        Ok(())
    }

    async fn set_draft_status(
        &self,
        folio: &str,
        status: PermitStatus,
        at: DateTime<Utc>,
    ) -> Result<(), CoreError> {
        let mut tables = self.tables();
        if let Some(record) = tables.drafts.get_mut(folio) {
            apply_status(record, status, at);
        }
        Ok(())
    }

    async fn delete_permit(&self, folio: &str) -> Result<(), CoreError> {
        let mut tables = self.tables();
        tables.permits.remove(folio);
        Ok(())
    }

    async fn delete_draft(&self, folio: &str) -> Result<(), CoreError> {
        let mut tables = self.tables();
        tables.drafts.remove(folio);
        Ok(())
    }

    async fn health_check(&self) -> Result<bool, CoreError> {
        Ok(true)
    }
}
