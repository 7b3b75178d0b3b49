// Copyright (C) 2025 Permiso Digital
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Common test infrastructure for permiso-core integration tests.
//!
//! Provides a controller wired against the in-memory store, a fault-injecting
//! store wrapper, and a recording notification sink.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use permiso_core::config::Config;
use permiso_core::error::CoreError;
use permiso_core::lifecycle::LifecycleController;
use permiso_core::model::{PermitStatus, PermitSubmission};
use permiso_core::notify::NotificationSink;
use permiso_core::persistence::{FolioStore, MemoryFolioStore, PermitRecord};
use permiso_core::registry::TimerRegistry;

/// Twelve hours, the production pending deadline.
pub const PENDING_TTL: Duration = Duration::from_secs(12 * 60 * 60);

/// Configuration used by every integration test.
pub fn test_config() -> Config {
    Config {
        database_url: "postgres://unused-in-tests".to_string(),
        folio_prefix: "129".to_string(),
        folio_min_suffix: 2,
        entidad: "ags".to_string(),
        admin_marker: "SERO".to_string(),
        pending_ttl: PENDING_TTL,
        timezone: chrono_tz::America::Mexico_City,
        validity_days: 30,
    }
}

/// A completed submission with plausible vehicle data.
pub fn submission() -> PermitSubmission {
    PermitSubmission {
        marca: "NISSAN".to_string(),
        linea: "VERSA".to_string(),
        anio: "2019".to_string(),
        numero_serie: "3N1CN7AD9KL812345".to_string(),
        numero_motor: "HR16123456".to_string(),
        color: "GRIS".to_string(),
        contribuyente: "JUAN PEREZ".to_string(),
    }
}

/// Notification sink that records every delivery and can be told to fail.
#[derive(Default)]
pub struct RecordingSink {
    sent: Mutex<Vec<(i64, String)>>,
    fail: AtomicBool,
}

impl RecordingSink {
    pub fn notifications(&self) -> Vec<(i64, String)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn notify(&self, user_id: i64, text: &str) -> anyhow::Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            anyhow::bail!("simulated delivery failure");
        }
        self.sent.lock().unwrap().push((user_id, text.to_string()));
        Ok(())
    }
}

/// Store wrapper with per-operation fault injection and call counters.
pub struct FlakyStore {
    pub inner: Arc<MemoryFolioStore>,
    pub fail_insert: AtomicBool,
    pub fail_list: AtomicBool,
    pub fail_delete_permit: AtomicBool,
    pub delete_permit_calls: AtomicUsize,
    pub delete_draft_calls: AtomicUsize,
    pub status_update_calls: AtomicUsize,
}

impl FlakyStore {
    pub fn new(inner: Arc<MemoryFolioStore>) -> Self {
        Self {
            inner,
            fail_insert: AtomicBool::new(false),
            fail_list: AtomicBool::new(false),
            fail_delete_permit: AtomicBool::new(false),
            delete_permit_calls: AtomicUsize::new(0),
            delete_draft_calls: AtomicUsize::new(0),
            status_update_calls: AtomicUsize::new(0),
        }
    }

    fn db_error(operation: &str) -> CoreError {
        CoreError::DatabaseError {
            operation: operation.to_string(),
            details: "simulated failure".to_string(),
        }
    }
}

#[async_trait]
impl FolioStore for FlakyStore {
    async fn insert_permit(&self, record: &PermitRecord) -> Result<(), CoreError> {
        if self.fail_insert.load(Ordering::SeqCst) {
            return Err(Self::db_error("insert"));
        }
        self.inner.insert_permit(record).await
    }

    async fn upsert_draft(&self, record: &PermitRecord) -> Result<(), CoreError> {
        self.inner.upsert_draft(record).await
    }

    async fn get_permit(&self, folio: &str) -> Result<Option<PermitRecord>, CoreError> {
        self.inner.get_permit(folio).await
    }

    async fn list_folios(&self, entidad: &str, prefix: &str) -> Result<Vec<String>, CoreError> {
        if self.fail_list.load(Ordering::SeqCst) {
            return Err(Self::db_error("select"));
        }
        self.inner.list_folios(entidad, prefix).await
    }

    async fn set_permit_status(
        &self,
        folio: &str,
        status: PermitStatus,
        at: DateTime<Utc>,
    ) -> Result<(), CoreError> {
        self.status_update_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.set_permit_status(folio, status, at).await
    }

    async fn set_draft_status(
        &self,
        folio: &str,
        status: PermitStatus,
        at: DateTime<Utc>,
    ) -> Result<(), CoreError> {
        self.status_update_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.set_draft_status(folio, status, at).await
    }

    async fn delete_permit(&self, folio: &str) -> Result<(), CoreError> {
        self.delete_permit_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_delete_permit.load(Ordering::SeqCst) {
            return Err(Self::db_error("delete"));
        }
        self.inner.delete_permit(folio).await
    }

    async fn delete_draft(&self, folio: &str) -> Result<(), CoreError> {
        self.delete_draft_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.delete_draft(folio).await
    }

    async fn health_check(&self) -> Result<bool, CoreError> {
        self.inner.health_check().await
    }
}

/// Controller plus handles to its collaborators.
pub struct TestContext {
    pub store: Arc<MemoryFolioStore>,
    pub flaky: Arc<FlakyStore>,
    pub registry: Arc<TimerRegistry>,
    pub sink: Arc<RecordingSink>,
    pub controller: LifecycleController,
}

impl TestContext {
    /// Build a controller over a fresh in-memory store.
    pub fn new() -> Self {
        let config = test_config();
        let store = Arc::new(MemoryFolioStore::new());
        let flaky = Arc::new(FlakyStore::new(store.clone()));
        let registry = Arc::new(TimerRegistry::new(config.pending_ttl));
        let sink = Arc::new(RecordingSink::default());
        let controller = LifecycleController::new(
            config,
            flaky.clone(),
            registry.clone(),
            sink.clone(),
        );
        Self {
            store,
            flaky,
            registry,
            sink,
            controller,
        }
    }

    /// Issue a folio for `user_id` with the canned submission.
    pub async fn issue_for(&self, user_id: i64) -> String {
        self.controller
            .issue(submission(), user_id, Some("tester".to_string()))
            .await
            .expect("issue should succeed")
            .folio
    }

    /// Current status string of a permit, if the record exists.
    pub async fn permit_status(&self, folio: &str) -> Option<String> {
        self.store
            .get_permit(folio)
            .await
            .expect("memory store never fails")
            .map(|r| r.estado)
    }
}
