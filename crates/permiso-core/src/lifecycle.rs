// Copyright (C) 2025 Permiso Digital
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Folio lifecycle controller.
//!
//! Orchestrates the life of a folio: allocation and persistence at issue
//! time, registration of the pending deadline, the two cancellation triggers
//! (payment proof, admin override), and deletion on deadline expiry.
//!
//! Ordering rules this module is responsible for:
//!
//! - **Persist before schedule.** The record insert must succeed before a
//!   deadline is registered, so a persistence failure can never leave a
//!   deadline for a nonexistent record.
//! - **Take before touching storage.** The expiry path removes the registry
//!   entry synchronously before its first await; a cancellation racing the
//!   deadline task resolves to exactly one winner.
//! - **Transitions are defensive.** Status updates after a cancellation are
//!   applied even when no deadline was found, and update failures are logged
//!   and swallowed: the user-visible effect favors "cancelled but not
//!   recorded" over re-arming a deadline.

use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};
use tracing::{debug, info, instrument, warn};

use crate::config::Config;
use crate::error::CoreError;
use crate::folio;
use crate::model::{AdminValidation, IssuedPermit, PermitStatus, PermitSubmission, ProofOutcome};
use crate::notify::{NotificationSink, expiry_message};
use crate::persistence::{FolioStore, PermitRecord};
use crate::registry::TimerRegistry;

/// How many times a duplicate-folio rejection from the store triggers a fresh
/// allocation before the issue fails.
const MAX_ISSUE_ATTEMPTS: u32 = 3;

/// The folio lifecycle state machine.
///
/// Per folio: `ISSUING -> PENDING -> {PROOF_SUBMITTED | ADMIN_VALIDATED}`
/// (record persists) or `PENDING -> deleted` on deadline expiry. There is no
/// transition out of a validated status back to pending.
pub struct LifecycleController {
    config: Config,
    store: Arc<dyn FolioStore>,
    registry: Arc<TimerRegistry>,
    notifier: Arc<dyn NotificationSink>,
}

impl LifecycleController {
    /// Create a controller over the given collaborators.
    pub fn new(
        config: Config,
        store: Arc<dyn FolioStore>,
        registry: Arc<TimerRegistry>,
        notifier: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            config,
            store,
            registry,
            notifier,
        }
    }

    /// The deadline registry, for read-only projections (health reporting).
    pub fn registry(&self) -> &Arc<TimerRegistry> {
        &self.registry
    }

    /// Issue a folio for a completed submission.
    ///
    /// Allocates the folio, persists a pending record, registers the
    /// abandonment deadline, and returns the folio and dates for document
    /// rendering. Returns without a registered deadline if persistence fails.
    #[instrument(skip(self, submission, username))]
    pub async fn issue(
        &self,
        submission: PermitSubmission,
        user_id: i64,
        username: Option<String>,
    ) -> Result<IssuedPermit, CoreError> {
        submission.validate()?;

        let now = Utc::now().with_timezone(&self.config.timezone);
        let fecha_expedicion = now.date_naive();
        let fecha_vencimiento = fecha_expedicion + ChronoDuration::days(self.config.validity_days);

        let mut attempt = 0;
        let folio = loop {
            attempt += 1;
            let folio = folio::next_folio(
                self.store.as_ref(),
                &self.config.entidad,
                &self.config.folio_prefix,
                self.config.folio_min_suffix,
            )
            .await;

            let record = PermitRecord {
                folio: folio.clone(),
                entidad: self.config.entidad.clone(),
                marca: submission.marca.clone(),
                linea: submission.linea.clone(),
                anio: submission.anio.clone(),
                numero_serie: submission.numero_serie.clone(),
                numero_motor: submission.numero_motor.clone(),
                color: submission.color.clone(),
                contribuyente: submission.contribuyente.clone(),
                fecha_expedicion,
                fecha_vencimiento,
                estado: PermitStatus::Pending.as_str().to_string(),
                user_id,
                username: username.clone(),
                fecha_comprobante: None,
                fecha_validacion_admin: None,
            };

            // Persist before schedule: an insert failure aborts the issue and
            // must not leave a deadline behind.
            match self.store.insert_permit(&record).await {
                Ok(()) => {
                    if let Err(e) = self.store.upsert_draft(&record).await {
                        warn!(folio, error = %e, "failed to upsert draft record");
                    }
                    break folio;
                }
                Err(CoreError::FolioAlreadyExists { .. }) if attempt < MAX_ISSUE_ATTEMPTS => {
                    // A concurrent issue won this suffix; allocate again.
                    warn!(folio, attempt, "folio taken concurrently, regenerating");
                    continue;
                }
                Err(e) => return Err(e),
            }
        };

        let registry = Arc::clone(&self.registry);
        let store = Arc::clone(&self.store);
        let notifier = Arc::clone(&self.notifier);
        self.registry.schedule(&folio, user_id, move |folio| async move {
            run_expiry(&registry, store.as_ref(), notifier.as_ref(), &folio).await;
        });

        info!(folio, user_id, "folio issued, deadline registered");

        Ok(IssuedPermit {
            folio,
            fecha_expedicion,
            fecha_vencimiento,
        })
    }

    /// Record a payment proof for `user_id`.
    ///
    /// Targets the user's most recently issued open folio (documented
    /// tie-break for users holding several). Cancels its deadline and
    /// transitions the record; the transition is applied even when no
    /// deadline was found.
    #[instrument(skip(self))]
    pub async fn submit_proof(&self, user_id: i64) -> ProofOutcome {
        let folios = self.registry.active_folios_for(user_id);
        let Some(folio) = folios.last().cloned() else {
            debug!(user_id, "proof received with no open folio");
            return ProofOutcome::NoPendingFolio;
        };

        let timer_cancelled = self.registry.cancel(&folio);
        if !timer_cancelled {
            debug!(folio, "no pending deadline found, applying proof defensively");
        }

        self.apply_transition(&folio, PermitStatus::ProofSubmitted).await;
        info!(folio, user_id, timer_cancelled, "payment proof recorded");

        ProofOutcome::ProofRecorded {
            folio,
            timer_cancelled,
        }
    }

    /// Validate a folio from a raw admin override code.
    ///
    /// The code is the configured marker (case-insensitive) immediately
    /// followed by the folio; the folio must start with the configured
    /// prefix. Malformed codes are rejected with no side effects. A
    /// well-formed code always applies the transition, even when the
    /// deadline already fired, up until the record is actually deleted.
    #[instrument(skip(self, code))]
    pub async fn admin_validate(&self, code: &str) -> Result<AdminValidation, CoreError> {
        let folio = parse_admin_code(code, &self.config.admin_marker, &self.config.folio_prefix)?;

        let timer_cancelled = self.registry.cancel(&folio);
        self.apply_transition(&folio, PermitStatus::AdminValidated).await;
        info!(folio, timer_cancelled, "folio validated by admin override");

        Ok(AdminValidation {
            folio,
            timer_cancelled,
        })
    }

    /// Delete `folio` if its deadline is still unresolved.
    ///
    /// Invoked by the registry's deadline task; also callable directly to
    /// reap a folio whose deadline task was lost.
    pub async fn expire_if_still_pending(&self, folio: &str) {
        run_expiry(
            &self.registry,
            self.store.as_ref(),
            self.notifier.as_ref(),
            folio,
        )
        .await;
    }

    /// Apply a status transition to both tables, logging and swallowing
    /// failures.
    async fn apply_transition(&self, folio: &str, status: PermitStatus) {
        let at = Utc::now();
        if let Err(e) = self.store.set_permit_status(folio, status, at).await {
            warn!(folio, status = status.as_str(), error = %e, "permit status update failed");
        }
        if let Err(e) = self.store.set_draft_status(folio, status, at).await {
            warn!(folio, status = status.as_str(), error = %e, "draft status update failed");
        }
    }
}

/// Expiry body shared by the deadline task and the controller.
///
/// The registry `take` is the authoritative guard: it runs before the first
/// await, so a cancellation racing an in-flight deadline task resolves to
/// exactly one winner, and a double-invoked callback deletes at most once.
/// Every storage call and the notification are independently best-effort.
async fn run_expiry(
    registry: &TimerRegistry,
    store: &dyn FolioStore,
    notifier: &dyn NotificationSink,
    folio: &str,
) {
    let Some(entry) = registry.take(folio) else {
        debug!(folio, "deadline already resolved, nothing to expire");
        return;
    };

    info!(
        folio,
        user_id = entry.owner_user_id,
        "pending deadline elapsed, deleting folio"
    );

    if let Err(e) = store.delete_permit(folio).await {
        warn!(folio, error = %e, "failed to delete permit record");
    }
    if let Err(e) = store.delete_draft(folio).await {
        warn!(folio, error = %e, "failed to delete draft record");
    }
    if let Err(e) = notifier
        .notify(entry.owner_user_id, &expiry_message(folio))
        .await
    {
        warn!(
            folio,
            user_id = entry.owner_user_id,
            error = %e,
            "failed to notify owner of expiry"
        );
    }
}

/// Extract the folio from an admin override code.
///
/// Format: the marker (matched case-insensitively) immediately followed by
/// the folio digits, e.g. `SERO1292`. Surrounding whitespace is tolerated.
pub fn parse_admin_code(code: &str, marker: &str, prefix: &str) -> Result<String, CoreError> {
    let normalized = code.trim().to_uppercase();
    let marker = marker.to_uppercase();

    let Some(rest) = normalized.strip_prefix(marker.as_str()) else {
        return Err(CoreError::InvalidAdminCode {
            reason: format!("expected '{marker}' followed by the folio"),
        });
    };

    let folio = rest.trim().to_string();
    if folio.is_empty() || !folio.starts_with(prefix) {
        return Err(CoreError::InvalidAdminCode {
            reason: format!("folio must start with '{prefix}'"),
        });
    }

    Ok(folio)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_admin_code_accepts_valid() {
        assert_eq!(parse_admin_code("SERO1292", "SERO", "129").unwrap(), "1292");
        assert_eq!(parse_admin_code("  sero1292 ", "SERO", "129").unwrap(), "1292");
        assert_eq!(parse_admin_code("SERO 1292", "SERO", "129").unwrap(), "1292");
    }

    #[test]
    fn test_parse_admin_code_rejects_wrong_marker() {
        let err = parse_admin_code("XERO1292", "SERO", "129").unwrap_err();
        assert_eq!(err.error_code(), "INVALID_ADMIN_CODE");
    }

    #[test]
    fn test_parse_admin_code_rejects_wrong_prefix() {
        let err = parse_admin_code("SERO9999", "SERO", "129").unwrap_err();
        assert_eq!(err.error_code(), "INVALID_ADMIN_CODE");
        assert!(err.to_string().contains("129"));
    }

    #[test]
    fn test_parse_admin_code_rejects_empty_folio() {
        assert!(parse_admin_code("SERO", "SERO", "129").is_err());
        assert!(parse_admin_code("  ", "SERO", "129").is_err());
    }
}
