// Copyright (C) 2025 Permiso Digital
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Domain types shared across the folio lifecycle.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Status of a folio record while it exists in the store.
///
/// There is no terminal "expired" status: expiry deletes the record instead,
/// so a deleted folio and a never-issued folio are indistinguishable to
/// read-only consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PermitStatus {
    /// Issued, waiting for a payment proof or an admin override.
    Pending,
    /// A payment-proof photo was received; the record is preserved.
    ProofSubmitted,
    /// An operator validated the folio manually; the record is preserved.
    AdminValidated,
}

impl PermitStatus {
    /// Wire/storage representation, kept identical to the production tables.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDIENTE",
            Self::ProofSubmitted => "COMPROBANTE_ENVIADO",
            Self::AdminValidated => "VALIDADO_ADMIN",
        }
    }

    /// Parse the storage representation back into a typed status.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDIENTE" => Some(Self::Pending),
            "COMPROBANTE_ENVIADO" => Some(Self::ProofSubmitted),
            "VALIDADO_ADMIN" => Some(Self::AdminValidated),
            _ => None,
        }
    }
}

/// Vehicle/owner data collected by the upstream dialogue, already reduced to
/// the fields the permit document needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermitSubmission {
    /// Vehicle make.
    pub marca: String,
    /// Vehicle line/model.
    pub linea: String,
    /// Model year, four digits.
    pub anio: String,
    /// Vehicle identification (serial) number.
    pub numero_serie: String,
    /// Engine number.
    pub numero_motor: String,
    /// Vehicle color.
    pub color: String,
    /// Full name of the permit holder.
    pub contribuyente: String,
}

impl PermitSubmission {
    /// Apply the intake filter to every field (see [`sanitize_input`]).
    pub fn sanitized(self) -> Self {
        Self {
            marca: sanitize_input(&self.marca),
            linea: sanitize_input(&self.linea),
            anio: self.anio.trim().to_string(),
            numero_serie: sanitize_input(&self.numero_serie),
            numero_motor: sanitize_input(&self.numero_motor),
            color: sanitize_input(&self.color),
            contribuyente: sanitize_input(&self.contribuyente),
        }
    }

    /// Thin validation of the sanitized submission.
    ///
    /// The dialogue collaborator owns real input validation; this only rejects
    /// submissions that cannot produce a coherent record.
    pub fn validate(&self) -> Result<(), CoreError> {
        let required = [
            ("marca", &self.marca),
            ("linea", &self.linea),
            ("numero_serie", &self.numero_serie),
            ("numero_motor", &self.numero_motor),
            ("color", &self.color),
            ("contribuyente", &self.contribuyente),
        ];
        for (field, value) in required {
            if value.is_empty() {
                return Err(CoreError::ValidationError {
                    field: field.to_string(),
                    message: "must not be empty".to_string(),
                });
            }
        }
        if self.anio.len() != 4 || !self.anio.chars().all(|c| c.is_ascii_digit()) {
            return Err(CoreError::ValidationError {
                field: "anio".to_string(),
                message: "must be a 4-digit year".to_string(),
            });
        }
        Ok(())
    }
}

/// Result of a successful issuance, returned to the caller so the document
/// renderer collaborator can produce the permit.
#[derive(Debug, Clone, Serialize)]
pub struct IssuedPermit {
    /// The allocated folio.
    pub folio: String,
    /// Issue date in the configured timezone.
    pub fecha_expedicion: NaiveDate,
    /// End of the legal validity window (issue + configured days).
    pub fecha_vencimiento: NaiveDate,
}

/// Outcome of a payment-proof submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProofOutcome {
    /// The user has no open folio; nothing was changed.
    NoPendingFolio,
    /// The most recently issued open folio was transitioned.
    ProofRecorded {
        /// The folio that received the proof.
        folio: String,
        /// Whether a pending deadline was actually cancelled. `false` means
        /// the deadline had already resolved and the update was applied
        /// defensively.
        timer_cancelled: bool,
    },
}

/// Outcome of a well-formed admin override.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminValidation {
    /// The folio named by the override code.
    pub folio: String,
    /// Whether a pending deadline was actually cancelled.
    pub timer_cancelled: bool,
}

/// Intake filter applied to free-text fields: keeps alphanumerics, spaces and
/// `-_./`, trims, and uppercases. Mirrors the production intake behavior.
pub fn sanitize_input(text: &str) -> String {
    let kept: String = text
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace() || matches!(c, '-' | '_' | '.' | '/'))
        .collect();
    kept.trim().to_uppercase()
}

/// Reduce a folio lookup to alphanumerics, as the status endpoints do before
/// querying the store.
pub fn sanitize_folio(folio: &str) -> String {
    folio.chars().filter(|c| c.is_alphanumeric()).collect()
}

/// HTML-escape text before interpolating it into a user-facing message.
///
/// Error details shown to non-admin users pass through this so raw internals
/// can never break out of the surrounding markup.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}
