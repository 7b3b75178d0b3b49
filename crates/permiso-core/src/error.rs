// Copyright (C) 2025 Permiso Digital
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for permiso-core.
//!
//! Provides a unified error type that maps to API error responses.

use std::fmt;

/// Result type using CoreError
pub type Result<T> = std::result::Result<T, CoreError>;

/// Core errors that can occur while driving the folio lifecycle.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum CoreError {
    /// A folio record was not found in the store.
    FolioNotFound {
        /// The folio that was not found.
        folio: String,
    },

    /// A folio already exists (duplicate issuance caught by the store).
    FolioAlreadyExists {
        /// The folio that already exists.
        folio: String,
    },

    /// Input validation failed.
    ValidationError {
        /// The field that failed validation.
        field: String,
        /// The validation error message.
        message: String,
    },

    /// An admin override code did not match the expected format.
    InvalidAdminCode {
        /// Why the code was rejected.
        reason: String,
    },

    /// Database operation failed.
    DatabaseError {
        /// The operation that failed.
        operation: String,
        /// Error details.
        details: String,
    },
}

impl CoreError {
    /// Get the error code string for this error type.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::FolioNotFound { .. } => "FOLIO_NOT_FOUND",
            Self::FolioAlreadyExists { .. } => "FOLIO_ALREADY_EXISTS",
            Self::ValidationError { .. } => "VALIDATION_ERROR",
            Self::InvalidAdminCode { .. } => "INVALID_ADMIN_CODE",
            Self::DatabaseError { .. } => "DATABASE_ERROR",
        }
    }
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FolioNotFound { folio } => {
                write!(f, "Folio '{}' not found", folio)
            }
            Self::FolioAlreadyExists { folio } => {
                write!(f, "Folio '{}' already exists", folio)
            }
            Self::ValidationError { field, message } => {
                write!(f, "Validation error for '{}': {}", field, message)
            }
            Self::InvalidAdminCode { reason } => {
                write!(f, "Invalid admin code: {}", reason)
            }
            Self::DatabaseError { operation, details } => {
                write!(f, "Database error during '{}': {}", operation, details)
            }
        }
    }
}

impl std::error::Error for CoreError {}

impl From<sqlx::Error> for CoreError {
    fn from(err: sqlx::Error) -> Self {
        // Unique-constraint violations get their own code so callers can retry
        // folio generation instead of surfacing a storage failure.
        if let sqlx::Error::Database(ref db_err) = err {
            if db_err.is_unique_violation() {
                return CoreError::FolioAlreadyExists {
                    folio: String::new(),
                };
            }
        }
        CoreError::DatabaseError {
            operation: "query".to_string(),
            details: err.to_string(),
        }
    }
}
