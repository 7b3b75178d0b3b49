// Copyright (C) 2025 Permiso Digital
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Configuration loading from environment variables.

use std::time::Duration;

use chrono_tz::Tz;

/// Default numeric folio prefix for the configured jurisdiction.
pub const DEFAULT_FOLIO_PREFIX: &str = "129";

/// Default jurisdiction code stamped on every record.
pub const DEFAULT_ENTIDAD: &str = "ags";

/// Default admin override marker (case-insensitive, prepended to the folio).
pub const DEFAULT_ADMIN_MARKER: &str = "SERO";

/// Permiso engine configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// PostgreSQL connection URL
    pub database_url: String,
    /// Numeric prefix every folio starts with
    pub folio_prefix: String,
    /// First suffix assigned when no folios exist yet
    pub folio_min_suffix: u64,
    /// Jurisdiction code stored on every record
    pub entidad: String,
    /// Admin override marker, matched case-insensitively
    pub admin_marker: String,
    /// Abandonment window for unpaid folios (the pending deadline)
    pub pending_ttl: Duration,
    /// Timezone in which issue/expiry dates are computed
    pub timezone: Tz,
    /// Legal validity window of an issued permit, in days
    pub validity_days: i64,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Required:
    /// - `PERMISO_DATABASE_URL`: PostgreSQL connection string
    ///
    /// Optional (with defaults):
    /// - `PERMISO_FOLIO_PREFIX`: folio prefix (default: "129")
    /// - `PERMISO_FOLIO_MIN_SUFFIX`: first suffix in the sequence (default: 2)
    /// - `PERMISO_ENTIDAD`: jurisdiction code (default: "ags")
    /// - `PERMISO_ADMIN_MARKER`: admin override marker (default: "SERO")
    /// - `PERMISO_PENDING_TTL_SECS`: pending deadline in seconds (default: 43200 = 12h)
    /// - `PERMISO_TIMEZONE`: IANA timezone name (default: "America/Mexico_City")
    /// - `PERMISO_VALIDITY_DAYS`: permit validity window in days (default: 30)
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = std::env::var("PERMISO_DATABASE_URL")
            .map_err(|_| ConfigError::Missing("PERMISO_DATABASE_URL"))?;

        let folio_prefix = std::env::var("PERMISO_FOLIO_PREFIX")
            .unwrap_or_else(|_| DEFAULT_FOLIO_PREFIX.to_string());
        if folio_prefix.is_empty() || !folio_prefix.chars().all(|c| c.is_ascii_digit()) {
            return Err(ConfigError::Invalid(
                "PERMISO_FOLIO_PREFIX",
                "must be a non-empty numeric string",
            ));
        }

        let folio_min_suffix: u64 = std::env::var("PERMISO_FOLIO_MIN_SUFFIX")
            .unwrap_or_else(|_| "2".to_string())
            .parse()
            .map_err(|_| {
                ConfigError::Invalid("PERMISO_FOLIO_MIN_SUFFIX", "must be a positive integer")
            })?;

        let entidad =
            std::env::var("PERMISO_ENTIDAD").unwrap_or_else(|_| DEFAULT_ENTIDAD.to_string());

        let admin_marker = std::env::var("PERMISO_ADMIN_MARKER")
            .unwrap_or_else(|_| DEFAULT_ADMIN_MARKER.to_string())
            .to_uppercase();
        if admin_marker.is_empty() {
            return Err(ConfigError::Invalid(
                "PERMISO_ADMIN_MARKER",
                "must not be empty",
            ));
        }

        let pending_ttl_secs: u64 = std::env::var("PERMISO_PENDING_TTL_SECS")
            .unwrap_or_else(|_| "43200".to_string())
            .parse()
            .map_err(|_| {
                ConfigError::Invalid("PERMISO_PENDING_TTL_SECS", "must be a positive integer")
            })?;

        let timezone: Tz = std::env::var("PERMISO_TIMEZONE")
            .unwrap_or_else(|_| "America/Mexico_City".to_string())
            .parse()
            .map_err(|_| ConfigError::Invalid("PERMISO_TIMEZONE", "must be an IANA timezone name"))?;

        let validity_days: i64 = std::env::var("PERMISO_VALIDITY_DAYS")
            .unwrap_or_else(|_| "30".to_string())
            .parse()
            .map_err(|_| {
                ConfigError::Invalid("PERMISO_VALIDITY_DAYS", "must be a positive integer")
            })?;
        if validity_days <= 0 {
            return Err(ConfigError::Invalid(
                "PERMISO_VALIDITY_DAYS",
                "must be a positive integer",
            ));
        }

        Ok(Self {
            database_url,
            folio_prefix,
            folio_min_suffix,
            entidad,
            admin_marker,
            pending_ttl: Duration::from_secs(pending_ttl_secs),
            timezone,
            validity_days,
        })
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required environment variable is missing.
    #[error("missing required environment variable: {0}")]
    Missing(&'static str),

    /// An environment variable has an invalid value.
    #[error("invalid value for {0}: {1}")]
    Invalid(&'static str, &'static str),
}
