// Copyright (C) 2025 Permiso Digital
// SPDX-License-Identifier: AGPL-3.0-or-later
//! HTTP API server for the permiso folio lifecycle engine.
//!
//! Exposes the lifecycle controller to the external dialogue and messaging
//! collaborators, plus the read-only projections backing QR verification:
//!
//! | Route | Purpose |
//! |-------|---------|
//! | `POST /permisos` | Issue a folio for a completed submission |
//! | `POST /permisos/comprobante` | Record a payment proof for a user |
//! | `POST /permisos/validacion` | Apply an admin override code |
//! | `GET /permisos/{folio}` | Read-only permit status projection |
//! | `GET /healthz` | Service health and pending-deadline count |

pub mod config;
pub mod routes;
pub mod telegram;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use chrono_tz::Tz;
use tower_http::trace::TraceLayer;

use permiso_core::lifecycle::LifecycleController;
use permiso_core::persistence::FolioStore;
use permiso_core::registry::TimerRegistry;

/// Shared state for all HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    /// The lifecycle controller driving every write.
    pub controller: Arc<LifecycleController>,
    /// Read-only store access for status projections.
    pub store: Arc<dyn FolioStore>,
    /// Deadline registry, for health reporting.
    pub registry: Arc<TimerRegistry>,
    /// Jurisdiction code reported by the health endpoint.
    pub entidad: String,
    /// Timezone used to derive the `vigente` flag.
    pub timezone: Tz,
}

/// Build the API router over the given state.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(routes::health))
        .route("/permisos", post(routes::issue_permit))
        .route("/permisos/comprobante", post(routes::submit_proof))
        .route("/permisos/validacion", post(routes::admin_validate))
        .route("/permisos/{folio}", get(routes::permit_status))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
