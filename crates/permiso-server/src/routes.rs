// Copyright (C) 2025 Permiso Digital
// SPDX-License-Identifier: AGPL-3.0-or-later
//! HTTP handlers for the permiso API.
//!
//! Writes (issue, proof, validation) are the boundary the external dialogue
//! and messaging collaborators call; reads (status, health) back the QR
//! verification flow and monitoring.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::error;

use permiso_core::error::CoreError;
use permiso_core::model::{PermitSubmission, ProofOutcome, escape_html, sanitize_folio};

use crate::AppState;

/// Body of `POST /permisos`.
#[derive(Debug, Deserialize)]
pub struct IssueRequest {
    /// Identifier of the requesting user.
    pub user_id: i64,
    /// Requester's handle, if any.
    pub username: Option<String>,
    /// Vehicle/owner data collected by the dialogue.
    #[serde(flatten)]
    pub submission: PermitSubmission,
}

/// Body of `POST /permisos/comprobante`.
#[derive(Debug, Deserialize)]
pub struct ProofRequest {
    /// User whose most recent open folio receives the proof.
    pub user_id: i64,
}

/// Body of `POST /permisos/validacion`.
#[derive(Debug, Deserialize)]
pub struct ValidationRequest {
    /// Raw admin override text, e.g. `SERO1292`.
    pub codigo: String,
}

/// Read-only projection of a permit record.
#[derive(Debug, Serialize)]
pub struct PermitStatusResponse {
    pub folio: String,
    pub entidad: String,
    pub estado: String,
    /// Whether the permit is inside its legal validity window.
    pub vigente: bool,
    pub fecha_expedicion: NaiveDate,
    pub fecha_vencimiento: NaiveDate,
    pub marca: String,
    pub linea: String,
    pub anio: String,
    pub numero_serie: String,
    pub numero_motor: String,
    pub color: String,
    pub contribuyente: String,
}

fn error_body(code: &str, mensaje: &str) -> Json<serde_json::Value> {
    Json(json!({ "error": code, "mensaje": mensaje }))
}

/// `POST /permisos` - issue a folio for a completed submission.
pub async fn issue_permit(
    State(state): State<AppState>,
    Json(request): Json<IssueRequest>,
) -> Response {
    let submission = request.submission.sanitized();

    match state
        .controller
        .issue(submission, request.user_id, request.username)
        .await
    {
        Ok(issued) => (StatusCode::CREATED, Json(issued)).into_response(),
        Err(e @ CoreError::ValidationError { .. }) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            error_body(e.error_code(), &e.to_string()),
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "permit issuance failed");
            // Raw internals never reach the caller unescaped.
            (
                StatusCode::BAD_GATEWAY,
                error_body(e.error_code(), &escape_html(&e.to_string())),
            )
                .into_response()
        }
    }
}

/// `POST /permisos/comprobante` - record a payment proof for a user.
pub async fn submit_proof(
    State(state): State<AppState>,
    Json(request): Json<ProofRequest>,
) -> Response {
    match state.controller.submit_proof(request.user_id).await {
        ProofOutcome::NoPendingFolio => (
            StatusCode::NOT_FOUND,
            error_body(
                "NO_PENDING_FOLIO",
                "No tienes folios pendientes. Usa /permiso para iniciar uno nuevo.",
            ),
        )
            .into_response(),
        ProofOutcome::ProofRecorded {
            folio,
            timer_cancelled,
        } => (
            StatusCode::OK,
            Json(json!({
                "folio": folio,
                "estado": "COMPROBANTE_ENVIADO",
                "timer_detenido": timer_cancelled,
            })),
        )
            .into_response(),
    }
}

/// `POST /permisos/validacion` - apply an admin override code.
pub async fn admin_validate(
    State(state): State<AppState>,
    Json(request): Json<ValidationRequest>,
) -> Response {
    match state.controller.admin_validate(&request.codigo).await {
        Ok(validation) => (
            StatusCode::OK,
            Json(json!({
                "folio": validation.folio,
                "estado": "VALIDADO_ADMIN",
                "timer_detenido": validation.timer_cancelled,
            })),
        )
            .into_response(),
        Err(e) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            error_body(e.error_code(), &e.to_string()),
        )
            .into_response(),
    }
}

/// `GET /permisos/{folio}` - read-only status projection.
///
/// A folio deleted on expiry and a folio that never existed produce the same
/// not-found response on purpose.
pub async fn permit_status(State(state): State<AppState>, Path(folio): Path<String>) -> Response {
    let folio = sanitize_folio(&folio);

    let record = match state.store.get_permit(&folio).await {
        Ok(record) => record,
        Err(e) => {
            error!(folio, error = %e, "status lookup failed");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_body(e.error_code(), "Error al consultar el folio."),
            )
                .into_response();
        }
    };

    let Some(record) = record else {
        return (
            StatusCode::NOT_FOUND,
            error_body(
                "FOLIO_NOT_FOUND",
                "Este folio no existe en el sistema o fue eliminado por vencimiento.",
            ),
        )
            .into_response();
    };

    let today = Utc::now().with_timezone(&state.timezone).date_naive();
    let vigente = today <= record.fecha_vencimiento;

    (
        StatusCode::OK,
        Json(PermitStatusResponse {
            folio: record.folio,
            entidad: record.entidad,
            estado: record.estado,
            vigente,
            fecha_expedicion: record.fecha_expedicion,
            fecha_vencimiento: record.fecha_vencimiento,
            marca: record.marca,
            linea: record.linea,
            anio: record.anio,
            numero_serie: record.numero_serie,
            numero_motor: record.numero_motor,
            color: record.color,
            contribuyente: record.contribuyente,
        }),
    )
        .into_response()
}

/// `GET /healthz` - service health and pending-deadline count.
pub async fn health(State(state): State<AppState>) -> Response {
    let db = state.store.health_check().await.unwrap_or(false);
    (
        StatusCode::OK,
        Json(json!({
            "status": "ok",
            "entidad": state.entidad,
            "timers_activos": state.registry.count(),
            "db": db,
        })),
    )
        .into_response()
}
