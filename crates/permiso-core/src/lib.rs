// Copyright (C) 2025 Permiso Digital
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Permiso Core - Folio Lifecycle Engine
//!
//! This crate drives the life of a vehicle-circulation permit folio: sequential
//! allocation, persistence of the pending record, a time-bounded abandonment
//! deadline, the two human-triggered cancellation events that race it, and
//! deletion on expiry.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       External Collaborators                             │
//! │     (Telegram dialogue/transport, document renderer, status pages)       │
//! └─────────────────────────────────────────────────────────────────────────┘
//!                                    │
//!                                    ▼
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       LifecycleController                                │
//! │            issue / submit_proof / admin_validate / expiry                │
//! └─────────────────────────────────────────────────────────────────────────┘
//!       │                     │                          │
//!       │ allocates           │ schedules/cancels        │ persists
//!       ▼                     ▼                          ▼
//! ┌───────────────┐   ┌─────────────────┐   ┌─────────────────────────────┐
//! │ Folio         │   │ TimerRegistry   │   │ FolioStore                  │
//! │ Generator     │   │ (in-memory      │   │ (PostgreSQL: permits +      │
//! │               │   │  deadlines)     │   │  draft projection)          │
//! └───────────────┘   └─────────────────┘   └─────────────────────────────┘
//!                             │
//!                             │ on expiry
//!                             ▼
//!                     ┌─────────────────┐
//!                     │ NotificationSink│
//!                     │ (best-effort)   │
//!                     └─────────────────┘
//! ```
//!
//! # Folio State Machine
//!
//! ```text
//!                  ┌───────────┐
//!                  │  ISSUING  │
//!                  └─────┬─────┘
//!                        │ persist + register deadline
//!                        ▼
//!                  ┌───────────┐
//!        ┌─────────│ PENDIENTE │─────────┐
//!        │         └─────┬─────┘         │
//!   payment proof        │          admin override
//!        │          deadline (12h)       │
//!        ▼               │               ▼
//! ┌──────────────────┐   │   ┌─────────────────┐
//! │COMPROBANTE_      │   │   │ VALIDADO_ADMIN  │
//! │ENVIADO           │   │   └─────────────────┘
//! └──────────────────┘   ▼
//!                  record deleted
//!                  (no terminal status persisted)
//! ```
//!
//! Whichever of the three events happens first wins: both cancellation events
//! remove the pending deadline, and the deadline only deletes a folio whose
//! registry entry is still present at fire time. A validated record is never
//! deleted by expiry.
//!
//! # Concurrency Model
//!
//! The registry's two maps are the only shared mutable state. They are
//! guarded by a synchronous mutex that is never held across an await, so the
//! presence-check-and-remove in the expiry path is atomic with respect to
//! cancellations. Storage and notification calls are suspension points and
//! happen strictly after the registry decision is latched.
//!
//! # Modules
//!
//! - [`config`]: Engine configuration from environment variables
//! - [`error`]: Error types with API error code mapping
//! - [`folio`]: Sequential folio allocation with degraded fallback
//! - [`lifecycle`]: The lifecycle controller and admin-code parsing
//! - [`migrations`]: Embedded PostgreSQL migrations
//! - [`model`]: Domain types and intake sanitization helpers
//! - [`notify`]: Outbound notification contract
//! - [`persistence`]: Record store gateway and backends
//! - [`registry`]: In-memory deadline registry

#![deny(missing_docs)]

/// Engine configuration loaded from environment variables.
pub mod config;

/// Error types for lifecycle operations with API error code mapping.
pub mod error;

/// Sequential folio allocation.
pub mod folio;

/// Lifecycle controller (issue, proof, admin override, expiry).
pub mod lifecycle;

/// Embedded database migrations.
pub mod migrations;

/// Domain types shared across the lifecycle.
pub mod model;

/// Outbound notification contract.
pub mod notify;

/// Record store gateway and backend implementations.
pub mod persistence;

/// In-memory registry of pending folio deadlines.
pub mod registry;
