// Copyright (C) 2025 Permiso Digital
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Outbound notification contract.
//!
//! Delivery is a collaborator concern (Telegram in production); the core only
//! needs a best-effort "tell this user this text" operation. Failures are
//! logged by callers and never block lifecycle cleanup.

use async_trait::async_trait;

/// Best-effort outbound message delivery.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Deliver `text` to `user_id`. Errors are advisory; callers suppress them.
    async fn notify(&self, user_id: i64, text: &str) -> anyhow::Result<()>;
}

/// Sink that drops every message, for deployments without an outbound channel.
pub struct NullNotificationSink;

#[async_trait]
impl NotificationSink for NullNotificationSink {
    async fn notify(&self, user_id: i64, _text: &str) -> anyhow::Result<()> {
        tracing::debug!(user_id, "notification dropped (no outbound channel configured)");
        Ok(())
    }
}

/// Message sent to the owner when their folio is deleted on deadline expiry.
pub fn expiry_message(folio: &str) -> String {
    format!(
        "⏰ <b>TIEMPO AGOTADO</b>\n\nEl folio <b>{folio}</b> fue eliminado por no recibir \
         comprobante ni validación admin en el plazo establecido."
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expiry_message_names_folio() {
        let msg = expiry_message("1292");
        assert!(msg.contains("1292"));
        assert!(msg.contains("TIEMPO AGOTADO"));
    }
}
