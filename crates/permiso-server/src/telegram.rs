// Copyright (C) 2025 Permiso Digital
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Telegram notification adapter.
//!
//! Thin best-effort implementation of the core's [`NotificationSink`] over
//! the Bot API. A formatted send that fails is retried once as plain text
//! before the error is surfaced to the (logging-only) caller.

use async_trait::async_trait;
use serde_json::json;
use tracing::warn;

use permiso_core::notify::NotificationSink;

/// Notification sink delivering through the Telegram Bot API.
pub struct TelegramNotifier {
    http: reqwest::Client,
    token: String,
}

impl TelegramNotifier {
    /// Create a notifier for the given bot token.
    pub fn new(token: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            token,
        }
    }

    async fn send(&self, chat_id: i64, text: &str, html: bool) -> anyhow::Result<()> {
        let url = format!("https://api.telegram.org/bot{}/sendMessage", self.token);
        let mut body = json!({ "chat_id": chat_id, "text": text });
        if html {
            body["parse_mode"] = json!("HTML");
        }

        let response = self.http.post(&url).json(&body).send().await?;
        if !response.status().is_success() {
            anyhow::bail!("telegram API returned {}", response.status());
        }
        Ok(())
    }
}

#[async_trait]
impl NotificationSink for TelegramNotifier {
    async fn notify(&self, user_id: i64, text: &str) -> anyhow::Result<()> {
        if let Err(e) = self.send(user_id, text, true).await {
            warn!(user_id, error = %e, "formatted send failed, retrying as plain text");
            self.send(user_id, &strip_tags(text), false).await?;
        }
        Ok(())
    }
}

/// Remove the formatting tags the service uses so a message can be delivered
/// without `parse_mode`.
fn strip_tags(text: &str) -> String {
    let mut plain = text.to_string();
    for tag in ["<b>", "</b>", "<i>", "</i>", "<code>", "</code>"] {
        plain = plain.replace(tag, "");
    }
    plain
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_tags() {
        assert_eq!(
            strip_tags("<b>TIEMPO AGOTADO</b>\n\nfolio <code>1292</code>"),
            "TIEMPO AGOTADO\n\nfolio 1292"
        );
        assert_eq!(strip_tags("sin formato"), "sin formato");
    }
}
