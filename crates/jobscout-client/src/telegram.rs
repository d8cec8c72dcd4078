use std::time::Duration;

use jobscout_core::config::TelegramConfig;
use jobscout_core::error::AppError;
use jobscout_core::models::{NotificationData, PersistedRecord};
use jobscout_core::traits::NotifyChannel;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

const TELEGRAM_API_BASE: &str = "https://api.telegram.org";
const SEND_TIMEOUT: Duration = Duration::from_secs(30);

/// Telegram notification channel.
///
/// Builds one MarkdownV2 summary per run and posts it to every configured
/// chat. One unreachable chat does not block delivery to the rest; the send
/// only fails when no chat accepted the message.
#[derive(Clone)]
pub struct TelegramChannel {
    client: Client,
    config: TelegramConfig,
}

impl TelegramChannel {
    pub fn new(config: &TelegramConfig) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(SEND_TIMEOUT)
            .build()
            .map_err(|e| AppError::NotifyError(e.to_string()))?;

        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    async fn deliver(&self, url: &str, chat_id: &str, text: &str) -> Result<(), AppError> {
        let request = SendMessageRequest {
            chat_id,
            text,
            parse_mode: "MarkdownV2",
            disable_web_page_preview: true,
        };

        let response = self
            .client
            .post(url)
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::NotifyError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<TelegramErrorBody>(&body)
                .map(|e| e.description)
                .unwrap_or_else(|_| format!("HTTP {}: {}", status.as_u16(), body));
            return Err(AppError::NotifyError(message));
        }

        Ok(())
    }
}

// ---- Bot API types ----

#[derive(Serialize)]
struct SendMessageRequest<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'a str,
    disable_web_page_preview: bool,
}

#[derive(Deserialize)]
struct TelegramErrorBody {
    description: String,
}

/// Escape the characters MarkdownV2 treats as markup.
fn escape_markdown(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(
            c,
            '_' | '*'
                | '['
                | ']'
                | '('
                | ')'
                | '~'
                | '`'
                | '>'
                | '#'
                | '+'
                | '-'
                | '='
                | '|'
                | '{'
                | '}'
                | '.'
                | '!'
        ) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Inside the `(...)` of an inline link only `)` and `\` are special.
fn escape_link_url(url: &str) -> String {
    url.replace('\\', "\\\\").replace(')', "\\)")
}

fn format_entry(record: &PersistedRecord, index: usize) -> String {
    let mut parts = vec![format!("{index}\\. *{}*", escape_markdown(&record.title))];
    parts.push(format!("   {}", escape_markdown(&record.company)));
    parts.push(format!("   {}", escape_markdown(&record.location)));
    parts.push(format!("   Score: {}", record.relevance_score));
    if record.is_remote == Some(true) {
        parts.push("   Remote".to_string());
    }
    if let Some(url) = &record.url {
        parts.push(format!("   [View listing]({})", escape_link_url(url)));
    }
    parts.join("\n")
}

fn build_message(config: &TelegramConfig, data: &NotificationData) -> String {
    let mut lines = vec![
        "*jobscout \\- run summary*".to_string(),
        String::new(),
        format!(
            "Date: {}",
            escape_markdown(&data.run_timestamp.format("%Y-%m-%d %H:%M").to_string())
        ),
        format!("Total found: {}", data.total_found),
        format!("New: {}", data.new_count),
        format!("Updated: {}", data.updated_count),
        format!("Avg score: {}", escape_markdown(&format!("{:.1}", data.avg_score))),
    ];

    if data.new_count == 0 {
        lines.push(String::new());
        lines.push("No new listings this run\\.".to_string());
        return lines.join("\n");
    }

    let eligible: Vec<&PersistedRecord> = data
        .new_listings
        .iter()
        .filter(|r| r.relevance_score >= config.min_score)
        .collect();

    if !eligible.is_empty() {
        let shown = eligible.len().min(config.max_listings_per_message);
        lines.push(String::new());
        lines.push(format!("*Top {shown} new listings*"));
        lines.push(String::new());
        for (idx, record) in eligible.iter().take(shown).enumerate() {
            lines.push(format_entry(record, idx + 1));
            lines.push(String::new());
        }
        if eligible.len() > shown {
            lines.push(format!(
                "\\.\\.\\. and {} more in the store",
                eligible.len() - shown
            ));
        }
    }

    lines.join("\n")
}

impl NotifyChannel for TelegramChannel {
    fn name(&self) -> &'static str {
        "telegram"
    }

    fn is_configured(&self) -> bool {
        self.config.enabled
            && !self.config.bot_token.is_empty()
            && self.config.chat_ids.iter().any(|id| !id.is_empty())
    }

    async fn send(&self, data: &NotificationData) -> Result<(), AppError> {
        if !self.is_configured() {
            return Err(AppError::NotifyError(
                "telegram channel is not configured".to_string(),
            ));
        }

        let message = build_message(&self.config, data);
        let url = format!(
            "{}/bot{}/sendMessage",
            TELEGRAM_API_BASE, self.config.bot_token
        );

        let mut delivered = 0usize;
        for chat_id in &self.config.chat_ids {
            if chat_id.is_empty() {
                continue;
            }
            match self.deliver(&url, chat_id, &message).await {
                Ok(()) => {
                    delivered += 1;
                    debug!(chat_id = %chat_id, "notification delivered");
                }
                Err(err) => {
                    // One unreachable chat must not block the rest.
                    error!(chat_id = %chat_id, error = %err, "failed to deliver notification");
                }
            }
        }

        if delivered == 0 {
            return Err(AppError::NotifyError(
                "no Telegram chat accepted the message".to_string(),
            ));
        }
        Ok(())
    }
}
