// src/notification.rs

use std::fs;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::AppConfig;
use crate::shift_catalog::WorkMode;
use crate::time_utils::format_date_short;

/// Mention target that expands to every configured manager.
pub const MENTION_ALL_MANAGERS: &str = "@All管理職";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const ERROR_BODY_LIMIT: usize = 200;

#[derive(Error, Debug)]
pub enum NotificationError {
    #[error("Failed to send notification: {0}")]
    SendError(String),
    #[error("Invalid notification target: {0}")]
    InvalidTarget(String),
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },
}

// --- Events ---

/// Details the operator gives when clocking out.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClockOutInfo {
    pub next_workday: Option<NaiveDate>,
    pub next_shift: String,
    pub next_work_mode: Option<WorkMode>,
    /// Manager name, [`MENTION_ALL_MANAGERS`], or empty for none.
    pub mention: String,
    pub comment: String,
}

impl ClockOutInfo {
    /// Comment as posted and written to the remark column. A mention without
    /// a comment posts `-` so the mention still has a body.
    pub fn effective_comment(&self) -> String {
        let blank = self.comment.trim().is_empty();
        if blank && !self.mention.trim().is_empty() {
            "-".to_string()
        } else if blank {
            String::new()
        } else {
            self.comment.clone()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationEvent {
    ClockIn { work_mode: WorkMode, comment: String },
    ClockOut(ClockOutInfo),
}

// --- Payload ---

/// Teams ids to mention for `mention`. Managers without an id are skipped.
pub fn mention_ids(config: &AppConfig, mention: &str) -> Vec<String> {
    let mention = mention.trim();
    if mention.is_empty() {
        return Vec::new();
    }
    if mention == MENTION_ALL_MANAGERS {
        return config
            .managers
            .iter()
            .filter(|m| !m.teams_id.is_empty())
            .map(|m| m.teams_id.clone())
            .collect();
    }
    config
        .find_manager(mention)
        .filter(|m| !m.teams_id.is_empty())
        .map(|m| vec![m.teams_id.clone()])
        .unwrap_or_default()
}

fn column_block(user_name: &str, action: &str) -> Value {
    json!({
        "type": "Column",
        "width": "stretch",
        "items": [{
            "type": "TextBlock",
            "text": format!("{}が{}しました", user_name, action),
            "size": "Medium",
            "wrap": true,
            "weight": "Bolder",
            "verticalContentAlignment": "Center"
        }]
    })
}

/// `{}` without a comment. Spacing is tighter when the comment follows a mention.
fn comment_block(comment: &str, has_mentions: bool) -> Value {
    if comment.trim().is_empty() {
        return json!({});
    }
    let text = format!("コメント: {}", comment);
    if has_mentions {
        json!({ "type": "TextBlock", "text": text, "wrap": true, "spacing": "None" })
    } else {
        json!({
            "type": "TextBlock",
            "text": text,
            "wrap": true,
            "spacing": "Small",
            "separator": true
        })
    }
}

/// The webhook flow expects the card fragments as JSON strings.
fn assemble(user_id: &str, column: &Value, message: &Value, comment: &Value, mentions: Vec<String>) -> Value {
    json!({
        "mention_data": mentions,
        "userId": user_id,
        "column": column.to_string(),
        "message": message.to_string(),
        "comment": comment.to_string(),
    })
}

pub fn build_payload(config: &AppConfig, event: &NotificationEvent) -> Value {
    match event {
        NotificationEvent::ClockIn { work_mode, comment } => {
            let column = column_block(&config.display_name, "出勤");
            let message = json!({
                "type": "TextBlock",
                "text": format!("業務を開始します({})", work_mode),
                "size": "Medium",
                "wrap": true,
                "spacing": "None"
            });
            let comment = comment_block(comment, false);
            assemble(&config.teams_user_id, &column, &message, &comment, Vec::new())
        }
        NotificationEvent::ClockOut(info) => {
            let mentions = mention_ids(config, &info.mention);
            let next_date = info.next_workday.map(format_date_short).unwrap_or_default();
            let next_mode = info.next_work_mode.map(|m| m.label()).unwrap_or_default();

            let column = column_block(&config.display_name, "退勤");
            let comment = comment_block(&info.effective_comment(), !mentions.is_empty());

            let mut items = vec![
                json!({
                    "type": "TextBlock",
                    "text": format!(
                        "退勤します。次回は{} {}({})です。",
                        next_date, next_mode, info.next_shift
                    ),
                    "size": "Medium",
                    "wrap": true,
                    "spacing": "None"
                }),
                json!({
                    "type": "TextBlock",
                    "text": "お疲れさまでした。",
                    "wrap": true,
                    "spacing": "None"
                }),
            ];
            // Without mentions the comment goes inside the message card.
            if mentions.is_empty() && comment.as_object().is_some_and(|o| !o.is_empty()) {
                items.push(comment.clone());
            }
            let message = json!({ "type": "Container", "spacing": "None", "items": items });

            assemble(&config.teams_user_id, &column, &message, &comment, mentions)
        }
    }
}

// --- Notifier ---

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(
        &self,
        config: &AppConfig,
        event: &NotificationEvent,
    ) -> Result<(), NotificationError>;
}

/// Posts attendance events to a Teams workflow webhook.
pub struct TeamsWebhookNotifier {
    client: Client,
}

impl TeamsWebhookNotifier {
    pub fn new() -> Result<Self, NotificationError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| NotificationError::SendError(format!("HTTP client error: {}", e)))?;
        Ok(Self { client })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

fn save_debug_payload(config: &AppConfig, payload: &Value) {
    let Some(path) = &config.payload_debug_file else {
        return;
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        let _ = fs::create_dir_all(parent);
    }
    match serde_json::to_string_pretty(payload) {
        Ok(text) => {
            if let Err(e) = fs::write(path, text) {
                debug!("Could not write payload debug file {:?}: {}", path, e);
            }
        }
        Err(e) => debug!("Could not serialize payload for debugging: {}", e),
    }
}

#[async_trait]
impl Notifier for TeamsWebhookNotifier {
    async fn notify(
        &self,
        config: &AppConfig,
        event: &NotificationEvent,
    ) -> Result<(), NotificationError> {
        let target = config.webhook_url.trim();
        if target.is_empty() {
            debug!("Webhook URL not configured, skipping notification");
            return Ok(());
        }
        let url = url::Url::parse(target)
            .map_err(|e| NotificationError::InvalidTarget(format!("{}: {}", target, e)))?;

        let payload = build_payload(config, event);
        save_debug_payload(config, &payload);

        let response = self
            .client
            .post(url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| NotificationError::SendError(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if status != StatusCode::OK && status != StatusCode::ACCEPTED {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read response body".to_string());
            let body: String = body.chars().take(ERROR_BODY_LIMIT).collect();
            warn!("Webhook rejected notification: {} {}", status, body);
            return Err(NotificationError::Status {
                status: status.as_u16(),
                body,
            });
        }

        info!("Notification posted ({})", status);
        Ok(())
    }
}
