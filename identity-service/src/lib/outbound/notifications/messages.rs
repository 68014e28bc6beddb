use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::domain::auth::models::NotificationTemplate;

/// Serializable envelope consumed by the mail delivery pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NotificationMessage {
    pub message_id: String,
    pub recipient: String,
    /// Template name, e.g. `password_reset`
    pub template: String,
    pub payload: Value,
    pub created_at: DateTime<Utc>,
}

impl NotificationMessage {
    pub fn new(recipient: &str, template: NotificationTemplate, payload: Value) -> Self {
        Self {
            message_id: Uuid::new_v4().to_string(),
            recipient: recipient.to_string(),
            template: template.as_str().to_string(),
            payload,
            created_at: Utc::now(),
        }
    }
}
