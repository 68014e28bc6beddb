use async_trait::async_trait;
use serde_json::Value;

use crate::auth::errors::NotificationError;
use crate::auth::ports::NotificationDispatcher;
use crate::domain::auth::models::NotificationTemplate;

/// Dispatcher used when no broker is configured: records the send in the
/// log without the payload, which carries secrets.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingNotificationDispatcher;

#[async_trait]
impl NotificationDispatcher for LoggingNotificationDispatcher {
    async fn send(
        &self,
        _recipient: &str,
        template: NotificationTemplate,
        _payload: Value,
    ) -> Result<(), NotificationError> {
        tracing::info!(
            template = template.as_str(),
            "Notification not delivered: no broker configured"
        );
        Ok(())
    }
}
