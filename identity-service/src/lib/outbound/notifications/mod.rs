mod kafka;
mod logging;
mod messages;

pub use kafka::KafkaNotificationDispatcher;
pub use logging::LoggingNotificationDispatcher;
pub use messages::NotificationMessage;
