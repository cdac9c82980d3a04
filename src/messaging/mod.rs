// Messaging - notifications from the render worker

pub mod channels;
pub mod notification;

pub use channels::{NotificationConsumer, NotificationProducer, create_notification_channel};
pub use notification::{Notification, NotificationLevel, RenderStatus};
