// service/notification_service.rs
use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    db::{auditdb::AuditExt, db::DBClient},
    service::{
        effects::{Notification, Notifier},
        error::ServiceError,
    },
};

/// Stores notifications for the delivery workers (push/SMS live outside this
/// service). Without a database the notification is only logged.
#[derive(Debug, Clone)]
pub struct NotificationService {
    db_client: Option<Arc<DBClient>>,
}

impl NotificationService {
    pub fn new(db_client: Option<Arc<DBClient>>) -> Self {
        Self { db_client }
    }
}

#[async_trait]
impl Notifier for NotificationService {
    async fn notify(&self, notification: &Notification) -> Result<(), ServiceError> {
        tracing::info!(
            "Notification {} for user {}: {}",
            notification.notification_type.to_str(),
            notification.user_id,
            notification.title
        );

        if let Some(db_client) = &self.db_client {
            db_client
                .insert_notification(notification)
                .await
                .map_err(|e| ServiceError::Notification(e.to_string()))?;
        }

        Ok(())
    }
}
