// db/auditdb.rs
use async_trait::async_trait;
use sqlx::Error;
use uuid::Uuid;

use super::db::DBClient;
use crate::service::effects::{AuditEntry, Notification};

#[async_trait]
pub trait AuditExt {
    async fn insert_audit_log(&self, entry: &AuditEntry) -> Result<(), Error>;
    async fn insert_notification(&self, notification: &Notification) -> Result<Uuid, Error>;
}

#[async_trait]
impl AuditExt for DBClient {
    async fn insert_audit_log(&self, entry: &AuditEntry) -> Result<(), Error> {
        sqlx::query(
            r#"
            INSERT INTO audit_logs (actor_id, action, entity_type, entity_id, metadata, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(entry.actor_id)
        .bind(&entry.action)
        .bind(&entry.entity_type)
        .bind(entry.entity_id)
        .bind(&entry.metadata)
        .bind(entry.recorded_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn insert_notification(&self, notification: &Notification) -> Result<Uuid, Error> {
        let id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO notifications (user_id, notification_type, title, body, data)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(notification.user_id)
        .bind(notification.notification_type.to_str())
        .bind(&notification.title)
        .bind(&notification.body)
        .bind(&notification.data)
        .fetch_one(&self.pool)
        .await?;

        Ok(id)
    }
}
