// service/audit_service.rs
use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    db::{auditdb::AuditExt, db::DBClient},
    service::{
        effects::{AuditEntry, AuditSink},
        error::ServiceError,
    },
};

#[derive(Debug, Clone)]
pub struct AuditService {
    db_client: Option<Arc<DBClient>>,
}

impl AuditService {
    pub fn new(db_client: Option<Arc<DBClient>>) -> Self {
        Self { db_client }
    }
}

#[async_trait]
impl AuditSink for AuditService {
    async fn record(&self, entry: &AuditEntry) -> Result<(), ServiceError> {
        tracing::info!(
            actor = %entry.actor_id,
            entity = %entry.entity_id,
            "audit: {} on {}",
            entry.action,
            entry.entity_type
        );

        if let Some(db_client) = &self.db_client {
            db_client
                .insert_audit_log(entry)
                .await
                .map_err(|e| ServiceError::Audit(e.to_string()))?;
        }

        Ok(())
    }
}
