// service/effects.rs
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::error::ServiceError;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    WorkOrderAssigned,
    AssignmentWithdrawn,
    AssignmentExpired,
    WorkOrderAccepted,
    WorkOrderDeclined,
    WorkOrderStarted,
    WorkOrderCompleted,
    WorkOrderCancelled,
    PaymentSubmitted,
    PaymentVerified,
    PaymentRejected,
    CommissionEarned,
    PayoutRequested,
    PayoutApproved,
    PayoutRejected,
    PayoutScheduled,
    PayoutCompleted,
}

impl NotificationType {
    pub fn to_str(&self) -> &str {
        match self {
            NotificationType::WorkOrderAssigned => "work_order_assigned",
            NotificationType::AssignmentWithdrawn => "assignment_withdrawn",
            NotificationType::AssignmentExpired => "assignment_expired",
            NotificationType::WorkOrderAccepted => "work_order_accepted",
            NotificationType::WorkOrderDeclined => "work_order_declined",
            NotificationType::WorkOrderStarted => "work_order_started",
            NotificationType::WorkOrderCompleted => "work_order_completed",
            NotificationType::WorkOrderCancelled => "work_order_cancelled",
            NotificationType::PaymentSubmitted => "payment_submitted",
            NotificationType::PaymentVerified => "payment_verified",
            NotificationType::PaymentRejected => "payment_rejected",
            NotificationType::CommissionEarned => "commission_earned",
            NotificationType::PayoutRequested => "payout_requested",
            NotificationType::PayoutApproved => "payout_approved",
            NotificationType::PayoutRejected => "payout_rejected",
            NotificationType::PayoutScheduled => "payout_scheduled",
            NotificationType::PayoutCompleted => "payout_completed",
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Notification {
    pub user_id: Uuid,
    pub notification_type: NotificationType,
    pub title: String,
    pub body: String,
    pub data: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AuditEntry {
    pub actor_id: Uuid,
    pub action: String,
    pub entity_type: String,
    pub entity_id: Uuid,
    pub metadata: serde_json::Value,
    pub recorded_at: DateTime<Utc>,
}

/// Notifications and audit entries produced by one operation. They are only
/// delivered after the operation's transaction has committed.
#[derive(Debug, Default)]
pub struct Effects {
    pub notifications: Vec<Notification>,
    pub audits: Vec<AuditEntry>,
}

impl Effects {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notify(
        &mut self,
        user_id: Uuid,
        notification_type: NotificationType,
        title: impl Into<String>,
        body: impl Into<String>,
        data: serde_json::Value,
    ) {
        self.notifications.push(Notification {
            user_id,
            notification_type,
            title: title.into(),
            body: body.into(),
            data,
        });
    }

    pub fn audit(
        &mut self,
        actor_id: Uuid,
        action: &str,
        entity_type: &str,
        entity_id: Uuid,
        metadata: serde_json::Value,
    ) {
        self.audits.push(AuditEntry {
            actor_id,
            action: action.to_string(),
            entity_type: entity_type.to_string(),
            entity_id,
            metadata,
            recorded_at: Utc::now(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.notifications.is_empty() && self.audits.is_empty()
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: &Notification) -> Result<(), ServiceError>;
}

#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, entry: &AuditEntry) -> Result<(), ServiceError>;
}

/// Delivers committed effects on a background task. Delivery failures are
/// logged and never reach the caller.
#[derive(Clone)]
pub struct EffectDispatcher {
    notifier: Arc<dyn Notifier>,
    audit_sink: Arc<dyn AuditSink>,
}

impl std::fmt::Debug for EffectDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EffectDispatcher").finish_non_exhaustive()
    }
}

impl EffectDispatcher {
    pub fn new(notifier: Arc<dyn Notifier>, audit_sink: Arc<dyn AuditSink>) -> Self {
        Self { notifier, audit_sink }
    }

    pub fn dispatch(&self, effects: Effects) -> Option<JoinHandle<()>> {
        if effects.is_empty() {
            return None;
        }

        let dispatcher = self.clone();
        Some(tokio::spawn(async move {
            dispatcher.deliver(effects).await;
        }))
    }

    pub async fn deliver(&self, effects: Effects) {
        for entry in &effects.audits {
            if let Err(e) = self.audit_sink.record(entry).await {
                tracing::warn!(
                    "Failed to record audit entry {} for {} {}: {}",
                    entry.action,
                    entry.entity_type,
                    entry.entity_id,
                    e
                );
            }
        }

        let results = join_all(
            effects
                .notifications
                .iter()
                .map(|notification| self.notifier.notify(notification)),
        )
        .await;

        for (notification, result) in effects.notifications.iter().zip(results) {
            if let Err(e) = result {
                tracing::warn!(
                    "Failed to deliver {} notification to {}: {}",
                    notification.notification_type.to_str(),
                    notification.user_id,
                    e
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::test_support::{FailingSink, RecordingNotifier};
    use serde_json::json;

    #[tokio::test]
    async fn failing_audit_sink_does_not_stop_notifications() {
        let notifier = Arc::new(RecordingNotifier::default());
        let dispatcher = EffectDispatcher::new(notifier.clone(), Arc::new(FailingSink));

        let mut effects = Effects::new();
        let user = Uuid::new_v4();
        effects.audit(user, "assign", "work_order", Uuid::new_v4(), json!({}));
        effects.notify(user, NotificationType::WorkOrderAssigned, "t", "b", json!({}));

        dispatcher.deliver(effects).await;

        assert_eq!(notifier.sent().len(), 1);
    }

    #[tokio::test]
    async fn empty_effects_spawn_nothing() {
        let dispatcher = EffectDispatcher::new(
            Arc::new(RecordingNotifier::default()),
            Arc::new(FailingSink),
        );

        assert!(dispatcher.dispatch(Effects::new()).is_none());
    }
}
