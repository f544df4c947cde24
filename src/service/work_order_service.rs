// service/work_order_service.rs
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde_json::json;
use uuid::Uuid;

use crate::{
    db::ledgerdb::{LedgerStore, LedgerTx},
    models::{
        technicianmodel::{RateProfile, Technician},
        usermodel::{Actor, UserRole},
        workordermodel::*,
    },
    service::{
        access::require_role,
        commission_service::validate_rate,
        effects::{EffectDispatcher, Effects, NotificationType},
        error::ServiceError,
    },
};

const DISPATCH_ROLES: &[UserRole] = &[UserRole::Dispatcher, UserRole::Admin];
const TECHNICIAN_ROLES: &[UserRole] = &[UserRole::Technician];

#[derive(Debug, Clone)]
pub struct CompletionReport {
    pub notes: Option<String>,
    pub photos: Vec<String>,
    pub materials: Vec<MaterialLine>,
}

#[derive(Clone)]
pub struct WorkOrderService {
    store: Arc<dyn LedgerStore>,
    dispatcher: EffectDispatcher,
    response_window: Duration,
}

impl WorkOrderService {
    pub fn new(store: Arc<dyn LedgerStore>, dispatcher: EffectDispatcher, response_window: Duration) -> Self {
        Self {
            store,
            dispatcher,
            response_window,
        }
    }

    /// Loads and locks a work order, first resolving an elapsed response
    /// window. Returns the technician whose offer lapsed, if any.
    async fn lock(
        &self,
        tx: &mut dyn LedgerTx,
        work_order_id: Uuid,
        now: DateTime<Utc>,
        effects: &mut Effects,
    ) -> Result<(WorkOrder, Option<Uuid>), ServiceError> {
        let mut work_order = tx
            .work_order_for_update(work_order_id)
            .await?
            .ok_or(ServiceError::WorkOrderNotFound(work_order_id))?;

        let lapsed = work_order.expire_response_if_due(now);
        if let Some(technician_id) = lapsed {
            tx.update_work_order(&work_order).await?;
            tracing::info!(
                "Response window for work order {} lapsed; technician {} released",
                work_order.number,
                technician_id
            );

            effects.audit(
                Uuid::nil(),
                "work_order.assignment_expired",
                "work_order",
                work_order.id,
                json!({ "technician_id": technician_id }),
            );
            effects.notify(
                technician_id,
                NotificationType::AssignmentExpired,
                "Assignment expired",
                format!("You did not respond to work order {} in time", work_order.number),
                json!({ "work_order_id": work_order.id }),
            );
            effects.notify(
                work_order.dispatcher_id,
                NotificationType::AssignmentExpired,
                "Assignment expired",
                format!("Work order {} is unassigned again", work_order.number),
                json!({ "work_order_id": work_order.id, "technician_id": technician_id }),
            );
        }

        Ok((work_order, lapsed))
    }

    /// Rejects the operation while keeping a lazily applied expiry.
    async fn abort<T>(
        &self,
        tx: Box<dyn LedgerTx>,
        lapsed: Option<Uuid>,
        effects: Effects,
        error: ServiceError,
    ) -> Result<T, ServiceError> {
        if lapsed.is_some() {
            tx.commit().await?;
            self.dispatcher.dispatch(effects);
        }
        Err(error)
    }

    async fn save(
        &self,
        mut tx: Box<dyn LedgerTx>,
        work_order: &WorkOrder,
        effects: Effects,
    ) -> Result<(), ServiceError> {
        tx.update_work_order(work_order).await?;
        tx.commit().await?;
        self.dispatcher.dispatch(effects);
        Ok(())
    }

    pub async fn create(
        &self,
        actor: &Actor,
        customer_id: Uuid,
        summary: String,
        scheduled_at: Option<DateTime<Utc>>,
    ) -> Result<WorkOrder, ServiceError> {
        require_role(actor, DISPATCH_ROLES, "create work orders")?;

        let now = Utc::now();
        let work_order = WorkOrder::new(customer_id, actor.user_id, summary, scheduled_at, now);

        let mut tx = self.store.begin().await?;
        tx.insert_work_order(&work_order).await?;
        tx.commit().await?;

        tracing::info!("Created work order {} for customer {}", work_order.number, customer_id);

        let mut effects = Effects::new();
        effects.audit(actor.user_id, "work_order.create", "work_order", work_order.id, json!({
            "number": work_order.number,
            "customer_id": customer_id,
        }));
        self.dispatcher.dispatch(effects);

        Ok(work_order)
    }

    pub async fn get(&self, actor: &Actor, work_order_id: Uuid) -> Result<WorkOrder, ServiceError> {
        let now = Utc::now();
        let mut effects = Effects::new();
        let mut tx = self.store.begin().await?;
        let (work_order, lapsed) = self.lock(tx.as_mut(), work_order_id, now, &mut effects).await?;

        let visible = match actor.role {
            UserRole::Admin | UserRole::Dispatcher => true,
            UserRole::Technician => work_order.is_owned_by(actor.user_id),
            UserRole::Customer => work_order.customer_id == actor.user_id,
        };

        if !visible {
            return self
                .abort(tx, lapsed, effects, ServiceError::Ownership(actor.user_id, work_order_id))
                .await;
        }

        if lapsed.is_some() {
            tx.commit().await?;
            self.dispatcher.dispatch(effects);
        }

        Ok(work_order)
    }

    pub async fn assign(
        &self,
        actor: &Actor,
        work_order_id: Uuid,
        technician_id: Uuid,
    ) -> Result<WorkOrder, ServiceError> {
        require_role(actor, DISPATCH_ROLES, "assign work orders")?;

        let now = Utc::now();
        let mut effects = Effects::new();
        let mut tx = self.store.begin().await?;
        let (mut work_order, lapsed) = self.lock(tx.as_mut(), work_order_id, now, &mut effects).await?;

        let technician = match tx.technician(technician_id).await? {
            Some(technician) => technician,
            None => {
                return self
                    .abort(tx, lapsed, effects, ServiceError::TechnicianNotFound(technician_id))
                    .await
            }
        };

        if technician.is_blocked {
            return self
                .abort(tx, lapsed, effects, ServiceError::TechnicianBlocked(technician_id))
                .await;
        }

        let withdrawn = match work_order.assign(technician_id, now, self.response_window) {
            Ok(withdrawn) => withdrawn,
            Err(e) => return self.abort(tx, lapsed, effects, e).await,
        };

        effects.audit(actor.user_id, "work_order.assign", "work_order", work_order.id, json!({
            "technician_id": technician_id,
            "withdrawn_from": withdrawn,
            "response_deadline": work_order.response_deadline,
        }));
        effects.notify(
            technician_id,
            NotificationType::WorkOrderAssigned,
            "New work order",
            format!("Work order {} has been assigned to you", work_order.number),
            json!({
                "work_order_id": work_order.id,
                "response_deadline": work_order.response_deadline,
            }),
        );
        if let Some(previous) = withdrawn {
            effects.notify(
                previous,
                NotificationType::AssignmentWithdrawn,
                "Assignment withdrawn",
                format!("Work order {} was reassigned", work_order.number),
                json!({ "work_order_id": work_order.id }),
            );
        }

        self.save(tx, &work_order, effects).await?;
        tracing::info!("Work order {} assigned to technician {}", work_order.number, technician_id);

        Ok(work_order)
    }

    pub async fn respond(
        &self,
        actor: &Actor,
        work_order_id: Uuid,
        action: RespondAction,
    ) -> Result<WorkOrder, ServiceError> {
        require_role(actor, TECHNICIAN_ROLES, "respond to work orders")?;

        let now = Utc::now();
        let mut effects = Effects::new();
        let mut tx = self.store.begin().await?;
        let (mut work_order, lapsed) = self.lock(tx.as_mut(), work_order_id, now, &mut effects).await?;

        if lapsed == Some(actor.user_id) {
            return self
                .abort(tx, lapsed, effects, ServiceError::DeadlineExpired(work_order_id))
                .await;
        }

        if let Err(e) = work_order.respond(actor.user_id, action, now) {
            return self.abort(tx, lapsed, effects, e).await;
        }

        let (notification_type, verb) = match action {
            RespondAction::Accept => (NotificationType::WorkOrderAccepted, "accepted"),
            RespondAction::Decline => (NotificationType::WorkOrderDeclined, "declined"),
        };

        effects.audit(actor.user_id, "work_order.respond", "work_order", work_order.id, json!({
            "action": action,
        }));
        effects.notify(
            work_order.dispatcher_id,
            notification_type,
            format!("Work order {}", verb),
            format!("Work order {} was {} by the technician", work_order.number, verb),
            json!({ "work_order_id": work_order.id, "technician_id": actor.user_id }),
        );

        self.save(tx, &work_order, effects).await?;
        tracing::info!("Technician {} {} work order {}", actor.user_id, verb, work_order.number);

        Ok(work_order)
    }

    pub async fn start(
        &self,
        actor: &Actor,
        work_order_id: Uuid,
        location: GeoPoint,
    ) -> Result<WorkOrder, ServiceError> {
        require_role(actor, TECHNICIAN_ROLES, "start work orders")?;

        let now = Utc::now();
        let mut effects = Effects::new();
        let mut tx = self.store.begin().await?;
        let (mut work_order, lapsed) = self.lock(tx.as_mut(), work_order_id, now, &mut effects).await?;

        if let Err(e) = work_order.start(actor.user_id, location, now) {
            return self.abort(tx, lapsed, effects, e).await;
        }

        effects.audit(actor.user_id, "work_order.start", "work_order", work_order.id, json!({
            "latitude": location.latitude,
            "longitude": location.longitude,
        }));
        effects.notify(
            work_order.customer_id,
            NotificationType::WorkOrderStarted,
            "Technician on site",
            format!("Work on {} has started", work_order.number),
            json!({ "work_order_id": work_order.id }),
        );

        self.save(tx, &work_order, effects).await?;
        tracing::info!("Work order {} started", work_order.number);

        Ok(work_order)
    }

    pub async fn complete(
        &self,
        actor: &Actor,
        work_order_id: Uuid,
        report: CompletionReport,
    ) -> Result<WorkOrder, ServiceError> {
        require_role(actor, TECHNICIAN_ROLES, "complete work orders")?;

        let now = Utc::now();
        let mut effects = Effects::new();
        let mut tx = self.store.begin().await?;
        let (mut work_order, lapsed) = self.lock(tx.as_mut(), work_order_id, now, &mut effects).await?;

        let photo_count = report.photos.len();
        if let Err(e) = work_order.complete(actor.user_id, report.notes, report.photos, report.materials, now) {
            return self.abort(tx, lapsed, effects, e).await;
        }

        effects.audit(actor.user_id, "work_order.complete", "work_order", work_order.id, json!({
            "photos": photo_count,
            "materials": work_order.materials.0.len(),
        }));
        for recipient in [work_order.customer_id, work_order.dispatcher_id] {
            effects.notify(
                recipient,
                NotificationType::WorkOrderCompleted,
                "Work completed",
                format!("Work order {} is complete and awaiting payment", work_order.number),
                json!({ "work_order_id": work_order.id }),
            );
        }

        self.save(tx, &work_order, effects).await?;
        tracing::info!("Work order {} completed, awaiting payment", work_order.number);

        Ok(work_order)
    }

    pub async fn cancel(
        &self,
        actor: &Actor,
        work_order_id: Uuid,
        reason: String,
    ) -> Result<WorkOrder, ServiceError> {
        require_role(actor, DISPATCH_ROLES, "cancel work orders")?;

        let now = Utc::now();
        let mut effects = Effects::new();
        let mut tx = self.store.begin().await?;
        let (mut work_order, lapsed) = self.lock(tx.as_mut(), work_order_id, now, &mut effects).await?;

        let technician = match work_order.cancel(reason.clone(), now) {
            Ok(technician) => technician,
            Err(e) => return self.abort(tx, lapsed, effects, e).await,
        };

        effects.audit(actor.user_id, "work_order.cancel", "work_order", work_order.id, json!({
            "reason": reason,
        }));
        for recipient in technician.into_iter().chain([work_order.customer_id]) {
            effects.notify(
                recipient,
                NotificationType::WorkOrderCancelled,
                "Work order cancelled",
                format!("Work order {} was cancelled", work_order.number),
                json!({ "work_order_id": work_order.id, "reason": reason }),
            );
        }

        self.save(tx, &work_order, effects).await?;
        tracing::info!("Work order {} cancelled", work_order.number);

        Ok(work_order)
    }

    /// Resolves every elapsed response window. Only an optimisation: each
    /// operation also resolves its own work order lazily.
    pub async fn sweep_expired_assignments(&self) -> Result<usize, ServiceError> {
        let now = Utc::now();
        let candidates = {
            let mut tx = self.store.begin().await?;
            tx.expired_assignments(now).await?
        };

        let mut released = 0;
        for work_order_id in candidates {
            let mut effects = Effects::new();
            let mut tx = self.store.begin().await?;
            let (_, lapsed) = self.lock(tx.as_mut(), work_order_id, now, &mut effects).await?;

            if lapsed.is_some() {
                tx.commit().await?;
                self.dispatcher.dispatch(effects);
                released += 1;
            }
        }

        Ok(released)
    }

    pub async fn upsert_technician(
        &self,
        actor: &Actor,
        technician_id: Uuid,
        profile: RateProfile,
        is_blocked: bool,
    ) -> Result<Technician, ServiceError> {
        require_role(actor, &[UserRole::Admin], "manage technicians")?;
        validate_rate(profile.rate())?;

        if let RateProfile::Internal { base_salary, .. } = &profile {
            if *base_salary < 0 {
                return Err(ServiceError::Validation("base salary cannot be negative".to_string()));
            }
        }

        let now = Utc::now();
        let mut tx = self.store.begin().await?;
        let created_at = tx
            .technician(technician_id)
            .await?
            .map(|existing| existing.created_at)
            .unwrap_or(now);

        let technician = Technician {
            id: technician_id,
            profile,
            is_blocked,
            created_at,
            updated_at: now,
        };

        tx.upsert_technician(&technician).await?;
        tx.commit().await?;

        let mut effects = Effects::new();
        effects.audit(actor.user_id, "technician.upsert", "technician", technician_id, json!({
            "kind": technician.profile.kind(),
            "is_blocked": is_blocked,
        }));
        self.dispatcher.dispatch(effects);

        Ok(technician)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::test_support::Harness;

    #[tokio::test]
    async fn decline_then_reassign_to_another_technician() {
        let h = Harness::new();
        let first = h.freelancer("0.20").await;
        let second = h.freelancer("0.20").await;
        let wo = h.new_work_order().await;

        h.work_orders.assign(&h.dispatcher, wo.id, first).await.unwrap();
        let declined = h
            .work_orders
            .respond(&Harness::technician(first), wo.id, RespondAction::Decline)
            .await
            .unwrap();
        assert_eq!(declined.status, WorkOrderStatus::Unassigned);
        assert_eq!(declined.technician_id, None);

        let reassigned = h.work_orders.assign(&h.dispatcher, wo.id, second).await.unwrap();
        assert_eq!(reassigned.status, WorkOrderStatus::Assigned);
        assert_eq!(reassigned.technician_id, Some(second));
    }

    #[tokio::test]
    async fn responding_after_deadline_fails_and_leaves_work_order_unassigned() {
        let h = Harness::new();
        let tech = h.freelancer("0.20").await;
        let wo = h.new_work_order().await;

        h.work_orders.assign(&h.dispatcher, wo.id, tech).await.unwrap();
        h.expire_deadline(wo.id).await;

        let result = h
            .work_orders
            .respond(&Harness::technician(tech), wo.id, RespondAction::Accept)
            .await;
        assert!(matches!(result, Err(ServiceError::DeadlineExpired(_))));

        let stored = h.work_orders.get(&h.dispatcher, wo.id).await.unwrap();
        assert_eq!(stored.status, WorkOrderStatus::Unassigned);
        assert_eq!(stored.technician_id, None);
    }

    #[tokio::test]
    async fn blocked_technicians_cannot_be_assigned() {
        let h = Harness::new();
        let tech = h.freelancer("0.20").await;
        h.block(tech).await;
        let wo = h.new_work_order().await;

        let result = h.work_orders.assign(&h.dispatcher, wo.id, tech).await;
        assert!(matches!(result, Err(ServiceError::TechnicianBlocked(_))));
    }

    #[tokio::test]
    async fn unknown_work_order_is_not_found() {
        let h = Harness::new();
        let tech = h.freelancer("0.20").await;

        let result = h.work_orders.assign(&h.dispatcher, Uuid::new_v4(), tech).await;
        assert!(matches!(result, Err(ServiceError::WorkOrderNotFound(_))));
    }

    #[tokio::test]
    async fn technicians_cannot_assign_work() {
        let h = Harness::new();
        let tech = h.freelancer("0.20").await;
        let wo = h.new_work_order().await;

        let result = h.work_orders.assign(&Harness::technician(tech), wo.id, tech).await;
        assert!(matches!(result, Err(ServiceError::PermissionDenied(UserRole::Technician, _))));
    }

    #[tokio::test]
    async fn full_lifecycle_up_to_payment() {
        let h = Harness::new();
        let tech = h.freelancer("0.20").await;
        let wo = h.completed_work_order(tech).await;

        assert_eq!(wo.status, WorkOrderStatus::CompletedPendingPayment);
        assert_eq!(wo.completion_photos.len(), 1);
        assert!(wo.started_at.is_some());
    }

    #[tokio::test]
    async fn another_technician_cannot_start_the_job() {
        let h = Harness::new();
        let tech = h.freelancer("0.20").await;
        let stranger = h.freelancer("0.20").await;
        let wo = h.new_work_order().await;

        h.work_orders.assign(&h.dispatcher, wo.id, tech).await.unwrap();
        h.work_orders
            .respond(&Harness::technician(tech), wo.id, RespondAction::Accept)
            .await
            .unwrap();

        let location = GeoPoint { latitude: 6.45, longitude: 3.39 };
        let result = h.work_orders.start(&Harness::technician(stranger), wo.id, location).await;
        assert!(matches!(result, Err(ServiceError::Ownership(_, _))));
    }

    #[tokio::test]
    async fn cancelled_work_order_is_terminal() {
        let h = Harness::new();
        let tech = h.freelancer("0.20").await;
        let wo = h.new_work_order().await;

        let cancelled = h
            .work_orders
            .cancel(&h.dispatcher, wo.id, "duplicate request".into())
            .await
            .unwrap();
        assert_eq!(cancelled.status, WorkOrderStatus::Cancelled);

        let result = h.work_orders.assign(&h.dispatcher, wo.id, tech).await;
        assert!(matches!(result, Err(ServiceError::StateConflict(_))));
    }

    #[tokio::test]
    async fn sweep_releases_expired_offers() {
        let h = Harness::new();
        let tech = h.freelancer("0.20").await;
        let expired = h.new_work_order().await;
        let fresh = h.new_work_order().await;

        h.work_orders.assign(&h.dispatcher, expired.id, tech).await.unwrap();
        h.work_orders.assign(&h.dispatcher, fresh.id, tech).await.unwrap();
        h.expire_deadline(expired.id).await;

        assert_eq!(h.work_orders.sweep_expired_assignments().await.unwrap(), 1);
        assert_eq!(
            h.work_orders.get(&h.dispatcher, fresh.id).await.unwrap().status,
            WorkOrderStatus::Assigned
        );
    }

    #[tokio::test]
    async fn notifier_failure_does_not_undo_a_transition() {
        let h = Harness::with_failing_effects();
        let tech = h.freelancer("0.20").await;
        let wo = h.new_work_order().await;

        h.work_orders.assign(&h.dispatcher, wo.id, tech).await.unwrap();

        let stored = h.work_orders.get(&h.dispatcher, wo.id).await.unwrap();
        assert_eq!(stored.status, WorkOrderStatus::Assigned);
    }
}
