// service/work_order_machine.rs
use chrono::{DateTime, Duration, Utc};
use sqlx::types::Json;
use uuid::Uuid;

use crate::{
    models::workordermodel::*,
    service::error::ServiceError,
};

/// Edges of the work order lifecycle. DECLINE and deadline expiry lead back to
/// UNASSIGNED; PAID_VERIFIED and CANCELLED are terminal.
pub fn is_valid_transition(from: WorkOrderStatus, to: WorkOrderStatus) -> bool {
    use WorkOrderStatus::*;

    matches!(
        (from, to),
        (Unassigned, Assigned)
            | (Unassigned, Cancelled)
            | (Assigned, Assigned)
            | (Assigned, Accepted)
            | (Assigned, Unassigned)
            | (Assigned, Cancelled)
            | (Accepted, InProgress)
            | (Accepted, Cancelled)
            | (InProgress, CompletedPendingPayment)
            | (InProgress, Cancelled)
            | (CompletedPendingPayment, PaidVerified)
    )
}

impl WorkOrder {
    fn transition(&mut self, to: WorkOrderStatus, now: DateTime<Utc>) -> Result<(), ServiceError> {
        if !is_valid_transition(self.status, to) {
            return Err(ServiceError::StateConflict(format!(
                "work order {} cannot move from {:?} to {:?}",
                self.number, self.status, to
            )));
        }

        self.status = to;
        self.updated_at = now;
        Ok(())
    }

    fn ensure_owner(&self, technician_id: Uuid) -> Result<(), ServiceError> {
        if !self.is_owned_by(technician_id) {
            return Err(ServiceError::Ownership(technician_id, self.id));
        }
        Ok(())
    }

    fn ensure_status(&self, expected: WorkOrderStatus) -> Result<(), ServiceError> {
        if self.status != expected {
            return Err(ServiceError::StateConflict(format!(
                "work order {} is {:?}, expected {:?}",
                self.number, self.status, expected
            )));
        }
        Ok(())
    }

    fn release_technician(&mut self) -> Option<Uuid> {
        self.assigned_at = None;
        self.response_deadline = None;
        self.technician_id.take()
    }

    pub fn response_window_elapsed(&self, now: DateTime<Utc>) -> bool {
        self.status == WorkOrderStatus::Assigned
            && self.response_deadline.map_or(false, |deadline| now > deadline)
    }

    /// Sends an assignment whose response window has elapsed back to
    /// UNASSIGNED. Returns the technician whose offer lapsed.
    pub fn expire_response_if_due(&mut self, now: DateTime<Utc>) -> Option<Uuid> {
        if !self.response_window_elapsed(now) {
            return None;
        }

        self.status = WorkOrderStatus::Unassigned;
        self.updated_at = now;
        self.release_technician()
    }

    /// Offers the work order to `technician_id`. Returns the technician whose
    /// pending offer was withdrawn, if this is a reassignment.
    pub fn assign(
        &mut self,
        technician_id: Uuid,
        now: DateTime<Utc>,
        response_window: Duration,
    ) -> Result<Option<Uuid>, ServiceError> {
        if !matches!(self.status, WorkOrderStatus::Unassigned | WorkOrderStatus::Assigned) {
            return Err(ServiceError::StateConflict(format!(
                "work order {} is {:?} and cannot be assigned",
                self.number, self.status
            )));
        }

        if self.is_owned_by(technician_id) {
            return Err(ServiceError::StateConflict(format!(
                "work order {} is already offered to technician {}",
                self.number, technician_id
            )));
        }

        self.transition(WorkOrderStatus::Assigned, now)?;
        let withdrawn = self.technician_id.replace(technician_id);
        self.assigned_at = Some(now);
        self.response_deadline = Some(now + response_window);

        Ok(withdrawn)
    }

    pub fn respond(
        &mut self,
        technician_id: Uuid,
        action: RespondAction,
        now: DateTime<Utc>,
    ) -> Result<(), ServiceError> {
        self.ensure_owner(technician_id)?;
        self.ensure_status(WorkOrderStatus::Assigned)?;

        if self.response_window_elapsed(now) {
            return Err(ServiceError::DeadlineExpired(self.id));
        }

        match action {
            RespondAction::Accept => {
                self.transition(WorkOrderStatus::Accepted, now)?;
                self.accepted_at = Some(now);
                self.response_deadline = None;
            }
            RespondAction::Decline => {
                self.transition(WorkOrderStatus::Unassigned, now)?;
                self.release_technician();
            }
        }

        Ok(())
    }

    pub fn start(
        &mut self,
        technician_id: Uuid,
        location: GeoPoint,
        now: DateTime<Utc>,
    ) -> Result<(), ServiceError> {
        if !location.is_valid() {
            return Err(ServiceError::Validation(format!(
                "invalid check-in coordinates ({}, {})",
                location.latitude, location.longitude
            )));
        }

        self.ensure_owner(technician_id)?;
        self.ensure_status(WorkOrderStatus::Accepted)?;
        self.transition(WorkOrderStatus::InProgress, now)?;

        self.started_at = Some(now);
        self.check_in_latitude = Some(location.latitude);
        self.check_in_longitude = Some(location.longitude);
        Ok(())
    }

    pub fn complete(
        &mut self,
        technician_id: Uuid,
        notes: Option<String>,
        photos: Vec<String>,
        materials: Vec<MaterialLine>,
        now: DateTime<Utc>,
    ) -> Result<(), ServiceError> {
        self.ensure_owner(technician_id)?;
        self.ensure_status(WorkOrderStatus::InProgress)?;
        self.transition(WorkOrderStatus::CompletedPendingPayment, now)?;

        self.completed_at = Some(now);
        self.completion_notes = notes;
        self.completion_photos = photos;
        self.materials = Json(materials);
        Ok(())
    }

    pub fn mark_paid(&mut self, now: DateTime<Utc>) -> Result<(), ServiceError> {
        self.ensure_status(WorkOrderStatus::CompletedPendingPayment)?;
        self.transition(WorkOrderStatus::PaidVerified, now)
    }

    /// Returns the technician who held the work order, if any.
    pub fn cancel(&mut self, reason: String, now: DateTime<Utc>) -> Result<Option<Uuid>, ServiceError> {
        self.transition(WorkOrderStatus::Cancelled, now)?;
        self.cancelled_at = Some(now);
        self.cancel_reason = Some(reason);
        self.response_deadline = None;
        Ok(self.technician_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn work_order() -> WorkOrder {
        WorkOrder::new(Uuid::new_v4(), Uuid::new_v4(), "Fix AC".to_string(), None, Utc::now())
    }

    fn lagos() -> GeoPoint {
        GeoPoint { latitude: 6.5244, longitude: 3.3792 }
    }

    #[test]
    fn happy_path_walks_the_whole_graph() {
        let now = Utc::now();
        let tech = Uuid::new_v4();
        let mut wo = work_order();

        assert_eq!(wo.assign(tech, now, Duration::minutes(30)).unwrap(), None);
        wo.respond(tech, RespondAction::Accept, now).unwrap();
        wo.start(tech, lagos(), now).unwrap();
        wo.complete(tech, Some("done".into()), vec!["p1.jpg".into()], vec![], now).unwrap();
        wo.mark_paid(now).unwrap();

        assert_eq!(wo.status, WorkOrderStatus::PaidVerified);
        assert_eq!(wo.check_in_latitude, Some(6.5244));
        assert!(wo.status.is_terminal());
    }

    #[test]
    fn decline_clears_technician_and_allows_reassignment() {
        let now = Utc::now();
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        let mut wo = work_order();

        wo.assign(first, now, Duration::minutes(30)).unwrap();
        wo.respond(first, RespondAction::Decline, now).unwrap();
        assert_eq!(wo.status, WorkOrderStatus::Unassigned);
        assert_eq!(wo.technician_id, None);
        assert_eq!(wo.response_deadline, None);

        wo.assign(second, now, Duration::minutes(30)).unwrap();
        assert!(wo.is_owned_by(second));
    }

    #[test]
    fn reassigning_a_pending_offer_reports_the_withdrawn_technician() {
        let now = Utc::now();
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        let mut wo = work_order();

        wo.assign(first, now, Duration::minutes(30)).unwrap();
        let withdrawn = wo.assign(second, now, Duration::minutes(30)).unwrap();

        assert_eq!(withdrawn, Some(first));
        assert!(wo.is_owned_by(second));
    }

    #[test]
    fn responding_after_the_window_is_rejected() {
        let now = Utc::now();
        let tech = Uuid::new_v4();
        let mut wo = work_order();
        wo.assign(tech, now, Duration::minutes(5)).unwrap();

        let later = now + Duration::minutes(6);
        let result = wo.respond(tech, RespondAction::Accept, later);
        assert!(matches!(result, Err(ServiceError::DeadlineExpired(_))));

        assert_eq!(wo.expire_response_if_due(later), Some(tech));
        assert_eq!(wo.status, WorkOrderStatus::Unassigned);
        assert_eq!(wo.technician_id, None);
    }

    #[test]
    fn expiry_is_a_no_op_inside_the_window() {
        let now = Utc::now();
        let mut wo = work_order();
        wo.assign(Uuid::new_v4(), now, Duration::minutes(5)).unwrap();

        assert_eq!(wo.expire_response_if_due(now + Duration::minutes(4)), None);
        assert_eq!(wo.status, WorkOrderStatus::Assigned);
    }

    #[test]
    fn only_the_owner_may_act() {
        let now = Utc::now();
        let tech = Uuid::new_v4();
        let stranger = Uuid::new_v4();
        let mut wo = work_order();
        wo.assign(tech, now, Duration::minutes(30)).unwrap();

        let result = wo.respond(stranger, RespondAction::Accept, now);
        assert!(matches!(result, Err(ServiceError::Ownership(_, _))));
    }

    #[test]
    fn start_requires_acceptance_and_valid_coordinates() {
        let now = Utc::now();
        let tech = Uuid::new_v4();
        let mut wo = work_order();
        wo.assign(tech, now, Duration::minutes(30)).unwrap();

        assert!(matches!(wo.start(tech, lagos(), now), Err(ServiceError::StateConflict(_))));

        wo.respond(tech, RespondAction::Accept, now).unwrap();
        let bad = GeoPoint { latitude: 91.0, longitude: 0.0 };
        assert!(matches!(wo.start(tech, bad, now), Err(ServiceError::Validation(_))));
        assert_eq!(wo.status, WorkOrderStatus::Accepted);
    }

    #[test]
    fn terminal_states_do_not_move() {
        let now = Utc::now();
        let mut wo = work_order();
        wo.cancel("customer left".into(), now).unwrap();

        assert!(matches!(
            wo.assign(Uuid::new_v4(), now, Duration::minutes(30)),
            Err(ServiceError::StateConflict(_))
        ));
        assert!(matches!(wo.cancel("again".into(), now), Err(ServiceError::StateConflict(_))));
    }

    #[test]
    fn completed_work_cannot_be_cancelled() {
        assert!(!is_valid_transition(
            WorkOrderStatus::CompletedPendingPayment,
            WorkOrderStatus::Cancelled
        ));
        assert!(!is_valid_transition(WorkOrderStatus::PaidVerified, WorkOrderStatus::Unassigned));
    }
}
