// service/payment_service.rs
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use uuid::Uuid;

use crate::{
    db::ledgerdb::{LedgerStore, StoreError},
    models::{
        paymentmodel::*,
        usermodel::{Actor, UserRole},
        workordermodel::{WorkOrder, WorkOrderStatus},
    },
    service::{
        access::require_role,
        commission_service::{CommissionEngine, CommissionOutcome},
        effects::{EffectDispatcher, Effects, NotificationType},
        error::ServiceError,
    },
};

const REVIEWER_ROLES: &[UserRole] = &[UserRole::Admin, UserRole::Dispatcher];

#[derive(Debug, Clone)]
pub struct PaymentProof {
    pub amount: i64,
    pub method: PaymentMethod,
    pub proof_ref: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct VerificationOutcome {
    pub payment: Payment,
    pub work_order: WorkOrder,
    pub commission: Option<CommissionOutcome>,
}

#[derive(Clone)]
pub struct PaymentService {
    store: Arc<dyn LedgerStore>,
    dispatcher: EffectDispatcher,
    engine: CommissionEngine,
}

impl PaymentService {
    pub fn new(store: Arc<dyn LedgerStore>, dispatcher: EffectDispatcher, engine: CommissionEngine) -> Self {
        Self {
            store,
            dispatcher,
            engine,
        }
    }

    pub async fn submit_proof(
        &self,
        actor: &Actor,
        work_order_id: Uuid,
        proof: PaymentProof,
    ) -> Result<Payment, ServiceError> {
        require_role(actor, &[UserRole::Technician], "submit payment proofs")?;

        if proof.amount <= 0 {
            return Err(ServiceError::Validation(format!(
                "payment amount must be positive, got {}",
                proof.amount
            )));
        }
        if proof.proof_ref.trim().is_empty() {
            return Err(ServiceError::Validation("proof reference is required".to_string()));
        }

        let now = Utc::now();
        let mut tx = self.store.begin().await?;
        let work_order = tx
            .work_order_for_update(work_order_id)
            .await?
            .ok_or(ServiceError::WorkOrderNotFound(work_order_id))?;

        if !work_order.is_owned_by(actor.user_id) {
            return Err(ServiceError::Ownership(actor.user_id, work_order_id));
        }

        if work_order.status != WorkOrderStatus::CompletedPendingPayment {
            return Err(ServiceError::StateConflict(format!(
                "work order {} is {:?}; payment proofs are only accepted after completion",
                work_order.number, work_order.status
            )));
        }

        if let Some(pending) = tx.pending_payment_for_work_order(work_order_id).await? {
            return Err(ServiceError::StateConflict(format!(
                "payment {} for work order {} is still awaiting verification",
                pending.id, work_order.number
            )));
        }

        let payment = Payment {
            id: Uuid::new_v4(),
            work_order_id,
            technician_id: actor.user_id,
            amount: proof.amount,
            method: proof.method,
            status: PaymentStatus::PendingVerification,
            proof_ref: proof.proof_ref,
            verified_by: None,
            rejection_reason: None,
            created_at: now,
            decided_at: None,
        };

        tx.insert_payment(&payment).await?;
        tx.commit().await?;

        tracing::info!(
            "Payment proof {} of {} submitted for work order {}",
            payment.id,
            payment.amount,
            work_order.number
        );

        let mut effects = Effects::new();
        effects.audit(actor.user_id, "payment.submit", "payment", payment.id, json!({
            "work_order_id": work_order_id,
            "amount": payment.amount,
            "method": payment.method,
        }));
        effects.notify(
            work_order.dispatcher_id,
            NotificationType::PaymentSubmitted,
            "Payment awaiting verification",
            format!("A payment of {} was submitted for work order {}", payment.amount, work_order.number),
            json!({ "payment_id": payment.id, "work_order_id": work_order_id }),
        );
        self.dispatcher.dispatch(effects);

        Ok(payment)
    }

    /// Settles a pending payment proof. Approval marks the payment and the
    /// work order paid and books the commission, all in one transaction.
    pub async fn verify(
        &self,
        actor: &Actor,
        payment_id: Uuid,
        decision: ReviewDecision,
        reason: Option<String>,
    ) -> Result<VerificationOutcome, ServiceError> {
        require_role(actor, REVIEWER_ROLES, "verify payments")?;

        let now = Utc::now();
        let mut effects = Effects::new();
        let mut tx = self.store.begin().await?;

        let mut payment = tx
            .payment_for_update(payment_id)
            .await?
            .ok_or(ServiceError::PaymentNotFound(payment_id))?;

        if payment.is_settled() {
            return Err(ServiceError::Duplicate(format!(
                "payment {} is already {:?}",
                payment.id, payment.status
            )));
        }

        let mut work_order = tx
            .work_order_for_update(payment.work_order_id)
            .await?
            .ok_or(ServiceError::WorkOrderNotFound(payment.work_order_id))?;

        payment.verified_by = Some(actor.user_id);
        payment.decided_at = Some(now);

        let commission = match decision {
            ReviewDecision::Reject => {
                payment.status = PaymentStatus::Rejected;
                payment.rejection_reason = reason.clone();
                tx.update_payment(&payment).await?;

                effects.notify(
                    payment.technician_id,
                    NotificationType::PaymentRejected,
                    "Payment rejected",
                    format!(
                        "Your payment proof for work order {} was rejected{}",
                        work_order.number,
                        reason.as_deref().map(|r| format!(": {}", r)).unwrap_or_default()
                    ),
                    json!({ "payment_id": payment.id, "work_order_id": work_order.id }),
                );
                None
            }
            ReviewDecision::Approve => {
                work_order.mark_paid(now)?;
                payment.status = PaymentStatus::Verified;

                match tx.update_payment(&payment).await {
                    Err(StoreError::Duplicate(what)) => return Err(ServiceError::Duplicate(what)),
                    other => other?,
                }
                tx.update_work_order(&work_order).await?;

                let technician = tx
                    .technician(payment.technician_id)
                    .await?
                    .ok_or(ServiceError::TechnicianNotFound(payment.technician_id))?;

                let outcome = self
                    .engine
                    .compute_and_record(tx.as_mut(), &work_order, &payment, &technician.profile, now, &mut effects)
                    .await?;

                effects.notify(
                    payment.technician_id,
                    NotificationType::PaymentVerified,
                    "Payment verified",
                    format!("Payment for work order {} has been verified", work_order.number),
                    json!({ "payment_id": payment.id, "work_order_id": work_order.id }),
                );
                Some(outcome)
            }
        };

        tx.commit().await?;

        tracing::info!(
            "Payment {} for work order {} {:?} by {}",
            payment.id,
            work_order.number,
            payment.status,
            actor.user_id
        );

        effects.audit(actor.user_id, "payment.verify", "payment", payment.id, json!({
            "decision": decision,
            "work_order_id": work_order.id,
            "commission_id": commission.as_ref().map(|c| c.commission.id),
            "reason": reason,
        }));
        self.dispatcher.dispatch(effects);

        Ok(VerificationOutcome {
            payment,
            work_order,
            commission,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::commissionmodel::{Commission, CommissionKind, CommissionStatus};
    use crate::service::commission_service::CommissionPolicy;
    use crate::service::test_support::Harness;

    #[tokio::test]
    async fn approval_pays_the_work_order_and_books_commission() {
        let h = Harness::new();
        let tech = h.freelancer("0.20").await;
        let (_, payment) = h.submitted_payment(tech, 1000).await;

        let outcome = h
            .payments
            .verify(&h.admin, payment.id, ReviewDecision::Approve, None)
            .await
            .unwrap();

        assert_eq!(outcome.payment.status, PaymentStatus::Verified);
        assert_eq!(outcome.work_order.status, WorkOrderStatus::PaidVerified);

        let commission = outcome.commission.unwrap();
        assert_eq!(commission.commission.amount, 200);
        assert_eq!(commission.commission.status, CommissionStatus::Earned);

        let balance = h.wallets.get_balance(&Harness::technician(tech), tech).await.unwrap();
        assert_eq!(balance.balance, 200);
    }

    #[tokio::test]
    async fn second_approval_is_a_duplicate_with_no_side_effects() {
        let h = Harness::new();
        let tech = h.freelancer("0.20").await;
        let (_, payment) = h.submitted_payment(tech, 1000).await;

        h.payments
            .verify(&h.admin, payment.id, ReviewDecision::Approve, None)
            .await
            .unwrap();
        let again = h.payments.verify(&h.admin, payment.id, ReviewDecision::Approve, None).await;
        assert!(matches!(again, Err(ServiceError::Duplicate(_))));

        let actor = Harness::technician(tech);
        assert_eq!(h.wallets.get_balance(&actor, tech).await.unwrap().balance, 200);
        assert_eq!(h.wallets.list_transactions(&actor, tech).await.unwrap().len(), 1);

        let mut tx = h.store.begin().await.unwrap();
        assert_eq!(tx.earned_commissions_for_update(tech).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn failed_commission_step_rolls_back_the_whole_approval() {
        let h = Harness::new();
        let tech = h.freelancer("0.20").await;
        let (wo, payment) = h.submitted_payment(tech, 1000).await;

        // A stray commission row for this payment makes booking collide.
        let now = Utc::now();
        let stray = Commission {
            id: Uuid::new_v4(),
            work_order_id: wo.id,
            technician_id: tech,
            payment_id: payment.id,
            kind: CommissionKind::Commission,
            rate: Harness::rate("0.20"),
            amount: 200,
            status: CommissionStatus::Earned,
            walleted: false,
            payout_id: None,
            created_at: now,
            updated_at: now,
        };
        let mut tx = h.store.begin().await.unwrap();
        tx.insert_commission(&stray).await.unwrap();
        tx.commit().await.unwrap();

        let result = h.payments.verify(&h.admin, payment.id, ReviewDecision::Approve, None).await;
        assert!(matches!(result, Err(ServiceError::Duplicate(_))));

        let mut tx = h.store.begin().await.unwrap();
        let stored = tx.payment_for_update(payment.id).await.unwrap().unwrap();
        assert_eq!(stored.status, PaymentStatus::PendingVerification);
        assert!(stored.verified_by.is_none());

        let work_order = tx.work_order_for_update(wo.id).await.unwrap().unwrap();
        assert_eq!(work_order.status, WorkOrderStatus::CompletedPendingPayment);
        assert!(tx.wallet_for_update(tech).await.unwrap().is_none());
        drop(tx);

        let actor = Harness::technician(tech);
        assert_eq!(h.wallets.get_balance(&actor, tech).await.unwrap().balance, 0);
        assert!(h.wallets.list_transactions(&actor, tech).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn rejection_leaves_the_work_order_awaiting_payment() {
        let h = Harness::new();
        let tech = h.freelancer("0.20").await;
        let (wo, payment) = h.submitted_payment(tech, 1000).await;

        let outcome = h
            .payments
            .verify(&h.dispatcher, payment.id, ReviewDecision::Reject, Some("blurry receipt".into()))
            .await
            .unwrap();

        assert_eq!(outcome.payment.status, PaymentStatus::Rejected);
        assert_eq!(outcome.work_order.status, WorkOrderStatus::CompletedPendingPayment);
        assert!(outcome.commission.is_none());

        // A corrected proof can be submitted after a rejection.
        let resubmitted = h
            .payments
            .submit_proof(
                &Harness::technician(tech),
                wo.id,
                PaymentProof {
                    amount: 1000,
                    method: PaymentMethod::BankTransfer,
                    proof_ref: "transfer-ref".into(),
                },
            )
            .await
            .unwrap();
        assert_eq!(resubmitted.status, PaymentStatus::PendingVerification);
    }

    #[tokio::test]
    async fn only_one_pending_proof_per_work_order() {
        let h = Harness::new();
        let tech = h.freelancer("0.20").await;
        let (wo, _) = h.submitted_payment(tech, 1000).await;

        let second = h
            .payments
            .submit_proof(
                &Harness::technician(tech),
                wo.id,
                PaymentProof {
                    amount: 1000,
                    method: PaymentMethod::Card,
                    proof_ref: "pos-slip".into(),
                },
            )
            .await;
        assert!(matches!(second, Err(ServiceError::StateConflict(_))));
    }

    #[tokio::test]
    async fn proofs_require_a_completed_work_order() {
        let h = Harness::new();
        let tech = h.freelancer("0.20").await;
        let wo = h.new_work_order().await;
        h.work_orders.assign(&h.dispatcher, wo.id, tech).await.unwrap();

        let result = h
            .payments
            .submit_proof(
                &Harness::technician(tech),
                wo.id,
                PaymentProof {
                    amount: 500,
                    method: PaymentMethod::Cash,
                    proof_ref: "receipt".into(),
                },
            )
            .await;
        assert!(matches!(result, Err(ServiceError::StateConflict(_))));
    }

    #[tokio::test]
    async fn zero_amount_proofs_are_invalid() {
        let h = Harness::new();
        let tech = h.freelancer("0.20").await;
        let wo = h.completed_work_order(tech).await;

        let result = h
            .payments
            .submit_proof(
                &Harness::technician(tech),
                wo.id,
                PaymentProof {
                    amount: 0,
                    method: PaymentMethod::Cash,
                    proof_ref: "receipt".into(),
                },
            )
            .await;
        assert!(matches!(result, Err(ServiceError::Validation(_))));
    }

    #[tokio::test]
    async fn technicians_cannot_verify_their_own_payments() {
        let h = Harness::new();
        let tech = h.freelancer("0.20").await;
        let (_, payment) = h.submitted_payment(tech, 1000).await;

        let result = h
            .payments
            .verify(&Harness::technician(tech), payment.id, ReviewDecision::Approve, None)
            .await;
        assert!(matches!(result, Err(ServiceError::PermissionDenied(UserRole::Technician, _))));
    }

    #[tokio::test]
    async fn internal_bonus_is_recorded_without_a_wallet_by_default() {
        let h = Harness::new();
        let tech = h.internal("0.05", 150_000).await;
        let (_, payment) = h.submitted_payment(tech, 2000).await;

        let outcome = h
            .payments
            .verify(&h.admin, payment.id, ReviewDecision::Approve, None)
            .await
            .unwrap();

        let commission = outcome.commission.unwrap();
        assert_eq!(commission.commission.kind, CommissionKind::Bonus);
        assert_eq!(commission.commission.amount, 100);
        assert!(commission.wallet_transaction.is_none());
    }

    #[tokio::test]
    async fn internal_bonus_is_walleted_when_policy_says_so() {
        let h = Harness::with_policy(CommissionPolicy {
            wallet_internal_technicians: true,
        });
        let tech = h.internal("0.05", 150_000).await;
        h.earn(tech, 2000).await;

        let balance = h.wallets.get_balance(&Harness::technician(tech), tech).await.unwrap();
        assert_eq!(balance.balance, 100);
    }
}
