// service/commission_service.rs
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use num_traits::{One, ToPrimitive, Zero};
use serde::Serialize;
use serde_json::json;
use uuid::Uuid;

use crate::{
    db::ledgerdb::{LedgerTx, StoreError},
    models::{
        commissionmodel::*, paymentmodel::Payment, technicianmodel::RateProfile, walletmodels::*,
        workordermodel::WorkOrder,
    },
    service::{
        effects::{Effects, NotificationType},
        error::ServiceError,
        wallet_service::{credit_in, ensure_wallet},
    },
};

/// Whether INTERNAL technicians' bonuses go through a wallet. Freelancer
/// commissions are always walleted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommissionPolicy {
    pub wallet_internal_technicians: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommissionOutcome {
    pub commission: Commission,
    pub wallet_transaction: Option<WalletTransaction>,
}

/// Rates are stored as `NUMERIC(5, 4)`.
const RATE_SCALE: i64 = 4;

pub fn validate_rate(rate: &BigDecimal) -> Result<(), ServiceError> {
    if rate < &BigDecimal::zero() || rate > &BigDecimal::one() {
        return Err(ServiceError::Validation(format!("rate {} must be between 0 and 1", rate)));
    }
    if &rate.with_scale(RATE_SCALE) != rate {
        return Err(ServiceError::Validation(format!(
            "rate {} has more than {} decimal places",
            rate, RATE_SCALE
        )));
    }
    Ok(())
}

/// `amount * rate`, rounded to a whole minor unit.
pub fn commission_amount(amount: i64, rate: &BigDecimal) -> Result<i64, ServiceError> {
    validate_rate(rate)?;

    (BigDecimal::from(amount) * rate)
        .round(0)
        .to_i64()
        .ok_or_else(|| ServiceError::Validation(format!("commission on {} overflows", amount)))
}

#[derive(Debug, Clone, Copy)]
pub struct CommissionEngine {
    policy: CommissionPolicy,
}

impl CommissionEngine {
    pub fn new(policy: CommissionPolicy) -> Self {
        Self { policy }
    }

    fn walleted(&self, profile: &RateProfile) -> bool {
        match profile {
            RateProfile::Freelancer { .. } => true,
            RateProfile::Internal { .. } => self.policy.wallet_internal_technicians,
        }
    }

    /// Writes the single commission row owed for a verified payment and, for
    /// walleted technicians, credits it. Runs inside the caller's transaction.
    pub async fn compute_and_record(
        &self,
        tx: &mut dyn LedgerTx,
        work_order: &WorkOrder,
        payment: &Payment,
        profile: &RateProfile,
        now: DateTime<Utc>,
        effects: &mut Effects,
    ) -> Result<CommissionOutcome, ServiceError> {
        let rate = profile.rate().clone();
        let amount = commission_amount(payment.amount, &rate)?;
        let walleted = self.walleted(profile) && amount > 0;

        let commission = Commission {
            id: Uuid::new_v4(),
            work_order_id: work_order.id,
            technician_id: payment.technician_id,
            payment_id: payment.id,
            kind: profile.commission_kind(),
            rate,
            amount,
            status: CommissionStatus::Earned,
            walleted,
            payout_id: None,
            created_at: now,
            updated_at: now,
        };

        match tx.insert_commission(&commission).await {
            Err(StoreError::Duplicate(what)) => return Err(ServiceError::Duplicate(what)),
            other => other?,
        }

        let wallet_transaction = if walleted {
            let mut wallet = ensure_wallet(tx, payment.technician_id, now).await?;
            let source = SourceRef::new(LedgerSource::Commission, commission.id);
            Some(credit_in(tx, &mut wallet, amount, source, now).await?)
        } else {
            None
        };

        tracing::info!(
            "Recorded {:?} of {} for technician {} on work order {}",
            commission.kind,
            amount,
            commission.technician_id,
            work_order.number
        );

        effects.notify(
            commission.technician_id,
            NotificationType::CommissionEarned,
            "Commission earned",
            format!("You earned {} on work order {}", amount, work_order.number),
            json!({
                "commission_id": commission.id,
                "work_order_id": work_order.id,
                "amount": amount,
            }),
        );

        Ok(CommissionOutcome {
            commission,
            wallet_transaction,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{ledgerdb::LedgerStore, memorydb::MemoryStore};
    use crate::models::paymentmodel::{PaymentMethod, PaymentStatus};
    use std::str::FromStr;

    fn rate(value: &str) -> BigDecimal {
        BigDecimal::from_str(value).unwrap()
    }

    fn verified_payment(technician_id: Uuid, amount: i64) -> (WorkOrder, Payment) {
        let now = Utc::now();
        let mut work_order = WorkOrder::new(Uuid::new_v4(), Uuid::new_v4(), "Leak".into(), None, now);
        work_order.technician_id = Some(technician_id);

        let payment = Payment {
            id: Uuid::new_v4(),
            work_order_id: work_order.id,
            technician_id,
            amount,
            method: PaymentMethod::Cash,
            status: PaymentStatus::Verified,
            proof_ref: "receipt-1".into(),
            verified_by: None,
            rejection_reason: None,
            created_at: now,
            decided_at: Some(now),
        };
        (work_order, payment)
    }

    #[test]
    fn amount_is_payment_times_rate() {
        assert_eq!(commission_amount(1000, &rate("0.20")).unwrap(), 200);
        assert_eq!(commission_amount(999, &rate("0.125")).unwrap(), 125);
        assert_eq!(commission_amount(1000, &rate("0")).unwrap(), 0);
    }

    #[test]
    fn rates_outside_unit_interval_are_rejected() {
        assert!(matches!(commission_amount(1000, &rate("1.5")), Err(ServiceError::Validation(_))));
        assert!(matches!(commission_amount(1000, &rate("-0.1")), Err(ServiceError::Validation(_))));
    }

    #[test]
    fn rates_finer_than_four_places_are_rejected() {
        assert!(matches!(validate_rate(&rate("0.12345")), Err(ServiceError::Validation(_))));
        assert!(validate_rate(&rate("0.1234")).is_ok());
        assert!(validate_rate(&rate("0.120000")).is_ok());
    }

    #[tokio::test]
    async fn freelancer_commission_credits_a_lazily_created_wallet() {
        let store = MemoryStore::new();
        let technician_id = Uuid::new_v4();
        let (work_order, payment) = verified_payment(technician_id, 1000);
        let profile = RateProfile::Freelancer { commission_rate: rate("0.20") };
        let engine = CommissionEngine::new(CommissionPolicy::default());

        let mut tx = store.begin().await.unwrap();
        let mut effects = Effects::new();
        let outcome = engine
            .compute_and_record(tx.as_mut(), &work_order, &payment, &profile, Utc::now(), &mut effects)
            .await
            .unwrap();
        tx.commit().await.unwrap();

        assert_eq!(outcome.commission.amount, 200);
        assert_eq!(outcome.commission.kind, CommissionKind::Commission);
        assert_eq!(outcome.commission.status, CommissionStatus::Earned);
        assert!(outcome.commission.walleted);
        assert_eq!(outcome.wallet_transaction.unwrap().balance_after, 200);

        let mut tx = store.begin().await.unwrap();
        let wallet = tx.wallet_for_update(technician_id).await.unwrap().unwrap();
        assert_eq!(wallet.balance, 200);
    }

    #[tokio::test]
    async fn internal_bonus_is_not_walleted_unless_policy_says_so() {
        let technician_id = Uuid::new_v4();
        let (work_order, payment) = verified_payment(technician_id, 1000);
        let profile = RateProfile::Internal { bonus_rate: rate("0.05"), base_salary: 100_000 };

        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let outcome = CommissionEngine::new(CommissionPolicy::default())
            .compute_and_record(tx.as_mut(), &work_order, &payment, &profile, Utc::now(), &mut Effects::new())
            .await
            .unwrap();
        assert_eq!(outcome.commission.kind, CommissionKind::Bonus);
        assert_eq!(outcome.commission.amount, 50);
        assert!(!outcome.commission.walleted);
        assert!(outcome.wallet_transaction.is_none());
        assert!(tx.wallet_for_update(technician_id).await.unwrap().is_none());

        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let outcome = CommissionEngine::new(CommissionPolicy { wallet_internal_technicians: true })
            .compute_and_record(tx.as_mut(), &work_order, &payment, &profile, Utc::now(), &mut Effects::new())
            .await
            .unwrap();
        assert_eq!(outcome.wallet_transaction.map(|t| t.amount), Some(50));
    }

    #[tokio::test]
    async fn second_commission_for_the_same_payment_is_a_duplicate() {
        let store = MemoryStore::new();
        let technician_id = Uuid::new_v4();
        let (work_order, payment) = verified_payment(technician_id, 1000);
        let profile = RateProfile::Freelancer { commission_rate: rate("0.20") };
        let engine = CommissionEngine::new(CommissionPolicy::default());

        let mut tx = store.begin().await.unwrap();
        engine
            .compute_and_record(tx.as_mut(), &work_order, &payment, &profile, Utc::now(), &mut Effects::new())
            .await
            .unwrap();
        let again = engine
            .compute_and_record(tx.as_mut(), &work_order, &payment, &profile, Utc::now(), &mut Effects::new())
            .await;

        assert!(matches!(again, Err(ServiceError::Duplicate(_))));
        assert_eq!(tx.earned_commissions_for_update(technician_id).await.unwrap().len(), 1);
    }
}
