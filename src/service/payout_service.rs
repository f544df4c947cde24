// service/payout_service.rs
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use uuid::Uuid;

use crate::{
    db::ledgerdb::LedgerStore,
    models::{
        commissionmodel::*,
        paymentmodel::ReviewDecision,
        payoutmodel::*,
        usermodel::{Actor, UserRole},
        walletmodels::{LedgerSource, SourceRef},
    },
    service::{
        access::{require_role, require_self_or_admin},
        effects::{EffectDispatcher, Effects, NotificationType},
        error::ServiceError,
        wallet_service::{checked_balance, debit_in},
    },
};

const MAX_PAGE_SIZE: i64 = 100;

#[derive(Debug, Clone, Serialize)]
pub struct PayoutDetail {
    pub payout: Payout,
    pub commissions: Vec<Commission>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EarlyPayoutReview {
    pub request: PayoutRequest,
    pub payout: Option<PayoutDetail>,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BatchLegStatus {
    Scheduled,
    Skipped,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchLeg {
    pub technician_id: Uuid,
    pub status: BatchLegStatus,
    pub payout_id: Option<Uuid>,
    pub commission_count: usize,
    pub amount: i64,
    pub disbursed_amount: i64,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct WeeklyBatchReport {
    pub payouts_created: usize,
    pub failures: usize,
    pub total_disbursed: i64,
    pub legs: Vec<BatchLeg>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommissionPage {
    pub commissions: Vec<Commission>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

/// Picks EARNED commissions oldest first until `amount` is covered. The last
/// pick may overshoot the target.
pub fn allocate_commissions(earned: Vec<Commission>, amount: i64) -> Vec<Commission> {
    let mut covered = 0;
    let mut selected = Vec::new();

    for commission in earned {
        if covered >= amount {
            break;
        }
        covered += commission.amount;
        selected.push(commission);
    }

    selected
}

#[derive(Clone)]
pub struct PayoutService {
    store: Arc<dyn LedgerStore>,
    dispatcher: EffectDispatcher,
}

impl PayoutService {
    pub fn new(store: Arc<dyn LedgerStore>, dispatcher: EffectDispatcher) -> Self {
        Self { store, dispatcher }
    }

    pub async fn request_early_payout(
        &self,
        actor: &Actor,
        amount: i64,
        reason: String,
    ) -> Result<PayoutRequest, ServiceError> {
        require_role(actor, &[UserRole::Technician], "request early payouts")?;

        if amount <= 0 {
            return Err(ServiceError::Validation(format!("payout amount must be positive, got {}", amount)));
        }

        let now = Utc::now();
        let technician_id = actor.user_id;
        let mut tx = self.store.begin().await?;

        let available = match tx.wallet_for_update(technician_id).await? {
            Some(wallet) => checked_balance(&wallet)?,
            None => 0,
        };

        if available < amount {
            return Err(ServiceError::InsufficientFunds {
                required: amount,
                available,
            });
        }

        let request = PayoutRequest {
            id: Uuid::new_v4(),
            technician_id,
            amount,
            reason,
            status: PayoutRequestStatus::Pending,
            reviewed_by: None,
            payout_id: None,
            created_at: now,
            reviewed_at: None,
        };

        tx.insert_payout_request(&request).await?;
        tx.commit().await?;

        tracing::info!("Technician {} requested early payout of {}", technician_id, amount);

        let mut effects = Effects::new();
        effects.audit(technician_id, "payout_request.create", "payout_request", request.id, json!({
            "amount": amount,
        }));
        effects.notify(
            technician_id,
            NotificationType::PayoutRequested,
            "Payout requested",
            format!("Your early payout request of {} is awaiting review", amount),
            json!({ "request_id": request.id }),
        );
        self.dispatcher.dispatch(effects);

        Ok(request)
    }

    pub async fn review_early_payout(
        &self,
        actor: &Actor,
        request_id: Uuid,
        decision: ReviewDecision,
    ) -> Result<EarlyPayoutReview, ServiceError> {
        require_role(actor, &[UserRole::Admin], "review payout requests")?;

        let now = Utc::now();
        let mut effects = Effects::new();
        let mut tx = self.store.begin().await?;

        let mut request = tx
            .payout_request_for_update(request_id)
            .await?
            .ok_or(ServiceError::PayoutRequestNotFound(request_id))?;

        if request.status != PayoutRequestStatus::Pending {
            return Err(ServiceError::StateConflict(format!(
                "payout request {} is already {:?}",
                request.id, request.status
            )));
        }

        request.reviewed_by = Some(actor.user_id);
        request.reviewed_at = Some(now);

        let payout = match decision {
            ReviewDecision::Reject => {
                request.status = PayoutRequestStatus::Rejected;
                tx.update_payout_request(&request).await?;

                effects.notify(
                    request.technician_id,
                    NotificationType::PayoutRejected,
                    "Payout request rejected",
                    format!("Your early payout request of {} was rejected", request.amount),
                    json!({ "request_id": request.id }),
                );
                None
            }
            ReviewDecision::Approve => {
                let mut wallet = tx
                    .wallet_for_update(request.technician_id)
                    .await?
                    .ok_or(ServiceError::WalletNotFound(request.technician_id))?;

                let earned = tx
                    .earned_commissions_for_update(request.technician_id)
                    .await?
                    .into_iter()
                    .filter(|c| c.walleted)
                    .collect();
                let mut commissions = allocate_commissions(earned, request.amount);

                let payout = Payout {
                    id: Uuid::new_v4(),
                    technician_id: request.technician_id,
                    kind: PayoutKind::Early,
                    total_amount: commissions.iter().map(|c| c.amount).sum(),
                    disbursed_amount: request.amount,
                    status: PayoutStatus::Completed,
                    created_by: actor.user_id,
                    created_at: now,
                    completed_at: Some(now),
                };

                debit_in(
                    tx.as_mut(),
                    &mut wallet,
                    request.amount,
                    SourceRef::new(LedgerSource::EarlyPayout, payout.id),
                    now,
                )
                .await?;

                tx.insert_payout(&payout).await?;
                for commission in commissions.iter_mut() {
                    commission.status = CommissionStatus::Paid;
                    commission.payout_id = Some(payout.id);
                    commission.updated_at = now;
                    tx.update_commission(commission).await?;
                }

                request.status = PayoutRequestStatus::Approved;
                request.payout_id = Some(payout.id);
                tx.update_payout_request(&request).await?;

                if payout.total_amount < payout.disbursed_amount {
                    tracing::warn!(
                        "Early payout {} disburses {} but only {} of earned commissions were available",
                        payout.id,
                        payout.disbursed_amount,
                        payout.total_amount
                    );
                }

                effects.notify(
                    request.technician_id,
                    NotificationType::PayoutApproved,
                    "Payout approved",
                    format!("Your early payout of {} has been approved", request.amount),
                    json!({ "request_id": request.id, "payout_id": payout.id }),
                );
                Some(PayoutDetail { payout, commissions })
            }
        };

        tx.commit().await?;

        tracing::info!("Payout request {} {:?} by {}", request.id, request.status, actor.user_id);

        effects.audit(actor.user_id, "payout_request.review", "payout_request", request.id, json!({
            "decision": decision,
            "payout_id": request.payout_id,
            "commissions": payout.as_ref().map(|p| p.commissions.len()).unwrap_or(0),
        }));
        self.dispatcher.dispatch(effects);

        Ok(EarlyPayoutReview { request, payout })
    }

    /// Settles one technician's EARNED commissions into a SCHEDULED weekly
    /// payout. Returns `None` when there is nothing to pay.
    async fn settle_week(
        &self,
        actor: &Actor,
        technician_id: Uuid,
        now: DateTime<Utc>,
        effects: &mut Effects,
    ) -> Result<Option<PayoutDetail>, ServiceError> {
        let mut tx = self.store.begin().await?;

        // Wallet before commissions, the same lock order as early payouts.
        let wallet = tx.wallet_for_update(technician_id).await?;
        let mut commissions = tx.earned_commissions_for_update(technician_id).await?;
        let total: i64 = commissions.iter().map(|c| c.amount).sum();
        if total == 0 {
            return Ok(None);
        }
        let credited: i64 = commissions.iter().filter(|c| c.walleted).map(|c| c.amount).sum();

        let mut payout = Payout {
            id: Uuid::new_v4(),
            technician_id,
            kind: PayoutKind::Weekly,
            total_amount: total,
            disbursed_amount: 0,
            status: PayoutStatus::Scheduled,
            created_by: actor.user_id,
            created_at: now,
            completed_at: None,
        };

        // Only credited commissions leave through the wallet. Unwalleted
        // bonuses are settled outside the ledger.
        if credited > 0 {
            let mut wallet = wallet.ok_or_else(|| {
                ServiceError::LedgerCorruption(format!(
                    "technician {} has credited commissions but no wallet",
                    technician_id
                ))
            })?;
            debit_in(
                tx.as_mut(),
                &mut wallet,
                credited,
                SourceRef::new(LedgerSource::WeeklyPayout, payout.id),
                now,
            )
            .await?;
            payout.disbursed_amount = credited;
        }

        tx.insert_payout(&payout).await?;
        for commission in commissions.iter_mut() {
            commission.status = CommissionStatus::PendingPayout;
            commission.payout_id = Some(payout.id);
            commission.updated_at = now;
            tx.update_commission(commission).await?;
        }

        tx.commit().await?;

        effects.notify(
            technician_id,
            NotificationType::PayoutScheduled,
            "Weekly payout scheduled",
            format!("A weekly payout of {} has been scheduled", total),
            json!({ "payout_id": payout.id, "commissions": commissions.len() }),
        );
        effects.audit(actor.user_id, "payout.schedule", "payout", payout.id, json!({
            "technician_id": technician_id,
            "total_amount": total,
            "commissions": commissions.len(),
        }));

        Ok(Some(PayoutDetail { payout, commissions }))
    }

    /// Sweeps every technician's EARNED commissions. Each technician settles
    /// in its own transaction, so one failure leaves the others untouched.
    pub async fn run_weekly_batch(&self, actor: &Actor) -> Result<WeeklyBatchReport, ServiceError> {
        require_role(actor, &[UserRole::Admin], "run payout batches")?;

        let now = Utc::now();
        let technicians = {
            let mut tx = self.store.begin().await?;
            tx.technicians_with_earned_commissions().await?
        };

        tracing::info!("Running weekly payout batch for {} technicians", technicians.len());

        let mut legs = Vec::with_capacity(technicians.len());
        for technician_id in technicians {
            let mut effects = Effects::new();
            let leg = match self.settle_week(actor, technician_id, now, &mut effects).await {
                Ok(Some(detail)) => BatchLeg {
                    technician_id,
                    status: BatchLegStatus::Scheduled,
                    payout_id: Some(detail.payout.id),
                    commission_count: detail.commissions.len(),
                    amount: detail.payout.total_amount,
                    disbursed_amount: detail.payout.disbursed_amount,
                    error: None,
                },
                Ok(None) => BatchLeg {
                    technician_id,
                    status: BatchLegStatus::Skipped,
                    payout_id: None,
                    commission_count: 0,
                    amount: 0,
                    disbursed_amount: 0,
                    error: None,
                },
                Err(e) => {
                    tracing::error!("Weekly payout for technician {} failed: {}", technician_id, e);
                    BatchLeg {
                        technician_id,
                        status: BatchLegStatus::Failed,
                        payout_id: None,
                        commission_count: 0,
                        amount: 0,
                        disbursed_amount: 0,
                        error: Some(e.to_string()),
                    }
                }
            };
            self.dispatcher.dispatch(effects);
            legs.push(leg);
        }

        let report = WeeklyBatchReport {
            payouts_created: legs.iter().filter(|l| l.status == BatchLegStatus::Scheduled).count(),
            failures: legs.iter().filter(|l| l.status == BatchLegStatus::Failed).count(),
            total_disbursed: legs.iter().map(|l| l.disbursed_amount).sum(),
            legs,
        };

        tracing::info!(
            "Weekly payout batch done: {} payouts, {} failures, {} total",
            report.payouts_created,
            report.failures,
            report.total_disbursed
        );

        Ok(report)
    }

    pub async fn process_batch(&self, actor: &Actor, payout_id: Uuid) -> Result<PayoutDetail, ServiceError> {
        require_role(actor, &[UserRole::Admin], "process payouts")?;

        let now = Utc::now();
        let mut tx = self.store.begin().await?;
        let mut payout = tx
            .payout_for_update(payout_id)
            .await?
            .ok_or(ServiceError::PayoutNotFound(payout_id))?;

        if payout.status != PayoutStatus::Scheduled {
            return Err(ServiceError::StateConflict(format!(
                "payout {} is already {:?}",
                payout.id, payout.status
            )));
        }

        let mut commissions = tx.commissions_for_payout(payout_id).await?;
        for commission in commissions.iter_mut() {
            if commission.status != CommissionStatus::PendingPayout {
                return Err(ServiceError::LedgerCorruption(format!(
                    "commission {} on scheduled payout {} is {:?}",
                    commission.id, payout.id, commission.status
                )));
            }
            commission.status = CommissionStatus::Paid;
            commission.updated_at = now;
            tx.update_commission(commission).await?;
        }

        payout.status = PayoutStatus::Completed;
        payout.completed_at = Some(now);
        tx.update_payout(&payout).await?;
        tx.commit().await?;

        tracing::info!("Payout {} completed with {} commissions", payout.id, commissions.len());

        let mut effects = Effects::new();
        effects.audit(actor.user_id, "payout.complete", "payout", payout.id, json!({
            "commissions": commissions.len(),
        }));
        effects.notify(
            payout.technician_id,
            NotificationType::PayoutCompleted,
            "Payout completed",
            format!("Your payout of {} has been completed", payout.total_amount),
            json!({ "payout_id": payout.id }),
        );
        self.dispatcher.dispatch(effects);

        Ok(PayoutDetail { payout, commissions })
    }

    pub async fn get_payout(&self, actor: &Actor, payout_id: Uuid) -> Result<PayoutDetail, ServiceError> {
        let mut tx = self.store.begin().await?;
        let payout = tx
            .payout_for_update(payout_id)
            .await?
            .ok_or(ServiceError::PayoutNotFound(payout_id))?;

        require_self_or_admin(actor, payout.technician_id, "view payouts")?;

        let commissions = tx.commissions_for_payout(payout_id).await?;
        Ok(PayoutDetail { payout, commissions })
    }

    /// Technicians see their own requests; admins see all of them, or one
    /// technician's when `technician_id` is given.
    pub async fn list_payout_requests(
        &self,
        actor: &Actor,
        technician_id: Option<Uuid>,
    ) -> Result<Vec<PayoutRequest>, ServiceError> {
        let technician_id = match (actor.role, technician_id) {
            (UserRole::Admin, filter) => filter,
            (_, Some(technician_id)) => {
                require_self_or_admin(actor, technician_id, "view payout requests")?;
                Some(technician_id)
            }
            (_, None) => {
                require_role(actor, &[UserRole::Technician], "view payout requests")?;
                Some(actor.user_id)
            }
        };

        let mut tx = self.store.begin().await?;
        Ok(tx.list_payout_requests(technician_id).await?)
    }

    pub async fn list_commissions(
        &self,
        actor: &Actor,
        technician_id: Option<Uuid>,
        status: Option<CommissionStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<CommissionPage, ServiceError> {
        let technician_id = match technician_id {
            Some(technician_id) => {
                require_self_or_admin(actor, technician_id, "view commissions")?;
                Some(technician_id)
            }
            None if actor.is_admin() => None,
            None => {
                require_role(actor, &[UserRole::Technician], "view commissions")?;
                Some(actor.user_id)
            }
        };

        let filter = CommissionFilter {
            technician_id,
            status,
            limit: limit.clamp(1, MAX_PAGE_SIZE),
            offset: offset.max(0),
        };

        let mut tx = self.store.begin().await?;
        let (commissions, total) = tx.list_commissions(&filter).await?;

        Ok(CommissionPage {
            commissions,
            total,
            limit: filter.limit,
            offset: filter.offset,
        })
    }
}
