// db/memorydb.rs
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use super::ledgerdb::{LedgerStore, LedgerTx, StoreError};
use crate::models::{
    commissionmodel::*, paymentmodel::*, payoutmodel::*, technicianmodel::*, walletmodels::*,
    workordermodel::*,
};

#[derive(Debug, Clone, Default)]
struct LedgerState {
    technicians: HashMap<Uuid, Technician>,
    work_orders: HashMap<Uuid, WorkOrder>,
    payments: HashMap<Uuid, Payment>,
    commissions: Vec<Commission>,
    wallets: HashMap<Uuid, Wallet>,
    wallet_transactions: Vec<WalletTransaction>,
    payout_requests: HashMap<Uuid, PayoutRequest>,
    payouts: HashMap<Uuid, Payout>,
}

/// In-process ledger store. A transaction holds the store lock for its whole
/// lifetime and works on a copy of the state, which replaces the shared state
/// only on commit.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<LedgerState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LedgerStore for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn LedgerTx>, StoreError> {
        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(MemoryTx { guard, working }))
    }
}

pub struct MemoryTx {
    guard: OwnedMutexGuard<LedgerState>,
    working: LedgerState,
}

impl MemoryTx {
    fn commission_mut(&mut self, commission_id: Uuid) -> Result<&mut Commission, StoreError> {
        self.working
            .commissions
            .iter_mut()
            .find(|c| c.id == commission_id)
            .ok_or_else(|| StoreError::Corrupt(format!("commission {} does not exist", commission_id)))
    }
}

fn sorted_by_age(mut commissions: Vec<Commission>) -> Vec<Commission> {
    // Stable sort keeps insertion order for equal timestamps.
    commissions.sort_by_key(|c| c.created_at);
    commissions
}

#[async_trait]
impl LedgerTx for MemoryTx {
    async fn technician(&mut self, technician_id: Uuid) -> Result<Option<Technician>, StoreError> {
        Ok(self.working.technicians.get(&technician_id).cloned())
    }

    async fn upsert_technician(&mut self, technician: &Technician) -> Result<(), StoreError> {
        let created_at = self
            .working
            .technicians
            .get(&technician.id)
            .map(|existing| existing.created_at)
            .unwrap_or(technician.created_at);

        let mut technician = technician.clone();
        technician.created_at = created_at;
        self.working.technicians.insert(technician.id, technician);
        Ok(())
    }

    async fn insert_work_order(&mut self, work_order: &WorkOrder) -> Result<(), StoreError> {
        if self.working.work_orders.values().any(|wo| wo.number == work_order.number) {
            return Err(StoreError::Duplicate(format!("work order {}", work_order.number)));
        }
        self.working.work_orders.insert(work_order.id, work_order.clone());
        Ok(())
    }

    async fn work_order_for_update(&mut self, work_order_id: Uuid) -> Result<Option<WorkOrder>, StoreError> {
        Ok(self.working.work_orders.get(&work_order_id).cloned())
    }

    async fn update_work_order(&mut self, work_order: &WorkOrder) -> Result<(), StoreError> {
        match self.working.work_orders.get_mut(&work_order.id) {
            Some(existing) => {
                *existing = work_order.clone();
                Ok(())
            }
            None => Err(StoreError::Corrupt(format!("work order {} does not exist", work_order.id))),
        }
    }

    async fn expired_assignments(&mut self, now: DateTime<Utc>) -> Result<Vec<Uuid>, StoreError> {
        Ok(self
            .working
            .work_orders
            .values()
            .filter(|wo| wo.status == WorkOrderStatus::Assigned)
            .filter(|wo| wo.response_deadline.map_or(false, |deadline| deadline < now))
            .map(|wo| wo.id)
            .collect())
    }

    async fn insert_payment(&mut self, payment: &Payment) -> Result<(), StoreError> {
        self.working.payments.insert(payment.id, payment.clone());
        Ok(())
    }

    async fn payment_for_update(&mut self, payment_id: Uuid) -> Result<Option<Payment>, StoreError> {
        Ok(self.working.payments.get(&payment_id).cloned())
    }

    async fn update_payment(&mut self, payment: &Payment) -> Result<(), StoreError> {
        if payment.status == PaymentStatus::Verified
            && self.working.payments.values().any(|p| {
                p.id != payment.id
                    && p.work_order_id == payment.work_order_id
                    && p.status == PaymentStatus::Verified
            })
        {
            return Err(StoreError::Duplicate(format!(
                "verified payment for work order {}",
                payment.work_order_id
            )));
        }
        self.working.payments.insert(payment.id, payment.clone());
        Ok(())
    }

    async fn pending_payment_for_work_order(&mut self, work_order_id: Uuid) -> Result<Option<Payment>, StoreError> {
        Ok(self
            .working
            .payments
            .values()
            .filter(|p| p.work_order_id == work_order_id)
            .filter(|p| p.status == PaymentStatus::PendingVerification)
            .max_by_key(|p| p.created_at)
            .cloned())
    }

    async fn insert_commission(&mut self, commission: &Commission) -> Result<(), StoreError> {
        let duplicate = self
            .working
            .commissions
            .iter()
            .any(|c| c.payment_id == commission.payment_id && c.kind == commission.kind);

        if duplicate {
            return Err(StoreError::Duplicate(format!(
                "{:?} for payment {}",
                commission.kind, commission.payment_id
            )));
        }

        self.working.commissions.push(commission.clone());
        Ok(())
    }

    async fn earned_commissions_for_update(&mut self, technician_id: Uuid) -> Result<Vec<Commission>, StoreError> {
        Ok(sorted_by_age(
            self.working
                .commissions
                .iter()
                .filter(|c| c.technician_id == technician_id)
                .filter(|c| c.status == CommissionStatus::Earned && c.payout_id.is_none())
                .cloned()
                .collect(),
        ))
    }

    async fn technicians_with_earned_commissions(&mut self) -> Result<Vec<Uuid>, StoreError> {
        let mut technicians: Vec<Uuid> = Vec::new();
        for commission in sorted_by_age(self.working.commissions.clone()) {
            if commission.status == CommissionStatus::Earned
                && commission.payout_id.is_none()
                && !technicians.contains(&commission.technician_id)
            {
                technicians.push(commission.technician_id);
            }
        }
        Ok(technicians)
    }

    async fn commissions_for_payout(&mut self, payout_id: Uuid) -> Result<Vec<Commission>, StoreError> {
        Ok(sorted_by_age(
            self.working
                .commissions
                .iter()
                .filter(|c| c.payout_id == Some(payout_id))
                .cloned()
                .collect(),
        ))
    }

    async fn update_commission(&mut self, commission: &Commission) -> Result<(), StoreError> {
        let existing = self.commission_mut(commission.id)?;
        existing.status = commission.status;
        existing.payout_id = commission.payout_id;
        existing.updated_at = commission.updated_at;
        Ok(())
    }

    async fn list_commissions(&mut self, filter: &CommissionFilter) -> Result<(Vec<Commission>, i64), StoreError> {
        let mut matching: Vec<Commission> = self
            .working
            .commissions
            .iter()
            .filter(|c| filter.technician_id.map_or(true, |id| c.technician_id == id))
            .filter(|c| filter.status.map_or(true, |status| c.status == status))
            .cloned()
            .collect();

        matching.reverse();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let total = matching.len() as i64;
        let page = matching
            .into_iter()
            .skip(filter.offset.max(0) as usize)
            .take(filter.limit.max(0) as usize)
            .collect();

        Ok((page, total))
    }

    async fn wallet_for_update(&mut self, technician_id: Uuid) -> Result<Option<Wallet>, StoreError> {
        Ok(self
            .working
            .wallets
            .values()
            .find(|w| w.technician_id == technician_id)
            .cloned())
    }

    async fn wallet_by_id_for_update(&mut self, wallet_id: Uuid) -> Result<Option<Wallet>, StoreError> {
        Ok(self.working.wallets.get(&wallet_id).cloned())
    }

    async fn insert_wallet(&mut self, wallet: &Wallet) -> Result<(), StoreError> {
        let exists = self
            .working
            .wallets
            .values()
            .any(|w| w.technician_id == wallet.technician_id);

        if !exists {
            self.working.wallets.insert(wallet.id, wallet.clone());
        }
        Ok(())
    }

    async fn update_wallet(&mut self, wallet: &Wallet) -> Result<(), StoreError> {
        match self.working.wallets.get_mut(&wallet.id) {
            Some(existing) => {
                existing.balance = wallet.balance;
                existing.updated_at = wallet.updated_at;
                Ok(())
            }
            None => Err(StoreError::Corrupt(format!("wallet {} does not exist", wallet.id))),
        }
    }

    async fn insert_wallet_transaction(&mut self, transaction: &WalletTransaction) -> Result<(), StoreError> {
        self.working.wallet_transactions.push(transaction.clone());
        Ok(())
    }

    async fn wallet_transactions(&mut self, wallet_id: Uuid) -> Result<Vec<WalletTransaction>, StoreError> {
        Ok(self
            .working
            .wallet_transactions
            .iter()
            .rev()
            .filter(|t| t.wallet_id == wallet_id)
            .cloned()
            .collect())
    }

    async fn insert_payout_request(&mut self, request: &PayoutRequest) -> Result<(), StoreError> {
        self.working.payout_requests.insert(request.id, request.clone());
        Ok(())
    }

    async fn payout_request_for_update(&mut self, request_id: Uuid) -> Result<Option<PayoutRequest>, StoreError> {
        Ok(self.working.payout_requests.get(&request_id).cloned())
    }

    async fn update_payout_request(&mut self, request: &PayoutRequest) -> Result<(), StoreError> {
        self.working.payout_requests.insert(request.id, request.clone());
        Ok(())
    }

    async fn list_payout_requests(&mut self, technician_id: Option<Uuid>) -> Result<Vec<PayoutRequest>, StoreError> {
        let mut requests: Vec<PayoutRequest> = self
            .working
            .payout_requests
            .values()
            .filter(|r| technician_id.map_or(true, |id| r.technician_id == id))
            .cloned()
            .collect();
        requests.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(requests)
    }

    async fn insert_payout(&mut self, payout: &Payout) -> Result<(), StoreError> {
        self.working.payouts.insert(payout.id, payout.clone());
        Ok(())
    }

    async fn payout_for_update(&mut self, payout_id: Uuid) -> Result<Option<Payout>, StoreError> {
        Ok(self.working.payouts.get(&payout_id).cloned())
    }

    async fn update_payout(&mut self, payout: &Payout) -> Result<(), StoreError> {
        self.working.payouts.insert(payout.id, payout.clone());
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let MemoryTx { mut guard, working } = *self;
        *guard = working;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn dropped_transaction_leaves_state_untouched() {
        let store = MemoryStore::new();
        let technician_id = Uuid::new_v4();

        {
            let mut tx = store.begin().await.unwrap();
            tx.insert_wallet(&Wallet::new(technician_id, Utc::now())).await.unwrap();
            // no commit
        }

        let mut tx = store.begin().await.unwrap();
        assert!(tx.wallet_for_update(technician_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn committed_transaction_is_visible() {
        let store = MemoryStore::new();
        let technician_id = Uuid::new_v4();

        let mut tx = store.begin().await.unwrap();
        tx.insert_wallet(&Wallet::new(technician_id, Utc::now())).await.unwrap();
        tx.commit().await.unwrap();

        let mut tx = store.begin().await.unwrap();
        assert!(tx.wallet_for_update(technician_id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn second_wallet_for_same_technician_is_ignored() {
        let store = MemoryStore::new();
        let technician_id = Uuid::new_v4();
        let first = Wallet::new(technician_id, Utc::now());

        let mut tx = store.begin().await.unwrap();
        tx.insert_wallet(&first).await.unwrap();
        tx.insert_wallet(&Wallet::new(technician_id, Utc::now())).await.unwrap();

        let wallet = tx.wallet_for_update(technician_id).await.unwrap().unwrap();
        assert_eq!(wallet.id, first.id);
    }
}
