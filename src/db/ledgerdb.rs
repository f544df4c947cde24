// db/ledgerdb.rs
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    commissionmodel::*, paymentmodel::*, payoutmodel::*, technicianmodel::*, walletmodels::*,
    workordermodel::*,
};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Duplicate record: {0}")]
    Duplicate(String),

    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

/// Entry point to the ledger datastore. Every mutating operation runs inside
/// exactly one `LedgerTx`.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn LedgerTx>, StoreError>;
}

/// One datastore transaction. Reads that precede a write lock the row
/// (`*_for_update`). Dropping the transaction without `commit` rolls it back.
#[async_trait]
pub trait LedgerTx: Send {
    // Technicians
    async fn technician(&mut self, technician_id: Uuid) -> Result<Option<Technician>, StoreError>;
    async fn upsert_technician(&mut self, technician: &Technician) -> Result<(), StoreError>;

    // Work orders
    async fn insert_work_order(&mut self, work_order: &WorkOrder) -> Result<(), StoreError>;
    async fn work_order_for_update(&mut self, work_order_id: Uuid) -> Result<Option<WorkOrder>, StoreError>;
    async fn update_work_order(&mut self, work_order: &WorkOrder) -> Result<(), StoreError>;
    async fn expired_assignments(&mut self, now: DateTime<Utc>) -> Result<Vec<Uuid>, StoreError>;

    // Payments
    async fn insert_payment(&mut self, payment: &Payment) -> Result<(), StoreError>;
    async fn payment_for_update(&mut self, payment_id: Uuid) -> Result<Option<Payment>, StoreError>;
    async fn update_payment(&mut self, payment: &Payment) -> Result<(), StoreError>;
    async fn pending_payment_for_work_order(&mut self, work_order_id: Uuid) -> Result<Option<Payment>, StoreError>;

    // Commissions
    async fn insert_commission(&mut self, commission: &Commission) -> Result<(), StoreError>;
    async fn earned_commissions_for_update(&mut self, technician_id: Uuid) -> Result<Vec<Commission>, StoreError>;
    async fn technicians_with_earned_commissions(&mut self) -> Result<Vec<Uuid>, StoreError>;
    async fn commissions_for_payout(&mut self, payout_id: Uuid) -> Result<Vec<Commission>, StoreError>;
    async fn update_commission(&mut self, commission: &Commission) -> Result<(), StoreError>;
    async fn list_commissions(&mut self, filter: &CommissionFilter) -> Result<(Vec<Commission>, i64), StoreError>;

    // Wallets
    async fn wallet_for_update(&mut self, technician_id: Uuid) -> Result<Option<Wallet>, StoreError>;
    async fn wallet_by_id_for_update(&mut self, wallet_id: Uuid) -> Result<Option<Wallet>, StoreError>;
    /// Creates the wallet unless the technician already has one.
    async fn insert_wallet(&mut self, wallet: &Wallet) -> Result<(), StoreError>;
    async fn update_wallet(&mut self, wallet: &Wallet) -> Result<(), StoreError>;
    async fn insert_wallet_transaction(&mut self, transaction: &WalletTransaction) -> Result<(), StoreError>;
    async fn wallet_transactions(&mut self, wallet_id: Uuid) -> Result<Vec<WalletTransaction>, StoreError>;

    // Payouts
    async fn insert_payout_request(&mut self, request: &PayoutRequest) -> Result<(), StoreError>;
    async fn payout_request_for_update(&mut self, request_id: Uuid) -> Result<Option<PayoutRequest>, StoreError>;
    async fn update_payout_request(&mut self, request: &PayoutRequest) -> Result<(), StoreError>;
    async fn list_payout_requests(&mut self, technician_id: Option<Uuid>) -> Result<Vec<PayoutRequest>, StoreError>;
    async fn insert_payout(&mut self, payout: &Payout) -> Result<(), StoreError>;
    async fn payout_for_update(&mut self, payout_id: Uuid) -> Result<Option<Payout>, StoreError>;
    async fn update_payout(&mut self, payout: &Payout) -> Result<(), StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;
}
