// db/pgledgerdb.rs
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use super::ledgerdb::{LedgerTx, StoreError};
use crate::models::{
    commissionmodel::*, paymentmodel::*, payoutmodel::*, technicianmodel::*, walletmodels::*,
    workordermodel::*,
};

const TECHNICIAN_COLUMNS: &str =
    "id, kind, commission_rate, bonus_rate, base_salary, is_blocked, created_at, updated_at";

const WORK_ORDER_COLUMNS: &str = r#"
    id, number, status, customer_id, technician_id, dispatcher_id, summary,
    scheduled_at, assigned_at, response_deadline, accepted_at, started_at,
    completed_at, cancelled_at, cancel_reason, check_in_latitude, check_in_longitude,
    completion_notes, completion_photos, materials, created_at, updated_at
"#;

const PAYMENT_COLUMNS: &str = r#"
    id, work_order_id, technician_id, amount, method, status, proof_ref,
    verified_by, rejection_reason, created_at, decided_at
"#;

const COMMISSION_COLUMNS: &str = r#"
    id, work_order_id, technician_id, payment_id, kind, rate, amount,
    status, walleted, payout_id, created_at, updated_at
"#;

const WALLET_COLUMNS: &str = "id, technician_id, balance, created_at, updated_at";

const WALLET_TRANSACTION_COLUMNS: &str =
    "id, wallet_id, transaction_type, source_type, source_id, amount, balance_after, created_at";

const PAYOUT_REQUEST_COLUMNS: &str =
    "id, technician_id, amount, reason, status, reviewed_by, payout_id, created_at, reviewed_at";

const PAYOUT_COLUMNS: &str = r#"
    id, technician_id, kind, total_amount, disbursed_amount, status,
    created_by, created_at, completed_at
"#;

/// Postgres-backed ledger transaction.
pub struct PgLedgerTx {
    tx: Transaction<'static, Postgres>,
}

impl PgLedgerTx {
    pub fn new(tx: Transaction<'static, Postgres>) -> Self {
        Self { tx }
    }
}

fn unique_violation(error: sqlx::Error, what: String) -> StoreError {
    match &error {
        sqlx::Error::Database(db_error) if db_error.is_unique_violation() => {
            StoreError::Duplicate(what)
        }
        _ => StoreError::Database(error),
    }
}

#[async_trait]
impl LedgerTx for PgLedgerTx {
    async fn technician(&mut self, technician_id: Uuid) -> Result<Option<Technician>, StoreError> {
        let row = sqlx::query_as::<_, TechnicianRow>(&format!(
            "SELECT {} FROM technicians WHERE id = $1",
            TECHNICIAN_COLUMNS
        ))
        .bind(technician_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        row.map(Technician::try_from)
            .transpose()
            .map_err(StoreError::Corrupt)
    }

    async fn upsert_technician(&mut self, technician: &Technician) -> Result<(), StoreError> {
        let row = TechnicianRow::from(technician);

        sqlx::query(
            r#"
            INSERT INTO technicians
            (id, kind, commission_rate, bonus_rate, base_salary, is_blocked, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (id) DO UPDATE SET
                kind = EXCLUDED.kind,
                commission_rate = EXCLUDED.commission_rate,
                bonus_rate = EXCLUDED.bonus_rate,
                base_salary = EXCLUDED.base_salary,
                is_blocked = EXCLUDED.is_blocked,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(row.id)
        .bind(row.kind)
        .bind(row.commission_rate)
        .bind(row.bonus_rate)
        .bind(row.base_salary)
        .bind(row.is_blocked)
        .bind(row.created_at)
        .bind(row.updated_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn insert_work_order(&mut self, work_order: &WorkOrder) -> Result<(), StoreError> {
        sqlx::query(&format!(
            r#"
            INSERT INTO work_orders ({})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12,
                    $13, $14, $15, $16, $17, $18, $19, $20, $21, $22)
            "#,
            WORK_ORDER_COLUMNS
        ))
        .bind(work_order.id)
        .bind(&work_order.number)
        .bind(work_order.status)
        .bind(work_order.customer_id)
        .bind(work_order.technician_id)
        .bind(work_order.dispatcher_id)
        .bind(&work_order.summary)
        .bind(work_order.scheduled_at)
        .bind(work_order.assigned_at)
        .bind(work_order.response_deadline)
        .bind(work_order.accepted_at)
        .bind(work_order.started_at)
        .bind(work_order.completed_at)
        .bind(work_order.cancelled_at)
        .bind(&work_order.cancel_reason)
        .bind(work_order.check_in_latitude)
        .bind(work_order.check_in_longitude)
        .bind(&work_order.completion_notes)
        .bind(&work_order.completion_photos)
        .bind(&work_order.materials)
        .bind(work_order.created_at)
        .bind(work_order.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| unique_violation(e, format!("work order {}", work_order.number)))?;

        Ok(())
    }

    async fn work_order_for_update(&mut self, work_order_id: Uuid) -> Result<Option<WorkOrder>, StoreError> {
        let work_order = sqlx::query_as::<_, WorkOrder>(&format!(
            "SELECT {} FROM work_orders WHERE id = $1 FOR UPDATE",
            WORK_ORDER_COLUMNS
        ))
        .bind(work_order_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(work_order)
    }

    async fn update_work_order(&mut self, work_order: &WorkOrder) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE work_orders SET
                status = $2,
                technician_id = $3,
                assigned_at = $4,
                response_deadline = $5,
                accepted_at = $6,
                started_at = $7,
                completed_at = $8,
                cancelled_at = $9,
                cancel_reason = $10,
                check_in_latitude = $11,
                check_in_longitude = $12,
                completion_notes = $13,
                completion_photos = $14,
                materials = $15,
                updated_at = $16
            WHERE id = $1
            "#,
        )
        .bind(work_order.id)
        .bind(work_order.status)
        .bind(work_order.technician_id)
        .bind(work_order.assigned_at)
        .bind(work_order.response_deadline)
        .bind(work_order.accepted_at)
        .bind(work_order.started_at)
        .bind(work_order.completed_at)
        .bind(work_order.cancelled_at)
        .bind(&work_order.cancel_reason)
        .bind(work_order.check_in_latitude)
        .bind(work_order.check_in_longitude)
        .bind(&work_order.completion_notes)
        .bind(&work_order.completion_photos)
        .bind(&work_order.materials)
        .bind(work_order.updated_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn expired_assignments(&mut self, now: DateTime<Utc>) -> Result<Vec<Uuid>, StoreError> {
        let ids = sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT id FROM work_orders
            WHERE status = 'assigned'
            AND response_deadline IS NOT NULL
            AND response_deadline < $1
            "#,
        )
        .bind(now)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(ids)
    }

    async fn insert_payment(&mut self, payment: &Payment) -> Result<(), StoreError> {
        sqlx::query(&format!(
            "INSERT INTO payments ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
            PAYMENT_COLUMNS
        ))
        .bind(payment.id)
        .bind(payment.work_order_id)
        .bind(payment.technician_id)
        .bind(payment.amount)
        .bind(payment.method)
        .bind(payment.status)
        .bind(&payment.proof_ref)
        .bind(payment.verified_by)
        .bind(&payment.rejection_reason)
        .bind(payment.created_at)
        .bind(payment.decided_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn payment_for_update(&mut self, payment_id: Uuid) -> Result<Option<Payment>, StoreError> {
        let payment = sqlx::query_as::<_, Payment>(&format!(
            "SELECT {} FROM payments WHERE id = $1 FOR UPDATE",
            PAYMENT_COLUMNS
        ))
        .bind(payment_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(payment)
    }

    async fn update_payment(&mut self, payment: &Payment) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE payments SET
                status = $2,
                verified_by = $3,
                rejection_reason = $4,
                decided_at = $5
            WHERE id = $1
            "#,
        )
        .bind(payment.id)
        .bind(payment.status)
        .bind(payment.verified_by)
        .bind(&payment.rejection_reason)
        .bind(payment.decided_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| unique_violation(e, format!("verified payment for work order {}", payment.work_order_id)))?;

        Ok(())
    }

    async fn pending_payment_for_work_order(&mut self, work_order_id: Uuid) -> Result<Option<Payment>, StoreError> {
        let payment = sqlx::query_as::<_, Payment>(&format!(
            r#"
            SELECT {} FROM payments
            WHERE work_order_id = $1 AND status = 'pending_verification'
            ORDER BY created_at DESC
            LIMIT 1
            "#,
            PAYMENT_COLUMNS
        ))
        .bind(work_order_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(payment)
    }

    async fn insert_commission(&mut self, commission: &Commission) -> Result<(), StoreError> {
        sqlx::query(&format!(
            "INSERT INTO commissions ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
            COMMISSION_COLUMNS
        ))
        .bind(commission.id)
        .bind(commission.work_order_id)
        .bind(commission.technician_id)
        .bind(commission.payment_id)
        .bind(commission.kind)
        .bind(&commission.rate)
        .bind(commission.amount)
        .bind(commission.status)
        .bind(commission.walleted)
        .bind(commission.payout_id)
        .bind(commission.created_at)
        .bind(commission.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| {
            unique_violation(
                e,
                format!("{:?} for payment {}", commission.kind, commission.payment_id),
            )
        })?;

        Ok(())
    }

    async fn earned_commissions_for_update(&mut self, technician_id: Uuid) -> Result<Vec<Commission>, StoreError> {
        let commissions = sqlx::query_as::<_, Commission>(&format!(
            r#"
            SELECT {} FROM commissions
            WHERE technician_id = $1
            AND status = 'earned'
            AND payout_id IS NULL
            ORDER BY created_at ASC, id ASC
            FOR UPDATE
            "#,
            COMMISSION_COLUMNS
        ))
        .bind(technician_id)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(commissions)
    }

    async fn technicians_with_earned_commissions(&mut self) -> Result<Vec<Uuid>, StoreError> {
        let ids = sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT technician_id FROM commissions
            WHERE status = 'earned' AND payout_id IS NULL
            GROUP BY technician_id
            ORDER BY MIN(created_at) ASC
            "#,
        )
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(ids)
    }

    async fn commissions_for_payout(&mut self, payout_id: Uuid) -> Result<Vec<Commission>, StoreError> {
        let commissions = sqlx::query_as::<_, Commission>(&format!(
            "SELECT {} FROM commissions WHERE payout_id = $1 ORDER BY created_at ASC, id ASC FOR UPDATE",
            COMMISSION_COLUMNS
        ))
        .bind(payout_id)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(commissions)
    }

    async fn update_commission(&mut self, commission: &Commission) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE commissions SET
                status = $2,
                payout_id = $3,
                updated_at = $4
            WHERE id = $1
            "#,
        )
        .bind(commission.id)
        .bind(commission.status)
        .bind(commission.payout_id)
        .bind(commission.updated_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn list_commissions(&mut self, filter: &CommissionFilter) -> Result<(Vec<Commission>, i64), StoreError> {
        let commissions = sqlx::query_as::<_, Commission>(&format!(
            r#"
            SELECT {} FROM commissions
            WHERE ($1::uuid IS NULL OR technician_id = $1)
            AND ($2::commission_status IS NULL OR status = $2)
            ORDER BY created_at DESC, id DESC
            LIMIT $3 OFFSET $4
            "#,
            COMMISSION_COLUMNS
        ))
        .bind(filter.technician_id)
        .bind(filter.status)
        .bind(filter.limit)
        .bind(filter.offset)
        .fetch_all(&mut *self.tx)
        .await?;

        let total = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM commissions
            WHERE ($1::uuid IS NULL OR technician_id = $1)
            AND ($2::commission_status IS NULL OR status = $2)
            "#,
        )
        .bind(filter.technician_id)
        .bind(filter.status)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok((commissions, total))
    }

    async fn wallet_for_update(&mut self, technician_id: Uuid) -> Result<Option<Wallet>, StoreError> {
        let wallet = sqlx::query_as::<_, Wallet>(&format!(
            "SELECT {} FROM wallets WHERE technician_id = $1 FOR UPDATE",
            WALLET_COLUMNS
        ))
        .bind(technician_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(wallet)
    }

    async fn wallet_by_id_for_update(&mut self, wallet_id: Uuid) -> Result<Option<Wallet>, StoreError> {
        let wallet = sqlx::query_as::<_, Wallet>(&format!(
            "SELECT {} FROM wallets WHERE id = $1 FOR UPDATE",
            WALLET_COLUMNS
        ))
        .bind(wallet_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(wallet)
    }

    async fn insert_wallet(&mut self, wallet: &Wallet) -> Result<(), StoreError> {
        sqlx::query(&format!(
            r#"
            INSERT INTO wallets ({})
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (technician_id) DO NOTHING
            "#,
            WALLET_COLUMNS
        ))
        .bind(wallet.id)
        .bind(wallet.technician_id)
        .bind(wallet.balance)
        .bind(wallet.created_at)
        .bind(wallet.updated_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn update_wallet(&mut self, wallet: &Wallet) -> Result<(), StoreError> {
        sqlx::query("UPDATE wallets SET balance = $2, updated_at = $3 WHERE id = $1")
            .bind(wallet.id)
            .bind(wallet.balance)
            .bind(wallet.updated_at)
            .execute(&mut *self.tx)
            .await?;

        Ok(())
    }

    async fn insert_wallet_transaction(&mut self, transaction: &WalletTransaction) -> Result<(), StoreError> {
        sqlx::query(&format!(
            "INSERT INTO wallet_transactions ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
            WALLET_TRANSACTION_COLUMNS
        ))
        .bind(transaction.id)
        .bind(transaction.wallet_id)
        .bind(transaction.transaction_type)
        .bind(transaction.source_type)
        .bind(transaction.source_id)
        .bind(transaction.amount)
        .bind(transaction.balance_after)
        .bind(transaction.created_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn wallet_transactions(&mut self, wallet_id: Uuid) -> Result<Vec<WalletTransaction>, StoreError> {
        let transactions = sqlx::query_as::<_, WalletTransaction>(&format!(
            "SELECT {} FROM wallet_transactions WHERE wallet_id = $1 ORDER BY created_at DESC, id DESC",
            WALLET_TRANSACTION_COLUMNS
        ))
        .bind(wallet_id)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(transactions)
    }

    async fn insert_payout_request(&mut self, request: &PayoutRequest) -> Result<(), StoreError> {
        sqlx::query(&format!(
            "INSERT INTO payout_requests ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
            PAYOUT_REQUEST_COLUMNS
        ))
        .bind(request.id)
        .bind(request.technician_id)
        .bind(request.amount)
        .bind(&request.reason)
        .bind(request.status)
        .bind(request.reviewed_by)
        .bind(request.payout_id)
        .bind(request.created_at)
        .bind(request.reviewed_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn payout_request_for_update(&mut self, request_id: Uuid) -> Result<Option<PayoutRequest>, StoreError> {
        let request = sqlx::query_as::<_, PayoutRequest>(&format!(
            "SELECT {} FROM payout_requests WHERE id = $1 FOR UPDATE",
            PAYOUT_REQUEST_COLUMNS
        ))
        .bind(request_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(request)
    }

    async fn update_payout_request(&mut self, request: &PayoutRequest) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE payout_requests SET
                status = $2,
                reviewed_by = $3,
                payout_id = $4,
                reviewed_at = $5
            WHERE id = $1
            "#,
        )
        .bind(request.id)
        .bind(request.status)
        .bind(request.reviewed_by)
        .bind(request.payout_id)
        .bind(request.reviewed_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn list_payout_requests(&mut self, technician_id: Option<Uuid>) -> Result<Vec<PayoutRequest>, StoreError> {
        let requests = sqlx::query_as::<_, PayoutRequest>(&format!(
            r#"
            SELECT {} FROM payout_requests
            WHERE ($1::uuid IS NULL OR technician_id = $1)
            ORDER BY created_at DESC
            "#,
            PAYOUT_REQUEST_COLUMNS
        ))
        .bind(technician_id)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(requests)
    }

    async fn insert_payout(&mut self, payout: &Payout) -> Result<(), StoreError> {
        sqlx::query(&format!(
            "INSERT INTO payouts ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
            PAYOUT_COLUMNS
        ))
        .bind(payout.id)
        .bind(payout.technician_id)
        .bind(payout.kind)
        .bind(payout.total_amount)
        .bind(payout.disbursed_amount)
        .bind(payout.status)
        .bind(payout.created_by)
        .bind(payout.created_at)
        .bind(payout.completed_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn payout_for_update(&mut self, payout_id: Uuid) -> Result<Option<Payout>, StoreError> {
        let payout = sqlx::query_as::<_, Payout>(&format!(
            "SELECT {} FROM payouts WHERE id = $1 FOR UPDATE",
            PAYOUT_COLUMNS
        ))
        .bind(payout_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(payout)
    }

    async fn update_payout(&mut self, payout: &Payout) -> Result<(), StoreError> {
        sqlx::query("UPDATE payouts SET status = $2, completed_at = $3 WHERE id = $1")
            .bind(payout.id)
            .bind(payout.status)
            .bind(payout.completed_at)
            .execute(&mut *self.tx)
            .await?;

        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let this = *self;
        this.tx.commit().await?;
        Ok(())
    }
}
