// service/wallet_service.rs
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    db::ledgerdb::{LedgerStore, LedgerTx},
    models::{usermodel::Actor, walletmodels::*},
    service::{access::require_self_or_admin, error::ServiceError},
};

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct WalletBalance {
    pub technician_id: Uuid,
    pub wallet_id: Option<Uuid>,
    pub balance: i64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct WalletIntegrityReport {
    pub wallet_id: Uuid,
    pub stored_balance: i64,
    pub ledger_balance: i64,
    pub transaction_count: usize,
}

/// A negative balance can only come from a broken ledger. It is surfaced,
/// never clamped.
pub fn checked_balance(wallet: &Wallet) -> Result<i64, ServiceError> {
    if wallet.balance < 0 {
        tracing::error!(
            wallet_id = %wallet.id,
            technician_id = %wallet.technician_id,
            balance = wallet.balance,
            "LEDGER CORRUPTION: negative wallet balance"
        );
        return Err(ServiceError::LedgerCorruption(format!(
            "wallet {} has negative balance {}",
            wallet.id, wallet.balance
        )));
    }
    Ok(wallet.balance)
}

fn positive(amount: i64) -> Result<i64, ServiceError> {
    if amount <= 0 {
        return Err(ServiceError::Validation(format!("amount must be positive, got {}", amount)));
    }
    Ok(amount)
}

/// Returns the technician's wallet, creating an empty one on first use.
pub async fn ensure_wallet(
    tx: &mut dyn LedgerTx,
    technician_id: Uuid,
    now: DateTime<Utc>,
) -> Result<Wallet, ServiceError> {
    if let Some(wallet) = tx.wallet_for_update(technician_id).await? {
        return Ok(wallet);
    }

    tx.insert_wallet(&Wallet::new(technician_id, now)).await?;
    tracing::info!("Created wallet for technician {}", technician_id);

    tx.wallet_for_update(technician_id)
        .await?
        .ok_or(ServiceError::WalletNotFound(technician_id))
}

async fn append(
    tx: &mut dyn LedgerTx,
    wallet: &mut Wallet,
    transaction_type: WalletTransactionType,
    amount: i64,
    source: SourceRef,
    now: DateTime<Utc>,
) -> Result<WalletTransaction, ServiceError> {
    let balance_after = match transaction_type {
        WalletTransactionType::Credit => wallet.balance.checked_add(amount),
        WalletTransactionType::Debit => wallet.balance.checked_sub(amount),
    }
    .ok_or_else(|| ServiceError::Validation(format!("amount {} overflows wallet {}", amount, wallet.id)))?;

    let transaction = WalletTransaction {
        id: Uuid::new_v4(),
        wallet_id: wallet.id,
        transaction_type,
        source_type: source.source_type,
        source_id: source.source_id,
        amount,
        balance_after,
        created_at: now,
    };

    tx.insert_wallet_transaction(&transaction).await?;

    wallet.balance = balance_after;
    wallet.updated_at = now;
    tx.update_wallet(wallet).await?;

    Ok(transaction)
}

/// Appends a CREDIT row and raises the balance, inside the caller's transaction.
pub async fn credit_in(
    tx: &mut dyn LedgerTx,
    wallet: &mut Wallet,
    amount: i64,
    source: SourceRef,
    now: DateTime<Utc>,
) -> Result<WalletTransaction, ServiceError> {
    let amount = positive(amount)?;
    checked_balance(wallet)?;
    append(tx, wallet, WalletTransactionType::Credit, amount, source, now).await
}

/// Appends a DEBIT row and lowers the balance, inside the caller's transaction.
/// Fails without writing anything when the balance does not cover `amount`.
pub async fn debit_in(
    tx: &mut dyn LedgerTx,
    wallet: &mut Wallet,
    amount: i64,
    source: SourceRef,
    now: DateTime<Utc>,
) -> Result<WalletTransaction, ServiceError> {
    let amount = positive(amount)?;
    let available = checked_balance(wallet)?;

    if available < amount {
        return Err(ServiceError::InsufficientFunds {
            required: amount,
            available,
        });
    }

    append(tx, wallet, WalletTransactionType::Debit, amount, source, now).await
}

#[derive(Clone)]
pub struct WalletService {
    store: Arc<dyn LedgerStore>,
}

impl WalletService {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    pub async fn credit(&self, wallet_id: Uuid, amount: i64, source: SourceRef) -> Result<WalletTransaction, ServiceError> {
        let mut tx = self.store.begin().await?;
        let mut wallet = tx
            .wallet_by_id_for_update(wallet_id)
            .await?
            .ok_or(ServiceError::WalletNotFound(wallet_id))?;

        let transaction = credit_in(tx.as_mut(), &mut wallet, amount, source, Utc::now()).await?;
        tx.commit().await?;

        tracing::info!("Credited {} to wallet {} ({:?})", amount, wallet_id, source.source_type);
        Ok(transaction)
    }

    pub async fn debit(&self, wallet_id: Uuid, amount: i64, source: SourceRef) -> Result<WalletTransaction, ServiceError> {
        let mut tx = self.store.begin().await?;
        let mut wallet = tx
            .wallet_by_id_for_update(wallet_id)
            .await?
            .ok_or(ServiceError::WalletNotFound(wallet_id))?;

        let transaction = debit_in(tx.as_mut(), &mut wallet, amount, source, Utc::now()).await?;
        tx.commit().await?;

        tracing::info!("Debited {} from wallet {} ({:?})", amount, wallet_id, source.source_type);
        Ok(transaction)
    }

    pub async fn get_balance(&self, actor: &Actor, technician_id: Uuid) -> Result<WalletBalance, ServiceError> {
        require_self_or_admin(actor, technician_id, "view wallet balance")?;

        let mut tx = self.store.begin().await?;
        let wallet = tx.wallet_for_update(technician_id).await?;

        match wallet {
            Some(wallet) => Ok(WalletBalance {
                technician_id,
                wallet_id: Some(wallet.id),
                balance: checked_balance(&wallet)?,
            }),
            None => Ok(WalletBalance {
                technician_id,
                wallet_id: None,
                balance: 0,
            }),
        }
    }

    pub async fn list_transactions(&self, actor: &Actor, technician_id: Uuid) -> Result<Vec<WalletTransaction>, ServiceError> {
        require_self_or_admin(actor, technician_id, "view wallet transactions")?;

        let mut tx = self.store.begin().await?;
        match tx.wallet_for_update(technician_id).await? {
            Some(wallet) => Ok(tx.wallet_transactions(wallet.id).await?),
            None => Ok(Vec::new()),
        }
    }

    /// Recomputes the balance from the transaction log and compares it with
    /// the stored one.
    pub async fn verify_integrity(&self, actor: &Actor, technician_id: Uuid) -> Result<WalletIntegrityReport, ServiceError> {
        require_self_or_admin(actor, technician_id, "verify wallet integrity")?;

        let mut tx = self.store.begin().await?;
        let wallet = tx
            .wallet_for_update(technician_id)
            .await?
            .ok_or(ServiceError::WalletNotFound(technician_id))?;

        let transactions = tx.wallet_transactions(wallet.id).await?;
        let ledger_balance: i64 = transactions.iter().map(|t| t.signed_amount()).sum();

        if ledger_balance != wallet.balance {
            tracing::error!(
                wallet_id = %wallet.id,
                stored = wallet.balance,
                ledger = ledger_balance,
                "LEDGER CORRUPTION: stored balance differs from transaction log"
            );
            return Err(ServiceError::LedgerCorruption(format!(
                "wallet {} stores {} but its transactions sum to {}",
                wallet.id, wallet.balance, ledger_balance
            )));
        }

        checked_balance(&wallet)?;

        Ok(WalletIntegrityReport {
            wallet_id: wallet.id,
            stored_balance: wallet.balance,
            ledger_balance,
            transaction_count: transactions.len(),
        })
    }
}
