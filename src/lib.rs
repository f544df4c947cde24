pub mod config;
pub mod db;
pub mod dtos;
pub mod error;
pub mod handler;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod service;
pub mod utils;

use std::sync::Arc;

use chrono::Duration;

use config::Config;
use db::{db::DBClient, ledgerdb::LedgerStore};
use service::{
    audit_service::AuditService,
    commission_service::{CommissionEngine, CommissionPolicy},
    effects::EffectDispatcher,
    notification_service::NotificationService,
    payment_service::PaymentService,
    payout_service::PayoutService,
    wallet_service::WalletService,
    work_order_service::WorkOrderService,
};

#[derive(Clone)]
pub struct AppState {
    pub env: Config,
    pub db_client: Option<Arc<DBClient>>,
    // Services
    pub work_order_service: Arc<WorkOrderService>,
    pub payment_service: Arc<PaymentService>,
    pub payout_service: Arc<PayoutService>,
    pub wallet_service: Arc<WalletService>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("env", &self.env)
            .field("db_client", &self.db_client)
            .finish_non_exhaustive()
    }
}

impl AppState {
    /// Wires every service over `store`. `db_client` is only used to persist
    /// notifications and audit entries.
    pub fn new(config: Config, store: Arc<dyn LedgerStore>, db_client: Option<Arc<DBClient>>) -> Self {
        let notification_service = Arc::new(NotificationService::new(db_client.clone()));
        let audit_service = Arc::new(AuditService::new(db_client.clone()));
        let dispatcher = EffectDispatcher::new(notification_service, audit_service);

        let engine = CommissionEngine::new(CommissionPolicy {
            wallet_internal_technicians: config.wallet_internal_technicians,
        });

        let work_order_service = Arc::new(WorkOrderService::new(
            store.clone(),
            dispatcher.clone(),
            Duration::minutes(config.response_window_minutes),
        ));
        let payment_service = Arc::new(PaymentService::new(store.clone(), dispatcher.clone(), engine));
        let payout_service = Arc::new(PayoutService::new(store.clone(), dispatcher));
        let wallet_service = Arc::new(WalletService::new(store));

        Self {
            env: config,
            db_client,
            work_order_service,
            payment_service,
            payout_service,
            wallet_service,
        }
    }
}
