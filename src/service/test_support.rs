// service/test_support.rs
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{Duration, Utc};
use uuid::Uuid;

use crate::{
    db::{ledgerdb::LedgerStore, memorydb::MemoryStore},
    models::{
        paymentmodel::{Payment, PaymentMethod, ReviewDecision},
        technicianmodel::RateProfile,
        usermodel::{Actor, UserRole},
        workordermodel::{GeoPoint, RespondAction, WorkOrder},
    },
    service::{
        commission_service::{CommissionEngine, CommissionPolicy},
        effects::{AuditEntry, AuditSink, EffectDispatcher, Notification, Notifier},
        error::ServiceError,
        payment_service::{PaymentProof, PaymentService},
        payout_service::PayoutService,
        wallet_service::WalletService,
        work_order_service::{CompletionReport, WorkOrderService},
    },
};

#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().map(|sent| sent.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, notification: &Notification) -> Result<(), ServiceError> {
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(notification.clone());
        }
        Ok(())
    }
}

#[async_trait]
impl AuditSink for RecordingNotifier {
    async fn record(&self, _entry: &AuditEntry) -> Result<(), ServiceError> {
        Ok(())
    }
}

/// Rejects every effect it is handed.
#[derive(Debug, Clone, Copy)]
pub struct FailingSink;

#[async_trait]
impl Notifier for FailingSink {
    async fn notify(&self, _notification: &Notification) -> Result<(), ServiceError> {
        Err(ServiceError::Notification("notifier unavailable".to_string()))
    }
}

#[async_trait]
impl AuditSink for FailingSink {
    async fn record(&self, _entry: &AuditEntry) -> Result<(), ServiceError> {
        Err(ServiceError::Audit("audit sink unavailable".to_string()))
    }
}

/// Every service wired over one in-memory store.
pub struct Harness {
    pub store: MemoryStore,
    pub work_orders: WorkOrderService,
    pub payments: PaymentService,
    pub payouts: PayoutService,
    pub wallets: WalletService,
    pub admin: Actor,
    pub dispatcher: Actor,
}

impl Harness {
    pub fn new() -> Self {
        Self::build(CommissionPolicy::default(), false)
    }

    pub fn with_policy(policy: CommissionPolicy) -> Self {
        Self::build(policy, false)
    }

    pub fn with_failing_effects() -> Self {
        Self::build(CommissionPolicy::default(), true)
    }

    fn build(policy: CommissionPolicy, failing: bool) -> Self {
        let store = MemoryStore::new();
        let shared: Arc<dyn LedgerStore> = Arc::new(store.clone());

        let effects = if failing {
            EffectDispatcher::new(Arc::new(FailingSink), Arc::new(FailingSink))
        } else {
            let recorder = Arc::new(RecordingNotifier::default());
            EffectDispatcher::new(recorder.clone(), recorder)
        };

        Self {
            store,
            work_orders: WorkOrderService::new(shared.clone(), effects.clone(), Duration::minutes(30)),
            payments: PaymentService::new(shared.clone(), effects.clone(), CommissionEngine::new(policy)),
            payouts: PayoutService::new(shared.clone(), effects),
            wallets: WalletService::new(shared),
            admin: Actor::new(Uuid::new_v4(), UserRole::Admin),
            dispatcher: Actor::new(Uuid::new_v4(), UserRole::Dispatcher),
        }
    }

    pub fn technician(technician_id: Uuid) -> Actor {
        Actor::new(technician_id, UserRole::Technician)
    }

    pub fn rate(value: &str) -> BigDecimal {
        BigDecimal::from_str(value).unwrap()
    }

    pub async fn freelancer(&self, rate: &str) -> Uuid {
        self.register(RateProfile::Freelancer { commission_rate: Self::rate(rate) }).await
    }

    pub async fn internal(&self, rate: &str, base_salary: i64) -> Uuid {
        self.register(RateProfile::Internal {
            bonus_rate: Self::rate(rate),
            base_salary,
        })
        .await
    }

    async fn register(&self, profile: RateProfile) -> Uuid {
        let technician_id = Uuid::new_v4();
        self.work_orders
            .upsert_technician(&self.admin, technician_id, profile, false)
            .await
            .unwrap();
        technician_id
    }

    pub async fn block(&self, technician_id: Uuid) {
        let mut tx = self.store.begin().await.unwrap();
        let mut technician = tx.technician(technician_id).await.unwrap().unwrap();
        technician.is_blocked = true;
        tx.upsert_technician(&technician).await.unwrap();
        tx.commit().await.unwrap();
    }

    pub async fn new_work_order(&self) -> WorkOrder {
        self.work_orders
            .create(&self.dispatcher, Uuid::new_v4(), "Replace compressor".into(), None)
            .await
            .unwrap()
    }

    /// Pushes the response deadline of an ASSIGNED work order into the past.
    pub async fn expire_deadline(&self, work_order_id: Uuid) {
        let mut tx = self.store.begin().await.unwrap();
        let mut work_order = tx.work_order_for_update(work_order_id).await.unwrap().unwrap();
        work_order.response_deadline = Some(Utc::now() - Duration::minutes(1));
        tx.update_work_order(&work_order).await.unwrap();
        tx.commit().await.unwrap();
    }

    pub async fn completed_work_order(&self, technician_id: Uuid) -> WorkOrder {
        let wo = self.new_work_order().await;
        let tech = Self::technician(technician_id);

        self.work_orders.assign(&self.dispatcher, wo.id, technician_id).await.unwrap();
        self.work_orders.respond(&tech, wo.id, RespondAction::Accept).await.unwrap();
        self.work_orders
            .start(&tech, wo.id, GeoPoint { latitude: 6.45, longitude: 3.39 })
            .await
            .unwrap();
        self.work_orders
            .complete(
                &tech,
                wo.id,
                CompletionReport {
                    notes: Some("Compressor swapped".into()),
                    photos: vec!["after.jpg".into()],
                    materials: vec![],
                },
            )
            .await
            .unwrap()
    }

    pub async fn submitted_payment(&self, technician_id: Uuid, amount: i64) -> (WorkOrder, Payment) {
        let wo = self.completed_work_order(technician_id).await;
        let payment = self
            .payments
            .submit_proof(
                &Self::technician(technician_id),
                wo.id,
                PaymentProof {
                    amount,
                    method: PaymentMethod::Cash,
                    proof_ref: "receipt.jpg".into(),
                },
            )
            .await
            .unwrap();
        (wo, payment)
    }

    /// Runs a work order through to PAID_VERIFIED, earning one commission.
    pub async fn earn(&self, technician_id: Uuid, amount: i64) -> Payment {
        let (_, payment) = self.submitted_payment(technician_id, amount).await;
        self.payments
            .verify(&self.admin, payment.id, ReviewDecision::Approve, None)
            .await
            .unwrap()
            .payment
    }
}
