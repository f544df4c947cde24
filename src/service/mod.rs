pub mod access;
pub mod audit_service;
pub mod background_jobs;
pub mod commission_service;
pub mod effects;
pub mod error;
pub mod notification_service;
pub mod payment_service;
pub mod payout_service;
pub mod wallet_service;
pub mod work_order_machine;
pub mod work_order_service;

#[cfg(test)]
pub mod test_support;
