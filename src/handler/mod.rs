pub mod payment;
pub mod payout;
pub mod technician;
pub mod wallet;
pub mod work_order;
