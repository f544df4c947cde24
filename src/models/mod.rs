pub mod commissionmodel;
pub mod paymentmodel;
pub mod payoutmodel;
pub mod technicianmodel;
pub mod usermodel;
pub mod walletmodels;
pub mod workordermodel;
