pub mod commondtos;
pub mod paymentdtos;
pub mod payoutdtos;
pub mod workorderdtos;
