pub mod auditdb;
pub mod db;
pub mod ledgerdb;
pub mod memorydb;
pub mod pgledgerdb;
