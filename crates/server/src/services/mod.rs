pub mod accounts;
pub mod billing;
pub mod booking;
pub mod chat;
pub mod lots;
pub mod stats;
