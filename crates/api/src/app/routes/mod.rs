pub mod auth;
pub mod invoices;
pub mod system;
pub mod uploads;
