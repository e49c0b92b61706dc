//! Business logic, one service per concern. Handlers stay thin and call
//! into these.

pub mod chat;
pub mod conversation;
pub mod orders;
pub mod payment_links;
pub mod payments;
pub mod pricing;
pub mod print_jobs;
pub mod sessions;
