//! SeaORM entities, one module per table.
//!
//! Status and state columns are plain strings at this layer; the service
//! layer parses them into the closed enums in [`crate::models`].

pub mod order;
pub mod payment;
pub mod print_job;
pub mod session;
pub mod webhook_log;
