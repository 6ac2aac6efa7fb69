//! Request-independent logic behind the pages: login, monitoring aggregations and record handling.

pub mod auth_service;
pub mod monitor_service;
pub mod record_service;
