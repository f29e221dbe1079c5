//! HTTP request handlers organized by domain

pub mod expenses;
pub mod reports;
pub mod users;
pub mod webhooks;

// Re-export all handlers for use in router
pub use expenses::*;
pub use reports::*;
pub use users::*;
pub use webhooks::*;
