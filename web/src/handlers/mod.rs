//! HTTP request handlers.
//!
//! This module contains all HTTP handlers organized by domain.

pub mod checkout;
pub mod health;
pub mod queue;

// Re-export common handler utilities
pub use health::health_check;
