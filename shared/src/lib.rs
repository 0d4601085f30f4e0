//! Shared types and models for the Stockroom inventory ledger
//!
//! This crate contains the domain types exchanged between the backend
//! services, its persistence layer and any client of the HTTP surface.

pub mod models;
pub mod types;
pub mod validation;

pub use models::*;
pub use types::*;
pub use validation::*;
