//! Shared types for the vicino marketplace client and its API boundary.

pub mod error;
pub mod models;
pub mod protocol;

pub use error::*;
pub use models::*;
pub use protocol::*;
