//! Core types and constants for route navigation

pub mod types;
pub mod constants;

pub use types::*;
pub use constants::*;
