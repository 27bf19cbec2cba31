//! Shared domain types for the NetTray project.

pub mod config;
pub mod events;
pub mod monitor;
pub mod probe;

mod errors;

pub use errors::{NetTrayError, Result};
