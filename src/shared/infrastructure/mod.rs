/// Shared infrastructure concerns
///
/// This module contains infrastructure implementations that are shared across
/// multiple bounded contexts (modules).
pub mod database;

// Re-exports for convenience
pub use database::{Database, DbPool};
