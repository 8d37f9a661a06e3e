// Shared kernel used by every pipeline module

pub mod config; // Pipeline configuration
pub mod domain; // Shared domain concepts (combinations, dungeons)
pub mod errors; // Shared error types
pub mod infrastructure; // Shared infrastructure (database)
pub mod utils; // Logging and rate limiting

// Re-exports for convenience
pub use config::PipelineConfig;
pub use infrastructure::database::Database;
