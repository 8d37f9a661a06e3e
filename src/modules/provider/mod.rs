//! Data-source access: the client port, typed payloads and the GraphQL adapter
pub mod domain;
pub mod infrastructure;

pub use domain::DataSourceClient;
pub use infrastructure::WarcraftLogsClient;
