pub mod graphql_client;
pub mod rate_limit_info;

pub use graphql_client::WarcraftLogsClient;
pub use rate_limit_info::RateLimitInfo;
