pub mod client;
pub mod dto;
pub mod queries;

pub use client::DataSourceClient;
pub use dto::{PlayerDetails, RankingsPage, ReportFights};
