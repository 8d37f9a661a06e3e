use super::ranking::Ranking;
use crate::shared::domain::Combination;
use crate::shared::errors::AppError;

/// One page of ranking fetch work for a combination
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankingBatch {
    pub combination: Combination,
    /// Rankings kept from each page
    pub batch_size: u32,
    pub page: u32,
}

impl RankingBatch {
    pub fn first(combination: Combination, batch_size: u32) -> Self {
        Self {
            combination,
            batch_size,
            page: 1,
        }
    }

    pub fn next_page(&self) -> Self {
        Self {
            page: self.page + 1,
            ..self.clone()
        }
    }

    pub fn key(&self) -> String {
        self.combination.key()
    }
}

impl std::fmt::Display for RankingBatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} page {}", self.combination.key(), self.page)
    }
}

/// Parsed outcome of one batch
#[derive(Debug, Clone)]
pub struct BatchResult {
    pub batch: RankingBatch,
    pub rankings: Vec<Ranking>,
    pub has_more_pages: bool,
    pub error: Option<AppError>,
    /// Retries spent on this batch, rate-limit waits included
    pub retries: u32,
    /// Calls made against the data source
    pub api_requests: u64,
}

impl BatchResult {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}
