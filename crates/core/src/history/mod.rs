//! Local cache of the service's completed-job history.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::service::{HistoryItem, JobService, JobServiceError};

/// What the cache currently holds.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HistorySnapshot {
    /// Oldest first, as the service reports them.
    pub items: Vec<HistoryItem>,
    pub refreshed_at: Option<DateTime<Utc>>,
}

/// Keeps the most recent `limit` history entries.
pub struct HistoryCache {
    limit: usize,
    inner: RwLock<HistorySnapshot>,
}

impl HistoryCache {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            inner: RwLock::new(HistorySnapshot::default()),
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub async fn snapshot(&self) -> HistorySnapshot {
        self.inner.read().await.clone()
    }

    /// Replaces the cached entries with the service's current list.
    ///
    /// On error the previous entries are kept.
    pub async fn refresh(&self, service: &dyn JobService) -> Result<HistorySnapshot, JobServiceError> {
        let mut items = service.history().await?;
        if items.len() > self.limit {
            items.drain(..items.len() - self.limit);
        }
        debug!("Fetched {} history entries from {}", items.len(), service.name());

        let mut inner = self.inner.write().await;
        *inner = HistorySnapshot {
            items,
            refreshed_at: Some(Utc::now()),
        };
        info!("History refreshed ({} entries)", inner.items.len());
        Ok(inner.clone())
    }
}
