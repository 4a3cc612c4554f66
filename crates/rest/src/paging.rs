//! Search result paging.
//!
//! Search results are persisted out of process through a
//! [`SearchResultStore`] so that large result sets survive across requests,
//! restarts and scale-out. The server holds no result cache of its own; every
//! paging decision goes through the bound [`PagingProvider`].

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

/// One page read back from a [`SearchResultStore`].
#[derive(Debug, Clone, PartialEq)]
pub struct StoredPage {
    /// Resources on this page.
    pub resources: Vec<Value>,
    /// Total number of results in the stored search.
    pub total: usize,
}

/// Persistent storage for search result lists.
#[async_trait]
pub trait SearchResultStore: Send + Sync {
    /// Persists the full result list of a search.
    async fn save(&self, search_id: &str, resources: &[Value]) -> anyhow::Result<()>;

    /// Loads `count` results starting at `offset`.
    ///
    /// Returns `None` if the search is unknown or has expired.
    async fn load_page(
        &self,
        search_id: &str,
        offset: usize,
        count: usize,
    ) -> anyhow::Result<Option<StoredPage>>;
}

/// A page of a stored search, with the position it was read from.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchPage {
    /// The search this page belongs to.
    pub search_id: String,
    /// Resources on this page.
    pub resources: Vec<Value>,
    /// Total number of results in the search.
    pub total: usize,
    /// Offset of the first resource on this page.
    pub offset: usize,
    /// Requested page size.
    pub count: usize,
}

impl SearchPage {
    /// Offset of the next page, if there is one.
    pub fn next_offset(&self) -> Option<usize> {
        let next = self.offset.checked_add(self.count)?;
        (next < self.total).then_some(next)
    }

    /// Returns true if the offset lies beyond the last result.
    ///
    /// An offset equal to the total is an empty trailing page.
    pub fn is_past_end(&self) -> bool {
        self.offset > self.total
    }

    /// Offset of the previous page, if there is one.
    pub fn previous_offset(&self) -> Option<usize> {
        if self.offset >= self.count {
            Some(self.offset - self.count)
        } else if self.offset > 0 {
            Some(0)
        } else {
            None
        }
    }
}

/// Strategy for storing and paging search results.
#[async_trait]
pub trait PagingProvider: Send + Sync {
    /// Page size used when the client does not send `_count`.
    fn default_page_size(&self) -> usize;

    /// Largest page size served.
    fn maximum_page_size(&self) -> usize;

    /// Stores a result list and returns its search id.
    async fn store_results(&self, resources: Vec<Value>) -> anyhow::Result<String>;

    /// Reads a page of a stored search.
    ///
    /// Returns `None` if the search is unknown or has expired.
    async fn fetch_page(
        &self,
        search_id: &str,
        offset: usize,
        count: Option<usize>,
    ) -> anyhow::Result<Option<SearchPage>>;
}

/// Paging provider that keeps result lists in a database.
///
/// Trades per-request latency on very large searches for stable pagination
/// under concurrent writes and across server instances.
pub struct DatabaseBackedPagingProvider {
    store: Arc<dyn SearchResultStore>,
    default_page_size: usize,
    maximum_page_size: usize,
}

impl DatabaseBackedPagingProvider {
    /// Creates a provider with default page sizes (20, max 1000).
    pub fn new(store: Arc<dyn SearchResultStore>) -> Self {
        Self::with_page_sizes(store, 20, 1000)
    }

    /// Creates a provider with explicit page sizes.
    ///
    /// The maximum is raised to the default if it is smaller.
    pub fn with_page_sizes(
        store: Arc<dyn SearchResultStore>,
        default_page_size: usize,
        maximum_page_size: usize,
    ) -> Self {
        let default_page_size = default_page_size.max(1);
        Self {
            store,
            default_page_size,
            maximum_page_size: maximum_page_size.max(default_page_size),
        }
    }

    /// Page size actually served for a requested `_count`.
    pub fn effective_count(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.default_page_size)
            .clamp(1, self.maximum_page_size)
    }
}

#[async_trait]
impl PagingProvider for DatabaseBackedPagingProvider {
    fn default_page_size(&self) -> usize {
        self.default_page_size
    }

    fn maximum_page_size(&self) -> usize {
        self.maximum_page_size
    }

    async fn store_results(&self, resources: Vec<Value>) -> anyhow::Result<String> {
        let search_id = Uuid::new_v4().to_string();
        self.store.save(&search_id, &resources).await?;
        debug!(search_id = %search_id, total = resources.len(), "Stored search results");
        Ok(search_id)
    }

    async fn fetch_page(
        &self,
        search_id: &str,
        offset: usize,
        count: Option<usize>,
    ) -> anyhow::Result<Option<SearchPage>> {
        let count = self.effective_count(count);
        let Some(page) = self.store.load_page(search_id, offset, count).await? else {
            debug!(search_id = %search_id, "Search not found or expired");
            return Ok(None);
        };

        Ok(Some(SearchPage {
            search_id: search_id.to_string(),
            resources: page.resources,
            total: page.total,
            offset,
            count,
        }))
    }
}
