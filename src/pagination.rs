//! Accumulating a paged listing into one list.
//!
//! Pages are requested strictly one after another. The loop stops when the
//! accumulated length reaches the reported total, and is bounded even when
//! the source misreports that total.

use std::future::Future;

use crate::models::{Channel, ChannelPage, ListOptions, PageCursor};
use crate::sdk::{ChatService, ServiceError, ServiceResult};

/// One page from any paged listing.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: PageCursor,
    pub total: usize,
}

impl From<ChannelPage> for Page<Channel> {
    fn from(page: ChannelPage) -> Self {
        Self {
            items: page.channels,
            page: page.page,
            total: page.total,
        }
    }
}

/// Items gathered so far, with the latest total and cursor.
#[derive(Debug, Clone)]
pub struct Accumulated<T> {
    pub items: Vec<T>,
    pub total: usize,
    pub page: PageCursor,
    /// Pages fetched successfully.
    pub pages: usize,
}

impl<T> Default for Accumulated<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            total: 0,
            page: PageCursor::default(),
            pages: 0,
        }
    }
}

/// Why accumulation stopped short of the reported total.
#[derive(Debug, thiserror::Error)]
pub enum PaginationError {
    #[error("listing failed after {pages} page(s): {source}")]
    Source {
        pages: usize,
        #[source]
        source: ServiceError,
    },

    #[error("listing stalled at {accumulated} of {total} items")]
    Stalled { accumulated: usize, total: usize },

    #[error("listing stopped after {max_pages} pages at {accumulated} of {total} items")]
    PageLimit {
        max_pages: usize,
        accumulated: usize,
        total: usize,
    },
}

impl<T> Accumulated<T> {
    pub fn is_complete(&self) -> bool {
        self.pages > 0 && self.items.len() >= self.total
    }

    /// Fetch pages of `limit` items until the list is complete.
    ///
    /// On error, every page fetched before the failure stays in `self`.
    pub async fn fill<F, Fut>(
        &mut self,
        limit: usize,
        max_pages: usize,
        mut fetch: F,
    ) -> Result<(), PaginationError>
    where
        F: FnMut(ListOptions) -> Fut,
        Fut: Future<Output = ServiceResult<Page<T>>>,
    {
        loop {
            if self.pages >= max_pages {
                return Err(PaginationError::PageLimit {
                    max_pages,
                    accumulated: self.items.len(),
                    total: self.total,
                });
            }

            let options = ListOptions {
                limit: Some(limit),
                page: Some(self.page.clone()),
            };
            let page = fetch(options)
                .await
                .map_err(|source| PaginationError::Source {
                    pages: self.pages,
                    source,
                })?;

            let before = self.items.len();
            self.items.extend(page.items);
            self.page = page.page;
            self.total = page.total;
            self.pages += 1;
            let added = self.items.len() - before;
            tracing::debug!(
                page = self.pages,
                added,
                accumulated = self.items.len(),
                total = self.total,
                "page fetched"
            );

            if self.items.len() > self.total {
                tracing::warn!(
                    reported = self.total,
                    accumulated = self.items.len(),
                    "listing under-reported its total"
                );
                self.total = self.items.len();
            }
            if self.items.len() >= self.total {
                return Ok(());
            }
            if added == 0 || self.page.next.is_none() {
                return Err(PaginationError::Stalled {
                    accumulated: self.items.len(),
                    total: self.total,
                });
            }
        }
    }
}

/// Outcome of a full listing: what was gathered, and why it stopped early if it did.
#[derive(Debug)]
pub struct Listing<T> {
    pub list: Accumulated<T>,
    pub error: Option<PaginationError>,
}

/// Every channel, fetched `limit` at a time.
pub async fn all_channels(
    service: &dyn ChatService,
    limit: usize,
    max_pages: usize,
) -> Listing<Channel> {
    let mut list = Accumulated::default();
    let result = list
        .fill(limit, max_pages, |options| async move {
            service.get_channels(options).await.map(Page::from)
        })
        .await;
    Listing {
        list,
        error: result.err(),
    }
}
