use crate::crawler::accumulator::{ListingAccumulator, SkipReason};
use crate::crawler::outcome::ListingsOutcome;
use crate::error::{CrawlError, SiteError};
use crate::models::{Category, Listing, ListingDetail};
use crate::scrapers::traits::ListingSource;
use crate::scrapers::types::RawListing;
use chrono::Utc;
use std::collections::HashSet;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Timing and retry knobs for a crawl
#[derive(Debug, Clone)]
pub struct CrawlOptions {
    /// Backoff after a rate-limited or disconnected search page
    pub timeout: Duration,
    /// Backoff after a rate-limited listing page
    pub wait: Duration,
    /// Consecutive failures tolerated on one search page, 0 for no cap
    pub max_page_retries: u32,
}

impl Default for CrawlOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            wait: Duration::from_secs(10),
            max_page_retries: 10,
        }
    }
}

/// Walks categories and search pages of a listing source
pub struct Crawler<S> {
    source: S,
    options: CrawlOptions,
    cancel: CancellationToken,
}

impl<S: ListingSource> Crawler<S> {
    pub fn new(source: S, options: CrawlOptions) -> Self {
        Self::with_cancellation(source, options, CancellationToken::new())
    }

    /// Create a crawler that stops when `cancel` fires
    pub fn with_cancellation(source: S, options: CrawlOptions, cancel: CancellationToken) -> Self {
        Self {
            source,
            options,
            cancel,
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Top-level categories. Zero categories is an error.
    pub async fn get_parent_categories(&self) -> Result<Vec<Category>, CrawlError> {
        let categories = self
            .with_backoff("the category overview", || self.source.parent_categories())
            .await?;
        if categories.is_empty() {
            return Err(CrawlError::Categories(format!(
                "No parent categories found on {}",
                self.source.source_name()
            )));
        }

        info!("Found {} parent categories", categories.len());
        Ok(categories)
    }

    /// Child categories of `parent`, empty when the category UI never loads
    pub async fn get_subcategories(&self, parent: &Category) -> Result<Vec<Category>, CrawlError> {
        self.with_backoff(&parent.url, || async move {
            match self.source.subcategories(parent).await {
                Err(SiteError::Timeout(what)) => {
                    debug!("No subcategory block for {} ({})", parent.url, what);
                    Ok(Vec::new())
                }
                result => result,
            }
        })
        .await
    }

    pub async fn listings_count(&self, category: &Category) -> Result<usize, CrawlError> {
        self.with_backoff(&category.url, || self.source.listings_count(category))
            .await
    }

    /// Collect up to `limit` new listings from `parent` (0 = no limit),
    /// skipping every item id in `existing_item_ids`
    pub async fn get_listings(
        &self,
        parent: &Category,
        limit: usize,
        existing_item_ids: &HashSet<String>,
    ) -> ListingsOutcome {
        if let Err(cause) = self.check_cancelled() {
            return ListingsOutcome::Partial {
                listings: Vec::new(),
                cause,
            };
        }

        let count = match self.listings_count(parent).await {
            Ok(count) => count,
            Err(cause) => {
                error!("Failed to get listing count for {}: {}", parent.url, cause);
                return ListingsOutcome::Partial {
                    listings: Vec::new(),
                    cause,
                };
            }
        };

        let mut acc = ListingAccumulator::new(limit, count, existing_item_ids);
        info!(
            "Category \"{}\" ({}): collecting up to {} of {} listings",
            parent.slug(),
            parent.id,
            acc.target(),
            count
        );

        let result = self.fill(parent, &mut acc).await;

        info!(
            "Category \"{}\": collected {} listings (target {})",
            parent.slug(),
            acc.len(),
            acc.target()
        );

        let listings = acc.into_listings();
        match result {
            Ok(()) => ListingsOutcome::Complete(listings),
            Err(cause) => {
                warn!(
                    "Stopped category \"{}\" early with {} listings: {}",
                    parent.slug(),
                    listings.len(),
                    cause
                );
                ListingsOutcome::Partial { listings, cause }
            }
        }
    }

    async fn fill(
        &self,
        parent: &Category,
        acc: &mut ListingAccumulator,
    ) -> Result<(), CrawlError> {
        let subcategories = self.get_subcategories(parent).await?;
        let targets = if subcategories.is_empty() {
            warn!(
                "No sub-categories found. Using parent category {} ({})",
                parent.slug(),
                parent.id
            );
            vec![parent.clone()]
        } else {
            subcategories
        };

        for category in &targets {
            self.check_cancelled()?;
            if acc.is_full() {
                break;
            }

            self.crawl_category(parent, category, acc).await?;
        }

        Ok(())
    }

    /// Page through one category until it runs dry or the target is met
    async fn crawl_category(
        &self,
        parent: &Category,
        category: &Category,
        acc: &mut ListingAccumulator,
    ) -> Result<(), CrawlError> {
        let mut page: u32 = 1;
        let mut failures: u32 = 0;

        while !acc.is_full() {
            self.check_cancelled()?;

            let raw_listings = match self.source.search_page(category, page).await {
                Ok(raw_listings) => raw_listings,
                Err(SiteError::Forbidden(message)) => {
                    warn!(
                        "Probably rate-limited ({}). Waiting {} seconds...",
                        message,
                        self.options.timeout.as_secs_f64()
                    );
                    self.pause(self.options.timeout).await?;
                    continue;
                }
                Err(SiteError::Disconnected(message)) => {
                    error!("{}", message);
                    self.pause(self.options.timeout).await?;
                    continue;
                }
                Err(err @ SiteError::Browser(_)) => return Err(err.into()),
                Err(err) => {
                    failures += 1;
                    error!(
                        "Error crawling page {} of {} (attempt {}): {}",
                        page, category.url, failures, err
                    );

                    if self.options.max_page_retries > 0
                        && failures >= self.options.max_page_retries
                    {
                        return Err(CrawlError::RetriesExhausted {
                            url: category.url.clone(),
                            page,
                            attempts: failures,
                        });
                    }
                    continue;
                }
            };
            failures = 0;

            if raw_listings.is_empty() {
                info!("Ran out of listings for {} at page {}", category.url, page);
                break;
            }

            self.process_page(parent, category, raw_listings, acc).await?;
            page += 1;
        }

        Ok(())
    }

    async fn process_page(
        &self,
        parent: &Category,
        category: &Category,
        raw_listings: Vec<RawListing>,
        acc: &mut ListingAccumulator,
    ) -> Result<(), CrawlError> {
        for raw in raw_listings {
            self.check_cancelled()?;
            if acc.is_full() {
                break;
            }

            if raw.is_sponsored() {
                acc.skip(SkipReason::Sponsored);
                continue;
            }

            if acc.is_known(&raw.item_id) {
                acc.skip(SkipReason::Known);
                continue;
            }

            if raw.category_id != category.id {
                return Err(CrawlError::UnexpectedCategoryId {
                    got: raw.category_id,
                    expected: category.id,
                });
            }

            let listing_url = self.source.listing_url(&raw.vip_url);
            match self.fetch_details(&raw.item_id, &listing_url).await? {
                Some(detail) => {
                    let listing = Listing::assemble(parent, raw, listing_url, detail, Utc::now());
                    debug!("Accepted listing {} ({})", listing.item_id, listing.title);
                    acc.accept(listing);
                }
                None => acc.skip(SkipReason::Failed),
            }
        }

        Ok(())
    }

    /// Listing page details. `None` means the item should be dropped.
    async fn fetch_details(
        &self,
        item_id: &str,
        listing_url: &str,
    ) -> Result<Option<ListingDetail>, CrawlError> {
        loop {
            self.check_cancelled()?;

            match self.source.listing_details(listing_url).await {
                Ok(detail) => return Ok(Some(detail)),
                Err(SiteError::Forbidden(_)) => {
                    warn!(
                        "Got rate-limited. Retrying for listing {} in {} seconds...",
                        item_id,
                        self.options.wait.as_secs_f64()
                    );
                    self.pause(self.options.wait).await?;
                }
                Err(SiteError::Disconnected(message)) => {
                    error!("{}", message);
                    self.pause(self.options.timeout).await?;
                }
                Err(err @ SiteError::Browser(_)) => return Err(err.into()),
                Err(err @ SiteError::ElementNotFound { .. }) => {
                    error!("Unexpected element in listing {}: {}", listing_url, err);
                    return Ok(None);
                }
                Err(err) => {
                    error!("Error fetching listing {} details: {}", listing_url, err);
                    return Ok(None);
                }
            }
        }
    }

    /// Run `op` until it gets past rate limiting and disconnects
    async fn with_backoff<T, F, Fut>(&self, what: &str, mut op: F) -> Result<T, CrawlError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, SiteError>>,
    {
        loop {
            self.check_cancelled()?;

            match op().await {
                Err(SiteError::Forbidden(message)) => {
                    warn!(
                        "Probably rate-limited on {} ({}). Waiting {} seconds...",
                        what,
                        message,
                        self.options.timeout.as_secs_f64()
                    );
                    self.pause(self.options.timeout).await?;
                }
                Err(SiteError::Disconnected(message)) => {
                    error!("{}", message);
                    self.pause(self.options.timeout).await?;
                }
                result => return Ok(result?),
            }
        }
    }

    fn check_cancelled(&self) -> Result<(), CrawlError> {
        if self.cancel.is_cancelled() {
            Err(CrawlError::Interrupted)
        } else {
            Ok(())
        }
    }

    /// Sleep unless cancelled first
    async fn pause(&self, duration: Duration) -> Result<(), CrawlError> {
        tokio::select! {
            _ = self.cancel.cancelled() => Err(CrawlError::Interrupted),
            _ = tokio::time::sleep(duration) => Ok(()),
        }
    }
}
