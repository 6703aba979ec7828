use crate::error::SiteError;
use crate::models::{Category, ListingDetail};
use crate::scrapers::types::{Document, ElementLocator, RawListing};
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

/// Browser session the scrapers drive
///
/// Every returned `Document` has already been checked for marketplace
/// error pages, so callers only see content or a `SiteError`.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Navigate to `url` and snapshot the page
    async fn load(&self, url: &str) -> Result<Document, SiteError>;

    /// Evaluate a JavaScript expression on the current page
    async fn execute_script(&self, expression: &str) -> Result<Value, SiteError>;

    /// Block until `locator` is present on the current page, then snapshot it
    async fn current_wait(
        &self,
        locator: &ElementLocator,
        timeout: Duration,
    ) -> Result<Document, SiteError>;
}

/// Site-level operations the crawler is written against
#[async_trait]
pub trait ListingSource: Send + Sync {
    async fn parent_categories(&self) -> Result<Vec<Category>, SiteError>;

    async fn subcategories(&self, parent: &Category) -> Result<Vec<Category>, SiteError>;

    async fn listings_count(&self, category: &Category) -> Result<usize, SiteError>;

    /// Raw results of one search page, empty once the category is exhausted
    async fn search_page(&self, category: &Category, page: u32)
        -> Result<Vec<RawListing>, SiteError>;

    async fn listing_details(&self, listing_url: &str) -> Result<ListingDetail, SiteError>;

    /// Absolute listing URL for a search result's relative path
    fn listing_url(&self, vip_url: &str) -> String;

    /// Get the name of the marketplace
    fn source_name(&self) -> &'static str;
}
