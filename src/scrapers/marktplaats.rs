use crate::error::SiteError;
use crate::models::{Category, ListingDetail};
use crate::scrapers::extract::{self, CONTENT_ID, LISTING_ROOT_ID, SELECT_ELEM_ID};
use crate::scrapers::traits::{ListingSource, PageFetcher};
use crate::scrapers::types::{ElementLocator, ListingConfig, RawListing};
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

pub const MARKTPLAATS_BASE_URL: &str = "https://marktplaats.nl";

/// Expression holding the listing page's config blob
const LISTING_CONFIG_SCRIPT: &str = "window.__CONFIG__";

/// Marktplaats listing source driven through a page fetcher
pub struct Marktplaats<F> {
    fetcher: F,
    base_url: String,
    timeout: Duration,
}

impl<F: PageFetcher> Marktplaats<F> {
    /// Create a source for the public site
    pub fn new(fetcher: F, timeout: Duration) -> Self {
        Self::with_base_url(fetcher, MARKTPLAATS_BASE_URL, timeout)
    }

    /// Create a source against a custom base URL
    pub fn with_base_url(fetcher: F, base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            fetcher,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
        }
    }
}

#[async_trait]
impl<F: PageFetcher> ListingSource for Marktplaats<F> {
    async fn parent_categories(&self) -> Result<Vec<Category>, SiteError> {
        let doc = self.fetcher.load(&self.base_url).await?;
        extract::parent_categories(&doc, &self.base_url)
    }

    async fn subcategories(&self, parent: &Category) -> Result<Vec<Category>, SiteError> {
        self.fetcher.load(&parent.url).await?;
        let doc = self
            .fetcher
            .current_wait(&ElementLocator::id(parent.id), self.timeout)
            .await?;

        extract::subcategories(&doc, parent, &self.base_url)
    }

    async fn listings_count(&self, category: &Category) -> Result<usize, SiteError> {
        self.fetcher.load(&category.url).await?;
        let doc = self
            .fetcher
            .current_wait(&ElementLocator::id(CONTENT_ID), self.timeout)
            .await?;

        extract::listings_count(&doc)
    }

    async fn search_page(
        &self,
        category: &Category,
        page: u32,
    ) -> Result<Vec<RawListing>, SiteError> {
        let url = extract::search_url(&category.url, page);
        debug!("Fetching search page {}", url);

        self.fetcher.load(&url).await?;
        let doc = self
            .fetcher
            .current_wait(&ElementLocator::id(SELECT_ELEM_ID), self.timeout)
            .await?;

        extract::search_listings(&doc)
    }

    async fn listing_details(&self, listing_url: &str) -> Result<ListingDetail, SiteError> {
        let loaded = self.fetcher.load(listing_url).await?;

        // the listing root sometimes never shows; extraction reports what is missing
        let doc = match self
            .fetcher
            .current_wait(&ElementLocator::id(LISTING_ROOT_ID), self.timeout)
            .await
        {
            Ok(doc) => doc,
            Err(SiteError::Timeout(_)) => loaded,
            Err(err) => return Err(err),
        };

        let attributes = extract::listing_attributes(&doc)?;
        let config = ListingConfig::from_value(
            self.fetcher.execute_script(LISTING_CONFIG_SCRIPT).await?,
        )?;

        Ok(config.into_detail(
            attributes.description,
            attributes.types,
            attributes.services,
        ))
    }

    fn listing_url(&self, vip_url: &str) -> String {
        format!("{}{}", self.base_url, vip_url)
    }

    fn source_name(&self) -> &'static str {
        "Marktplaats"
    }
}
