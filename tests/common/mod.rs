//! In-memory marketplace for driving the crawler without a browser

#![allow(dead_code)]

use async_trait::async_trait;
use mp_scout::crawler::CrawlOptions;
use mp_scout::error::SiteError;
use mp_scout::models::{Category, ListingDetail};
use mp_scout::scrapers::types::{Picture, RawListing, RawLocation, SellerInformation};
use mp_scout::scrapers::ListingSource;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub const BASE_URL: &str = "https://fake.test";

#[derive(Debug, Clone, Copy)]
pub enum Fault {
    Forbidden,
    Site,
    Browser,
}

impl Fault {
    fn error(self, what: &str) -> SiteError {
        match self {
            Fault::Forbidden => SiteError::Forbidden(what.to_string()),
            Fault::Site => SiteError::Site(what.to_string()),
            Fault::Browser => SiteError::Browser(what.to_string()),
        }
    }
}

#[derive(Default)]
pub struct FakeSource {
    parents: Vec<Category>,
    subcategories: HashMap<i64, Vec<Category>>,
    subcategory_timeouts: HashSet<i64>,
    counts: HashMap<i64, usize>,
    pages: HashMap<(i64, u32), Vec<RawListing>>,
    broken_pages: HashMap<(i64, u32), Fault>,
    page_faults: Mutex<HashMap<(i64, u32), Vec<Fault>>>,
    detail_faults: Mutex<HashMap<String, Vec<Fault>>>,
    count_faults: Mutex<HashMap<i64, Vec<Fault>>>,
    subcategory_faults: Mutex<HashMap<i64, Vec<Fault>>>,
    broken_details: HashSet<String>,
    cancel_after: Option<(usize, CancellationToken)>,
    pub detail_calls: Mutex<Vec<String>>,
    pub page_calls: Mutex<Vec<(i64, u32)>>,
    pub count_calls: Mutex<Vec<i64>>,
}

impl FakeSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parent(mut self, id: i64, count: usize) -> Self {
        self.parents.push(category(id));
        self.counts.insert(id, count);
        self
    }

    pub fn subcategories(mut self, parent: i64, ids: &[i64]) -> Self {
        self.subcategories
            .insert(parent, ids.iter().map(|&id| category(id)).collect());
        self
    }

    /// The subcategory block of `parent` never shows up
    pub fn subcategory_timeout(mut self, parent: i64) -> Self {
        self.subcategory_timeouts.insert(parent);
        self
    }

    pub fn page(mut self, category_id: i64, page: u32, listings: Vec<RawListing>) -> Self {
        self.pages.insert((category_id, page), listings);
        self
    }

    /// Page fails with `fault` on every attempt
    pub fn broken_page(mut self, category_id: i64, page: u32, fault: Fault) -> Self {
        self.broken_pages.insert((category_id, page), fault);
        self
    }

    /// Page fails once with each fault before it loads
    pub fn flaky_page(self, category_id: i64, page: u32, faults: Vec<Fault>) -> Self {
        self.page_faults
            .lock()
            .unwrap()
            .insert((category_id, page), faults);
        self
    }

    pub fn flaky_detail(self, item_id: &str, faults: Vec<Fault>) -> Self {
        self.detail_faults
            .lock()
            .unwrap()
            .insert(item_id.to_string(), faults);
        self
    }

    /// Result count of `category_id` fails once with each fault before it loads
    pub fn flaky_count(self, category_id: i64, faults: Vec<Fault>) -> Self {
        self.count_faults
            .lock()
            .unwrap()
            .insert(category_id, faults);
        self
    }

    pub fn flaky_subcategories(self, parent: i64, faults: Vec<Fault>) -> Self {
        self.subcategory_faults
            .lock()
            .unwrap()
            .insert(parent, faults);
        self
    }

    /// Detail page of `item_id` always fails with a site error
    pub fn broken_detail(mut self, item_id: &str) -> Self {
        self.broken_details.insert(item_id.to_string());
        self
    }

    /// Cancel `token` once `calls` detail pages have been served
    pub fn cancel_after(mut self, calls: usize, token: CancellationToken) -> Self {
        self.cancel_after = Some((calls, token));
        self
    }

    pub fn detail_calls_for(&self, item_id: &str) -> usize {
        self.detail_calls
            .lock()
            .unwrap()
            .iter()
            .filter(|id| id.as_str() == item_id)
            .count()
    }
}

#[async_trait]
impl ListingSource for FakeSource {
    async fn parent_categories(&self) -> Result<Vec<Category>, SiteError> {
        Ok(self.parents.clone())
    }

    async fn subcategories(&self, parent: &Category) -> Result<Vec<Category>, SiteError> {
        if let Some(fault) = next_fault(&self.subcategory_faults, &parent.id) {
            return Err(fault.error(&parent.url));
        }
        if self.subcategory_timeouts.contains(&parent.id) {
            return Err(SiteError::Timeout(format!("{}", parent.id)));
        }
        Ok(self.subcategories.get(&parent.id).cloned().unwrap_or_default())
    }

    async fn listings_count(&self, category: &Category) -> Result<usize, SiteError> {
        self.count_calls.lock().unwrap().push(category.id);
        if let Some(fault) = next_fault(&self.count_faults, &category.id) {
            return Err(fault.error(&category.url));
        }
        self.counts
            .get(&category.id)
            .copied()
            .ok_or_else(|| SiteError::missing("div", &[("class", "results-count")]))
    }

    async fn search_page(
        &self,
        category: &Category,
        page: u32,
    ) -> Result<Vec<RawListing>, SiteError> {
        let key = (category.id, page);
        self.page_calls.lock().unwrap().push(key);

        if let Some(fault) = self.broken_pages.get(&key) {
            return Err(fault.error(&category.url));
        }
        if let Some(faults) = self.page_faults.lock().unwrap().get_mut(&key) {
            if !faults.is_empty() {
                return Err(faults.remove(0).error(&category.url));
            }
        }

        Ok(self.pages.get(&key).cloned().unwrap_or_default())
    }

    async fn listing_details(&self, listing_url: &str) -> Result<ListingDetail, SiteError> {
        let item_id = listing_url.rsplit('/').next().unwrap_or_default().to_string();
        let served = {
            let mut calls = self.detail_calls.lock().unwrap();
            calls.push(item_id.clone());
            calls.len()
        };

        if let Some((after, token)) = &self.cancel_after {
            if served >= *after {
                token.cancel();
            }
        }

        if self.broken_details.contains(&item_id) {
            return Err(SiteError::Site(listing_url.to_string()));
        }
        if let Some(faults) = self.detail_faults.lock().unwrap().get_mut(&item_id) {
            if !faults.is_empty() {
                return Err(faults.remove(0).error(listing_url));
            }
        }

        Ok(detail(&item_id))
    }

    fn listing_url(&self, vip_url: &str) -> String {
        format!("{}{}", BASE_URL, vip_url)
    }

    fn source_name(&self) -> &'static str {
        "fake"
    }
}

fn next_fault<K>(faults: &Mutex<HashMap<K, Vec<Fault>>>, key: &K) -> Option<Fault>
where
    K: std::hash::Hash + Eq,
{
    let mut faults = faults.lock().unwrap();
    match faults.get_mut(key) {
        Some(queue) if !queue.is_empty() => Some(queue.remove(0)),
        _ => None,
    }
}

pub fn category(id: i64) -> Category {
    Category::new(id, format!("{}/l/category-{}/", BASE_URL, id))
}

pub fn raw(item_id: &str, category_id: i64) -> RawListing {
    RawListing {
        item_id: item_id.to_string(),
        category_id,
        title: format!("  Item   {}  ", item_id),
        vip_url: format!("/v/category/{}", item_id),
        pictures: vec![
            Picture {
                extra_extra_large_url: Some(format!("https://img.test/{}.jpg", item_id)),
            },
            Picture {
                extra_extra_large_url: None,
            },
        ],
        location: Some(RawLocation {
            country_abbreviation: "NL".to_string(),
            city_name: "Utrecht".to_string(),
        }),
        verticals: vec!["computers".to_string()],
        seller_information: Some(SellerInformation {
            seller_id: "777".to_string(),
        }),
    }
}

/// `n` ordinary results `{prefix}1..={prefix}n` in `category_id`
pub fn raws(
    prefix: &str,
    range: std::ops::RangeInclusive<usize>,
    category_id: i64,
) -> Vec<RawListing> {
    range
        .map(|i| raw(&format!("{}{}", prefix, i), category_id))
        .collect()
}

pub fn detail(item_id: &str) -> ListingDetail {
    ListingDetail {
        description: format!("Description of {}", item_id),
        ad_type: "FIXED_PRICE".to_string(),
        types: ["Laptop".to_string()].into_iter().collect(),
        services: BTreeSet::new(),
        price_type: "FIXED".to_string(),
        price_cents: 12_500,
        view_count: 3,
        favorited_count: 1,
        listed_timestamp: "2024-05-30T08:00:00Z".to_string(),
    }
}

/// Options with no backoff so retry paths run instantly
pub fn instant_options(max_page_retries: u32) -> CrawlOptions {
    CrawlOptions {
        timeout: Duration::ZERO,
        wait: Duration::ZERO,
        max_page_retries,
    }
}

pub fn ids(listings: &[mp_scout::models::Listing]) -> Vec<&str> {
    listings.iter().map(|l| l.item_id.as_str()).collect()
}
