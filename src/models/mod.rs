mod columns;

use crate::scrapers::types::RawListing;
use crate::utils::format_text;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Marketplace category
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub url: String,
}

impl Category {
    pub fn new(id: i64, url: impl Into<String>) -> Self {
        Self { id, url: url.into() }
    }

    /// Last path segment of the category URL
    pub fn slug(&self) -> &str {
        self.url
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or_default()
    }
}

/// Attributes only available on the listing page itself
#[derive(Debug, Clone, PartialEq)]
pub struct ListingDetail {
    pub description: String,
    pub ad_type: String,
    pub types: BTreeSet<String>,
    pub services: BTreeSet<String>,
    pub price_type: String,
    pub price_cents: i64,
    pub view_count: i64,
    pub favorited_count: i64,
    pub listed_timestamp: String,
}

/// Persisted listing record, one CSV row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    pub item_id: String,
    pub seller_id: String,
    pub parent_category_id: i64,
    pub child_category_id: i64,
    #[serde(with = "columns::json_list")]
    pub category_verticals: Vec<String>,
    pub ad_type: String,
    pub title: String,
    pub description: String,
    pub price_type: String,
    pub price_cents: i64,
    #[serde(with = "columns::json_set")]
    pub types: BTreeSet<String>,
    #[serde(with = "columns::json_set")]
    pub services: BTreeSet<String>,
    pub listing_url: String,
    #[serde(with = "columns::json_list")]
    pub image_urls: Vec<String>,
    pub city_name: String,
    pub country_code: String,
    pub listed_timestamp: String,
    #[serde(with = "columns::timestamp")]
    pub crawled_timestamp: DateTime<Utc>,
    pub view_count: i64,
    pub favorited_count: i64,
}

impl Listing {
    /// Combine a search result with its listing page details
    pub fn assemble(
        parent: &Category,
        raw: RawListing,
        listing_url: String,
        detail: ListingDetail,
        crawled_at: DateTime<Utc>,
    ) -> Self {
        let image_urls = raw
            .pictures
            .into_iter()
            .filter_map(|picture| picture.extra_extra_large_url)
            .collect();
        let (country_code, city_name) = match raw.location {
            Some(location) => (location.country_abbreviation, location.city_name),
            None => (String::new(), String::new()),
        };
        let seller_id = raw
            .seller_information
            .map(|seller| seller.seller_id)
            .unwrap_or_default();

        Self {
            item_id: raw.item_id,
            seller_id,
            parent_category_id: parent.id,
            child_category_id: raw.category_id,
            category_verticals: raw.verticals,
            ad_type: detail.ad_type,
            title: format_text(&raw.title),
            description: format_text(&detail.description),
            price_type: detail.price_type,
            price_cents: detail.price_cents,
            types: detail.types,
            services: detail.services,
            listing_url,
            image_urls,
            city_name,
            country_code,
            listed_timestamp: detail.listed_timestamp,
            crawled_timestamp: crawled_at,
            view_count: detail.view_count,
            favorited_count: detail.favorited_count,
        }
    }
}
