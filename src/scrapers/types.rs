use crate::error::SiteError;
use crate::models::ListingDetail;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;

/// Snapshot of a loaded page
///
/// `scraper::Html` is not `Send`, so the raw markup is kept and parsed on
/// demand by the extractor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub url: String,
    pub html: String,
}

impl Document {
    pub fn new(url: impl Into<String>, html: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            html: html.into(),
        }
    }
}

/// Element id the fetcher should wait for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementLocator(String);

impl ElementLocator {
    pub fn id(id: impl ToString) -> Self {
        ElementLocator(id.to_string())
    }

    /// CSS form of the locator. Ids go through an attribute selector
    /// because category ids start with a digit.
    pub fn to_css(&self) -> String {
        format!("[id=\"{}\"]", self.0)
    }
}

/// One entry of the search results payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawListing {
    pub item_id: String,
    #[serde(deserialize_with = "int_or_string")]
    pub category_id: i64,
    pub title: String,
    pub vip_url: String,
    #[serde(default)]
    pub pictures: Vec<Picture>,
    #[serde(default)]
    pub location: Option<RawLocation>,
    #[serde(default)]
    pub verticals: Vec<String>,
    #[serde(default)]
    pub seller_information: Option<SellerInformation>,
}

impl RawListing {
    pub fn is_sponsored(&self) -> bool {
        self.item_id.starts_with(SPONSORED_PREFIX)
    }
}

/// Item ids of paid placements start with this
pub const SPONSORED_PREFIX: &str = "a";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Picture {
    #[serde(default)]
    pub extra_extra_large_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawLocation {
    #[serde(default)]
    pub country_abbreviation: String,
    #[serde(default)]
    pub city_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SellerInformation {
    #[serde(default, deserialize_with = "string_or_number")]
    pub seller_id: String,
}

/// `script#__NEXT_DATA__` on a search page
#[derive(Debug, Deserialize)]
pub struct NextData {
    pub props: NextProps,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NextProps {
    pub page_props: PageProps,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageProps {
    pub search_request_and_response: SearchResponse,
}

#[derive(Debug, Deserialize)]
pub struct SearchResponse {
    pub listings: Vec<RawListing>,
}

/// `window.__CONFIG__` on a listing page
#[derive(Debug, Deserialize)]
pub struct ListingConfig {
    pub listing: ListingPayload,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingPayload {
    pub ad_type: String,
    pub price_info: PriceInfo,
    pub stats: ListingStats,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceInfo {
    pub price_type: String,
    #[serde(deserialize_with = "int_or_string")]
    pub price_cents: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingStats {
    #[serde(deserialize_with = "int_or_string")]
    pub view_count: i64,
    #[serde(deserialize_with = "int_or_string")]
    pub favorited_count: i64,
    #[serde(deserialize_with = "string_or_number")]
    pub since: String,
}

impl ListingConfig {
    pub fn from_value(value: Value) -> Result<Self, SiteError> {
        serde_json::from_value(value).map_err(|e| SiteError::payload("__CONFIG__", e))
    }

    /// Fill in the page-scraped attributes
    pub fn into_detail(
        self,
        description: String,
        types: BTreeSet<String>,
        services: BTreeSet<String>,
    ) -> ListingDetail {
        let listing = self.listing;
        ListingDetail {
            description,
            ad_type: listing.ad_type,
            types,
            services,
            price_type: listing.price_info.price_type,
            price_cents: listing.price_info.price_cents,
            view_count: listing.stats.view_count,
            favorited_count: listing.stats.favorited_count,
            listed_timestamp: listing.stats.since,
        }
    }
}

fn int_or_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .ok_or_else(|| serde::de::Error::custom(format!("not an integer: {}", n))),
        Value::String(s) => s
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("not an integer: {:?}", s))),
        other => Err(serde::de::Error::custom(format!(
            "expected integer, got {}",
            other
        ))),
    }
}

fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Null => Ok(String::new()),
        other => Err(serde::de::Error::custom(format!(
            "expected string, got {}",
            other
        ))),
    }
}
