use crate::crawler::Crawler;
use crate::error::CrawlError;
use crate::models::{Category, Listing};
use crate::scrapers::traits::ListingSource;
use std::collections::HashSet;
use tracing::info;

/// What a pass over the parent categories produced
#[derive(Debug)]
pub struct RunSummary {
    /// New listings in crawl order
    pub listings: Vec<Listing>,
    /// Parent categories that were started, including the one that stopped the run
    pub crawled_parents: usize,
    /// Why the run ended before the last parent, if it did
    pub stop: Option<CrawlError>,
}

impl RunSummary {
    pub fn is_fatal(&self) -> bool {
        self.stop.as_ref().is_some_and(CrawlError::is_fatal)
    }
}

/// Crawl `parents` in order until `limit` new listings are collected
/// (0 = no limit) or a category stops early.
///
/// Accepted item ids are added to `excluded` so later parents skip them.
pub async fn run_parents<S: ListingSource>(
    crawler: &Crawler<S>,
    parents: &[Category],
    limit: usize,
    excluded: &mut HashSet<String>,
) -> RunSummary {
    let mut summary = RunSummary {
        listings: Vec::new(),
        crawled_parents: 0,
        stop: None,
    };
    let mut remaining = limit;

    for parent in parents {
        if limit > 0 && remaining == 0 {
            break;
        }

        let (listings, cause) = crawler
            .get_listings(parent, remaining, excluded)
            .await
            .into_parts();
        summary.crawled_parents += 1;

        excluded.extend(listings.iter().map(|listing| listing.item_id.clone()));
        if limit > 0 {
            remaining = remaining.saturating_sub(listings.len());
        }
        summary.listings.extend(listings);

        if let Some(cause) = cause {
            summary.stop = Some(cause);
            break;
        }
    }

    info!(
        "Collected {} new listings from {} of {} parent categories",
        summary.listings.len(),
        summary.crawled_parents,
        parents.len()
    );
    summary
}
