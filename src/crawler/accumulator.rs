use crate::models::Listing;
use std::collections::HashSet;

/// Why a raw search result was not turned into a listing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Paid placement
    Sponsored,
    /// Already in the exclusion set or accepted earlier in this call
    Known,
    /// Detail page could not be scraped
    Failed,
}

/// Listings collected by one `get_listings` call, plus the moving target
///
/// The target starts at the requested limit clamped to the category's
/// reported size. When no real cap was requested (the target equals the
/// category size) known items lower the target, so the result counts only
/// new listings. Failed items always lower it because they are not replaced.
#[derive(Debug)]
pub struct ListingAccumulator {
    listings: Vec<Listing>,
    known: HashSet<String>,
    target: usize,
    uncapped: bool,
}

impl ListingAccumulator {
    /// `limit == 0` means unlimited
    pub fn new(limit: usize, category_count: usize, existing: &HashSet<String>) -> Self {
        let target = if limit == 0 || limit > category_count {
            category_count
        } else {
            limit
        };

        Self {
            listings: Vec::new(),
            known: existing.clone(),
            target,
            uncapped: target == category_count,
        }
    }

    pub fn target(&self) -> usize {
        self.target
    }

    pub fn is_uncapped(&self) -> bool {
        self.uncapped
    }

    pub fn len(&self) -> usize {
        self.listings.len()
    }

    pub fn is_full(&self) -> bool {
        self.listings.len() >= self.target
    }

    pub fn is_known(&self, item_id: &str) -> bool {
        self.known.contains(item_id)
    }

    pub fn skip(&mut self, reason: SkipReason) {
        match reason {
            SkipReason::Sponsored => {}
            SkipReason::Known if !self.uncapped => {}
            SkipReason::Known | SkipReason::Failed => {
                self.target = self.target.saturating_sub(1);
            }
        }
    }

    pub fn accept(&mut self, listing: Listing) {
        self.known.insert(listing.item_id.clone());
        self.listings.push(listing);
    }

    pub fn into_listings(self) -> Vec<Listing> {
        self.listings
    }
}
