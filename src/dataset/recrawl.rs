use crate::models::Listing;
use crate::utils::diff_hours;
use chrono::{DateTime, Utc};
use std::collections::HashSet;

/// Item ids crawled less than `recrawl_hours` before `now`
///
/// These are handed to the crawler as already known. Anything older is
/// left out so it gets crawled again. When an id repeats, its last row wins.
pub fn compute_exclusion_set(
    dataset: &[Listing],
    now: DateTime<Utc>,
    recrawl_hours: f64,
) -> HashSet<String> {
    let mut fresh = HashSet::new();

    for listing in dataset {
        if diff_hours(listing.crawled_timestamp, now) < recrawl_hours {
            fresh.insert(listing.item_id.clone());
        } else {
            fresh.remove(&listing.item_id);
        }
    }

    fresh
}

pub fn has_duplicates(dataset: &[Listing]) -> bool {
    let mut seen = HashSet::new();
    dataset.iter().any(|listing| !seen.insert(listing.item_id.as_str()))
}

/// One row per item id, keeping the last occurrence in its position
pub fn dedupe(dataset: Vec<Listing>) -> Vec<Listing> {
    let mut seen = HashSet::new();
    let mut kept: Vec<Listing> = dataset
        .into_iter()
        .rev()
        .filter(|listing| seen.insert(listing.item_id.clone()))
        .collect();
    kept.reverse();
    kept
}

/// Append `new_listings` and drop the rows they supersede
pub fn merge(existing: Vec<Listing>, new_listings: Vec<Listing>) -> Vec<Listing> {
    let mut combined = existing;
    combined.extend(new_listings);
    dedupe(combined)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use std::collections::BTreeSet;

    fn listing(item_id: &str, title: &str, crawled: DateTime<Utc>) -> Listing {
        Listing {
            item_id: item_id.to_string(),
            seller_id: "s1".to_string(),
            parent_category_id: 322,
            child_category_id: 339,
            category_verticals: vec!["computers".to_string()],
            ad_type: "FIXED_PRICE".to_string(),
            title: title.to_string(),
            description: "desc".to_string(),
            price_type: "FIXED".to_string(),
            price_cents: 100,
            types: BTreeSet::new(),
            services: BTreeSet::new(),
            listing_url: format!("https://marktplaats.nl/v/{}", item_id),
            image_urls: Vec::new(),
            city_name: "Utrecht".to_string(),
            country_code: "NL".to_string(),
            listed_timestamp: "2024-01-01T00:00:00Z".to_string(),
            crawled_timestamp: crawled,
            view_count: 1,
            favorited_count: 0,
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn titles(dataset: &[Listing]) -> Vec<(&str, &str)> {
        dataset
            .iter()
            .map(|l| (l.item_id.as_str(), l.title.as_str()))
            .collect()
    }

    #[test]
    fn test_exclusion_set_boundary() {
        let now = now();
        let dataset = vec![
            listing("exact", "t", now - Duration::hours(24)),
            listing("almost", "t", now - Duration::hours(24) + Duration::seconds(1)),
            listing("recent", "t", now - Duration::minutes(5)),
            listing("old", "t", now - Duration::days(3)),
        ];

        let excluded = compute_exclusion_set(&dataset, now, 24.0);

        assert!(!excluded.contains("exact"));
        assert!(excluded.contains("almost"));
        assert!(excluded.contains("recent"));
        assert!(!excluded.contains("old"));
        assert_eq!(excluded.len(), 2);
    }

    #[test]
    fn test_exclusion_set_fractional_hours() {
        let now = now();
        let dataset = vec![
            listing("m1", "t", now - Duration::minutes(89)),
            listing("m2", "t", now - Duration::minutes(90)),
        ];

        let excluded = compute_exclusion_set(&dataset, now, 1.5);
        assert!(excluded.contains("m1"));
        assert!(!excluded.contains("m2"));
    }

    #[test]
    fn test_exclusion_set_last_row_decides() {
        let now = now();
        let dataset = vec![
            listing("m1", "fresh", now - Duration::hours(1)),
            listing("m1", "stale", now - Duration::hours(30)),
            listing("m2", "stale", now - Duration::hours(30)),
            listing("m2", "fresh", now - Duration::hours(1)),
        ];

        let excluded = compute_exclusion_set(&dataset, now, 24.0);
        assert!(!excluded.contains("m1"));
        assert!(excluded.contains("m2"));
    }

    #[test]
    fn test_dedupe_keeps_last_occurrence_in_place() {
        let now = now();
        let dataset = vec![
            listing("m1", "first", now),
            listing("m2", "only", now),
            listing("m1", "second", now),
            listing("m3", "only", now),
            listing("m1", "third", now),
        ];

        let deduped = dedupe(dataset);
        assert_eq!(
            titles(&deduped),
            vec![("m2", "only"), ("m3", "only"), ("m1", "third")]
        );
    }

    #[test]
    fn test_dedupe_is_idempotent() {
        let now = now();
        let dataset = vec![
            listing("m1", "a", now),
            listing("m2", "b", now),
            listing("m1", "c", now),
        ];

        let once = dedupe(dataset);
        let twice = dedupe(once.clone());
        assert_eq!(once, twice);
        assert!(!has_duplicates(&twice));
    }

    #[test]
    fn test_has_duplicates() {
        let now = now();
        assert!(!has_duplicates(&[]));
        assert!(!has_duplicates(&[listing("m1", "a", now), listing("m2", "b", now)]));
        assert!(has_duplicates(&[listing("m1", "a", now), listing("m1", "b", now)]));
    }

    #[test]
    fn test_merge_prefers_new_rows() {
        let now = now();
        let existing = vec![listing("m1", "old", now), listing("m2", "old", now)];
        let new_listings = vec![listing("m1", "recrawled", now), listing("m3", "new", now)];

        let merged = merge(existing, new_listings);
        assert_eq!(
            titles(&merged),
            vec![("m2", "old"), ("m1", "recrawled"), ("m3", "new")]
        );
    }
}
