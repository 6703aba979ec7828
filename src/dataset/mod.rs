//! Flat CSV dataset of crawled listings
//!
//! The file is read once at startup and written once at the end of a run.

mod recrawl;

pub use recrawl::{compute_exclusion_set, dedupe, has_duplicates, merge};

use crate::error::DatasetError;
use crate::models::Listing;
use std::path::Path;
use tracing::{debug, warn};

/// File name of the dataset inside the data directory
pub const LISTINGS_FILE: &str = "listings.csv";

/// Read the dataset at `path`.
///
/// A missing or empty file is an empty dataset. Rows that do not
/// deserialize are skipped.
pub fn load(path: &Path) -> Result<Vec<Listing>, DatasetError> {
    if !path.is_file() {
        debug!("No dataset at {}", path.display());
        return Ok(Vec::new());
    }

    let mut reader = csv::ReaderBuilder::new().flexible(true).from_path(path)?;
    let mut listings = Vec::new();
    let mut skipped = 0usize;

    for (index, row) in reader.deserialize::<Listing>().enumerate() {
        match row {
            Ok(listing) => listings.push(listing),
            Err(err) => {
                skipped += 1;
                debug!("Skipping row {} of {}: {}", index + 1, path.display(), err);
            }
        }
    }

    if skipped > 0 {
        warn!(
            "Skipped {} unreadable rows in {}",
            skipped,
            path.display()
        );
    }

    Ok(listings)
}

/// Write the dataset to `path`, replacing any previous file
pub fn persist(dataset: &[Listing], path: &Path) -> Result<(), DatasetError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|source| DatasetError::Io {
            path: parent.display().to_string(),
            source,
        })?;
    }

    let mut writer = csv::Writer::from_path(path)?;
    for listing in dataset {
        writer.serialize(listing)?;
    }
    writer.flush().map_err(|source| DatasetError::Io {
        path: path.display().to_string(),
        source,
    })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use std::collections::BTreeSet;
    use tempfile::TempDir;

    fn sample(item_id: &str) -> Listing {
        Listing {
            item_id: item_id.to_string(),
            seller_id: "12345".to_string(),
            parent_category_id: 322,
            child_category_id: 339,
            category_verticals: vec!["computers".to_string(), "laptops, used".to_string()],
            ad_type: "FIXED_PRICE".to_string(),
            title: "Laptop \"as new\"".to_string(),
            description: "Works, fine".to_string(),
            price_type: "FIXED".to_string(),
            price_cents: 45_000,
            types: ["Laptop".to_string(), "Ultrabook".to_string()].into_iter().collect(),
            services: BTreeSet::new(),
            listing_url: format!("https://marktplaats.nl/v/{}", item_id),
            image_urls: vec!["https://img/1.jpg".to_string()],
            city_name: "Utrecht".to_string(),
            country_code: "NL".to_string(),
            listed_timestamp: "2024-05-30T08:00:00Z".to_string(),
            crawled_timestamp: Utc.with_ymd_and_hms(2024, 6, 1, 12, 30, 0).unwrap(),
            view_count: 10,
            favorited_count: 1,
        }
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let listings = load(&dir.path().join(LISTINGS_FILE)).unwrap();
        assert!(listings.is_empty());
    }

    #[test]
    fn test_load_empty_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(LISTINGS_FILE);
        std::fs::write(&path, "").unwrap();

        assert!(load(&path).unwrap().is_empty());
    }

    #[test]
    fn test_load_unrelated_csv_is_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(LISTINGS_FILE);
        std::fs::write(&path, "a,b\n1,2\n3,4\n").unwrap();

        assert!(load(&path).unwrap().is_empty());
    }

    #[test]
    fn test_persist_creates_directories_and_reloads() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("data").join(LISTINGS_FILE);
        let dataset = vec![sample("m1"), sample("m2")];

        persist(&dataset, &path).unwrap();
        let reloaded = load(&path).unwrap();

        assert_eq!(reloaded, dataset);
    }

    #[test]
    fn test_persist_overwrites() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(LISTINGS_FILE);

        persist(&[sample("m1"), sample("m2"), sample("m3")], &path).unwrap();
        persist(&[sample("m4")], &path).unwrap();

        let reloaded = load(&path).unwrap();
        assert_eq!(reloaded.len(), 1);
        assert_eq!(reloaded[0].item_id, "m4");
    }

    #[test]
    fn test_header_and_list_columns() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(LISTINGS_FILE);
        persist(&[sample("m1")], &path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let header = content.lines().next().unwrap();
        assert!(header.starts_with("item_id,seller_id,parent_category_id,child_category_id"));
        assert!(header.ends_with("crawled_timestamp,view_count,favorited_count"));
        assert!(content.contains("2024-06-01T12:30:00.000000Z"));
        assert!(content.contains(r#"[""Laptop"",""Ultrabook""]"#));
    }

    #[test]
    fn test_load_skips_bad_rows() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(LISTINGS_FILE);
        persist(&[sample("m1")], &path).unwrap();

        let mut content = std::fs::read_to_string(&path).unwrap();
        content.push_str("broken,row\n");
        std::fs::write(&path, content).unwrap();

        let reloaded = load(&path).unwrap();
        assert_eq!(reloaded.len(), 1);
        assert_eq!(reloaded[0].item_id, "m1");
    }
}
