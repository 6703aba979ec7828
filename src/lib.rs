//! Incremental crawler for the Marktplaats marketplace
//!
//! The crawler walks parent categories, their subcategories and paginated
//! search results through a browser session, and the dataset module merges
//! each run into a flat CSV file while deciding which items are due for a
//! recrawl.

pub mod config;
pub mod crawler;
pub mod dataset;
pub mod error;
pub mod models;
pub mod scrapers;
pub mod utils;

pub use config::{Cli, Settings};
pub use crawler::{run_parents, CrawlOptions, Crawler, ListingsOutcome, RunSummary};
pub use error::{ConfigError, CrawlError, DatasetError, SiteError};
pub use models::{Category, Listing, ListingDetail};
pub use scrapers::{ListingSource, PageFetcher};
