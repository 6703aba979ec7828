//! Category and listing crawl state machine
//!
//! `Crawler::get_listings` drives subcategory discovery, paginated search
//! results and per-listing detail fetches for one parent category, returning
//! whatever it collected even when it has to stop early.

mod accumulator;
mod orchestrator;
mod outcome;
mod run;

pub use accumulator::{ListingAccumulator, SkipReason};
pub use orchestrator::{CrawlOptions, Crawler};
pub use outcome::ListingsOutcome;
pub use run::{run_parents, RunSummary};
