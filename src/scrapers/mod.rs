pub mod browser;
pub mod extract;
pub mod marktplaats;
pub mod traits;
pub mod types;

pub use browser::{BrowserOptions, ChromeFetcher};
pub use marktplaats::{Marktplaats, MARKTPLAATS_BASE_URL};
pub use traits::{ListingSource, PageFetcher};
