use crate::error::CrawlError;
use crate::models::Listing;

/// Result of crawling one parent category
///
/// A call that stops early still hands back everything it accepted.
#[derive(Debug)]
pub enum ListingsOutcome {
    Complete(Vec<Listing>),
    Partial {
        listings: Vec<Listing>,
        cause: CrawlError,
    },
}

impl ListingsOutcome {
    pub fn listings(&self) -> &[Listing] {
        match self {
            ListingsOutcome::Complete(listings) => listings,
            ListingsOutcome::Partial { listings, .. } => listings,
        }
    }

    pub fn cause(&self) -> Option<&CrawlError> {
        match self {
            ListingsOutcome::Complete(_) => None,
            ListingsOutcome::Partial { cause, .. } => Some(cause),
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, ListingsOutcome::Complete(_))
    }

    pub fn into_parts(self) -> (Vec<Listing>, Option<CrawlError>) {
        match self {
            ListingsOutcome::Complete(listings) => (listings, None),
            ListingsOutcome::Partial { listings, cause } => (listings, Some(cause)),
        }
    }
}
