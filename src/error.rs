use thiserror::Error;

/// Signals raised while loading or reading a marketplace page
#[derive(Debug, Error)]
pub enum SiteError {
    /// The site is blocking or rate-limiting us
    #[error("Forbidden error: {0}")]
    Forbidden(String),

    /// The site rendered one of its error pages
    #[error("Marketplace error: {0}")]
    Site(String),

    #[error("Element not found with tag name {tag} and attributes: {attrs}")]
    ElementNotFound { tag: String, attrs: String },

    /// An embedded JSON payload is missing or lacks expected keys
    #[error("Malformed {payload} payload: {message}")]
    Payload {
        payload: &'static str,
        message: String,
    },

    #[error("Timed out waiting for {0}")]
    Timeout(String),

    #[error("Internet disconnected: {0}")]
    Disconnected(String),

    /// Any other browser fault. Not retried.
    #[error("Browser error: {0}")]
    Browser(String),
}

impl SiteError {
    /// Element-not-found for `tag` with the given attribute filters
    pub fn missing(tag: &str, attrs: &[(&str, &str)]) -> Self {
        let attrs = attrs
            .iter()
            .map(|(k, v)| format!("'{}': '{}'", k, v))
            .collect::<Vec<_>>()
            .join(", ");

        SiteError::ElementNotFound {
            tag: tag.to_string(),
            attrs: format!("{{{}}}", attrs),
        }
    }

    pub fn payload(payload: &'static str, message: impl ToString) -> Self {
        SiteError::Payload {
            payload,
            message: message.to_string(),
        }
    }
}

/// Reasons a crawl call stopped before finishing
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("Categories error: {0}")]
    Categories(String),

    #[error("Unexpected category ID, expected {expected} but got {got}")]
    UnexpectedCategoryId { got: i64, expected: i64 },

    #[error("Gave up on page {page} of {url} after {attempts} consecutive failures")]
    RetriesExhausted { url: String, page: u32, attempts: u32 },

    #[error("Listings interrupted")]
    Interrupted,

    #[error(transparent)]
    Site(#[from] SiteError),
}

impl CrawlError {
    /// Causes that should end the whole run rather than just this call
    pub fn is_fatal(&self) -> bool {
        matches!(self, CrawlError::Site(SiteError::Browser(_)))
    }
}

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value {value:?} for {key}: {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },

    #[error("Validation error: {0}")]
    Validation(String),
}
