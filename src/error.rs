use thiserror::Error;

/// Transport or HTTP failure, raised once the fetcher has given up retrying.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("no page for {url}")]
    NotFound { url: String },
}

/// The "posted on" text matched neither known format.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DateFormatError {
    #[error("no posting-date marker in {0:?}")]
    MissingMarker(String),

    #[error("unknown month {0:?}")]
    UnknownMonth(String),

    #[error("invalid date {0:?}")]
    Invalid(String),
}

/// A detail page was fetched but a required field could not be located.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("missing {field} on {url}")]
    MissingField { field: &'static str, url: String },

    #[error("bad posting date on {url}: {source}")]
    Date {
        url: String,
        #[source]
        source: DateFormatError,
    },
}

impl ExtractionError {
    /// Name of the field that failed to extract.
    pub fn field(&self) -> &'static str {
        match self {
            ExtractionError::MissingField { field, .. } => field,
            ExtractionError::Date { .. } => "date_posted",
        }
    }
}

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("could not prepare database directory: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load settings: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid selector {name} = {selector:?}: {reason}")]
    Selector {
        name: &'static str,
        selector: String,
        reason: String,
    },

    #[error("invalid base listing url {0:?}")]
    BaseUrl(String),
}
