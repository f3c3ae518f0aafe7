//! Error types for fetching, transforming and writing products.

use thiserror::Error;

/// A fetch failure worth another attempt.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransientFetchError {
    #[error("request timed out")]
    Timeout,

    #[error("network error: {0}")]
    Network(String),

    #[error("upstream returned status {0}")]
    Status(u16),
}

/// A fetch failure that ends the run.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FatalFetchError {
    #[error("upstream rejected the request with status {0}")]
    Status(u16),

    #[error("malformed search response: {0}")]
    Malformed(String),

    #[error("HTTP client error: {0}")]
    Client(String),

    #[error("request failed after {attempts} attempts: {last}")]
    RetriesExhausted {
        attempts: u32,
        last: TransientFetchError,
    },
}

/// Why a raw record was dropped before reaching the store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    #[error("record is not a JSON object")]
    NotAnObject,

    #[error("record has no barcode")]
    MissingBarcode,

    #[error("record has an unusable barcode: {0}")]
    InvalidBarcode(String),
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Diesel(#[from] diesel::result::Error),

    #[error("connection pool error: {0}")]
    Pool(#[from] diesel::r2d2::PoolError),

    #[error("constraint violation: {0}")]
    Constraint(String),
}

/// A record whose transaction was rolled back.
#[derive(Error, Debug)]
#[error("failed to write product {barcode}: {source}")]
pub struct WriteError {
    pub barcode: String,
    #[source]
    pub source: StoreError,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("invalid value {value:?} for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Startup failures surfaced by the binary.
#[derive(Error, Debug)]
pub enum IngestError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Fetch(#[from] FatalFetchError),
}
