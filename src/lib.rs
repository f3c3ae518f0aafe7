//! Fetch OpenFoodFacts search results, normalize them and upsert them into
//! a relational store.
//!
//! The pieces, leaf first: [`normalize`] and [`extract`] clean up raw text
//! fields, [`fetch`] pages through the search API under a rate limit,
//! [`transform`] turns one raw record into typed facts, [`upsert`] writes
//! them idempotently through a [`store::ProductStore`], and [`pipeline`]
//! drives the whole run.

pub mod config;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod logging;
pub mod models;
pub mod normalize;
pub mod pipeline;
pub mod schema;
pub mod store;
pub mod transform;
pub mod upsert;

// Re-export the types a caller needs for a run
pub use crate::config::IngestConfig;
pub use crate::error::{FatalFetchError, IngestError, SkipReason, TransientFetchError, WriteError};
pub use crate::extract::{RawRecord, get_packaging};
pub use crate::fetch::{OffClient, Page, PageSource, RateLimiter, RetryPolicy};
pub use crate::normalize::{TextNormalizer, capitalize_text, normalize_text, split_text};
pub use crate::pipeline::{IngestionPipeline, RunOutcome, RunSummary};
pub use crate::store::{MemoryStore, PgStore, ProductStore};
pub use crate::transform::{RecordTransformer, TransformedRecord};
pub use crate::upsert::{UpsertWriter, WriteOutcome};
