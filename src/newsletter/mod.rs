//! Newsletter record resolution subsystem.
//!
//! # Data Flow
//! ```text
//! client id
//!     → keys.rs (normalize id, build ordered key candidates)
//!     → resolver.rs (probe each candidate, wildcard scan last)
//!     → record.rs (JSON string / hash → RawRecord → Article)
//!
//! writes:
//!     mutation.rs (create, flag updates, delete) → resolver.rs for lookups
//! ```

pub mod keys;
pub mod mutation;
pub mod record;
pub mod resolver;

use thiserror::Error;

use crate::store::StoreError;

pub use keys::{KeyCandidate, KeyPattern, NewsletterId};
pub use mutation::{ArticlePatch, NewNewsletter};
pub use record::{Article, RawRecord, Representation};
pub use resolver::{ArticleSummary, ProbeReport, Resolved, Resolver};

/// Errors surfaced by newsletter lookups and writes.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("newsletter id is required")]
    MissingId,

    #[error("newsletter '{0}' not found")]
    NotFound(String),

    #[error("newsletter '{0}' already exists")]
    Conflict(String),

    #[error("invalid newsletter payload: {0}")]
    InvalidPayload(String),

    #[error("store error: {source}")]
    Store {
        /// Keys probed before the failure.
        attempted: Vec<String>,
        #[source]
        source: StoreError,
    },
}

impl ResolveError {
    pub(crate) fn store(attempted: &[String], source: StoreError) -> Self {
        ResolveError::Store {
            attempted: attempted.to_vec(),
            source,
        }
    }
}

impl From<StoreError> for ResolveError {
    fn from(source: StoreError) -> Self {
        ResolveError::Store {
            attempted: Vec::new(),
            source,
        }
    }
}
