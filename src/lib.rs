//! Newsletter reader backend library.
//!
//! Serves newsletter records kept in Redis (or Upstash) to the reading UI,
//! resolving each id across the key naming conventions records have been
//! stored under over time.

pub mod config;
pub mod debug;
pub mod http;
pub mod lifecycle;
pub mod newsletter;
pub mod observability;
pub mod store;

pub use config::AppConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use newsletter::{Article, Resolver};
pub use store::{MemoryStore, Store};
