//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware stack)
//!     → request.rs (request id, trace span, metrics)
//!     → extract.rs (Json / Query / Path with JSON rejections)
//!     → articles.rs (newsletter API handlers)
//!     → newsletter::Resolver
//!     → error.rs (ResolveError → status + JSON body)
//! ```

pub mod articles;
pub mod error;
pub mod extract;
pub mod request;
pub mod server;

pub use error::ApiError;
pub use request::X_REQUEST_ID;
pub use server::{AppState, HttpServer};
