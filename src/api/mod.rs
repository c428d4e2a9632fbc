//! HTTP surface: /verify, /cancel, /export-csv, /health.

pub mod endpoints;
pub mod error;
pub mod router;
pub mod server;
pub mod types;

pub use error::ApiError;
pub use router::verification_router;
pub use server::{start_server, ServerHandle};
pub use types::ApiContext;
