//! Read-only dashboard for the article tracker.
//!
//! This module serves the ledger's aggregates as JSON and as a minimal HTML
//! page. It shares the durable store with the poll cycle but never writes.

pub mod error;
pub mod handlers;
pub mod router;
pub mod server;

pub use error::ApiError;
pub use handlers::AppState;
pub use router::create_router;
pub use server::DashboardServer;
