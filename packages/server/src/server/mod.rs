// HTTP server setup (Axum + SSE)
pub mod app;
pub mod error;
pub mod routes;

pub use app::*;
