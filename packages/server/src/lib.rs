// Mojifeed - API Core
//
// Photo in, emoji or sticker out: uploads are turned into a visual plus a short
// description by a vision model, embedded, stored in Postgres/pgvector and
// broadcast to live feed subscribers. Descriptions are searchable by meaning.

pub mod common;
pub mod config;
pub mod domains;
pub mod kernel;
pub mod server;

pub use config::*;
