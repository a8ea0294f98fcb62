//! Kernel module - server infrastructure and dependencies.

pub mod ai;
pub mod blob_store;
pub mod deps;
pub mod record_store;
pub mod sse;
pub mod stream_hub;
pub mod test_dependencies;
pub mod traits;

pub use ai::{OpenAIAssetGenerator, OpenAIEmbeddingService};
pub use blob_store::LocalBlobStore;
pub use deps::ServerDeps;
pub use record_store::PgRecordStore;
pub use stream_hub::StreamHub;
pub use test_dependencies::TestDependencies;
pub use traits::*;
