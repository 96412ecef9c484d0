// Per-agent knowledge stores: lifecycle, retrieval and ingestion

pub mod identifiers;
pub mod ingest;
pub mod retriever;
pub mod store;

pub use identifiers::*;
pub use ingest::*;
pub use retriever::*;
pub use store::*;
