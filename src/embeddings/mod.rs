// Embedding generation, text chunking and document extraction

pub mod document_processor;
pub mod embedder;
pub mod text_chunker;

pub use document_processor::*;
pub use embedder::*;
pub use text_chunker::*;
