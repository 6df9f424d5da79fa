//! Text chunking for bounded-size analysis calls.

mod text_chunker;

pub use text_chunker::{ChunkError, TextChunk, TextChunker, TextChunks};
