//! CosMatch matcher
//!
//! Exact brute-force cosine similarity matching between two embedding
//! collections, processed in query chunks to bound peak memory.

pub mod batch;
pub mod engine;
pub mod ranking;
pub mod similarity;
pub mod types;

pub use batch::{run, BatchCoordinator, ChunkProgress, RunOutput, DEFAULT_BATCH_SIZE};
pub use engine::match_chunk;
pub use similarity::cosine_similarity;
pub use types::{default_ids, EmbeddingSet, EmbeddingView, Identifier, Match, MatchParams, QueryResult, RunStats};
