use cosmatch_common::{CosMatchError, Result};
use rayon::prelude::*;
use std::ops::Range;
use tracing::{debug, info};

use crate::engine::match_chunk;
use crate::types::{EmbeddingSet, MatchParams, QueryResult, RunStats};

/// Default number of queries scored per chunk
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Progress report emitted after each chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkProgress {
    /// Zero-based chunk index
    pub index: usize,

    /// Total number of chunks in the run
    pub total: usize,

    /// Query range covered by the chunk
    pub start: usize,
    pub end: usize,

    /// Queries in this chunk that kept at least one match
    pub matched: usize,
}

/// Results of a full run
#[derive(Debug, Clone, PartialEq)]
pub struct RunOutput {
    /// Query results in original query order
    pub results: Vec<QueryResult>,

    pub stats: RunStats,
}

/// Splits the query collection into chunks and scores each against all candidates
#[derive(Debug, Clone)]
pub struct BatchCoordinator {
    params: MatchParams,
    batch_size: usize,
    parallel: bool,
}

impl BatchCoordinator {
    /// Create coordinator
    pub fn new(params: MatchParams, batch_size: usize) -> Result<Self> {
        params.validate()?;

        if batch_size == 0 {
            return Err(CosMatchError::invalid_input("batch_size must be at least 1"));
        }

        Ok(Self {
            params,
            batch_size,
            parallel: false,
        })
    }

    /// Score chunks on the rayon thread pool
    ///
    /// Every chunk in flight holds its own similarity matrix, so peak memory
    /// grows with the number of worker threads.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn params(&self) -> &MatchParams {
        &self.params
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Chunk boundaries for `total` queries (last chunk may be shorter)
    pub fn chunk_ranges(&self, total: usize) -> Vec<Range<usize>> {
        (0..total)
            .step_by(self.batch_size)
            .map(|start| start..(start + self.batch_size).min(total))
            .collect()
    }

    /// Run matching over all queries
    pub fn run(&self, queries: &EmbeddingSet, candidates: &EmbeddingSet) -> Result<RunOutput> {
        self.run_with_progress(queries, candidates, |_| {})
    }

    /// Run matching, invoking `on_chunk` after each chunk completes
    ///
    /// In parallel mode the callback runs on worker threads and chunks may
    /// complete out of order; the returned results are always in query order.
    pub fn run_with_progress<F>(
        &self,
        queries: &EmbeddingSet,
        candidates: &EmbeddingSet,
        on_chunk: F,
    ) -> Result<RunOutput>
    where
        F: Fn(ChunkProgress) + Sync,
    {
        let ranges = self.chunk_ranges(queries.len());
        let total = ranges.len();

        info!(
            "Matching {} queries against {} candidates (top_n={}, threshold={}, batch_size={}, chunks={}, parallel={})",
            queries.len(),
            candidates.len(),
            self.params.top_n,
            self.params.threshold,
            self.batch_size,
            total,
            self.parallel
        );

        let score_chunk = |(index, range): (usize, &Range<usize>)| -> Result<Vec<QueryResult>> {
            debug!(
                "Chunk {}/{}: queries {}..{}",
                index + 1,
                total,
                range.start,
                range.end
            );

            let chunk = queries.slice(range.clone());
            let results = match_chunk(chunk, candidates.view(), &self.params)?;

            on_chunk(ChunkProgress {
                index,
                total,
                start: range.start,
                end: range.end,
                matched: results.len(),
            });

            Ok(results)
        };

        // Each chunk owns its result list; concatenation restores query order
        let per_chunk: Vec<Vec<QueryResult>> = if self.parallel {
            ranges
                .par_iter()
                .enumerate()
                .map(score_chunk)
                .collect::<Result<_>>()?
        } else {
            ranges
                .iter()
                .enumerate()
                .map(score_chunk)
                .collect::<Result<_>>()?
        };

        let results: Vec<QueryResult> = per_chunk.into_iter().flatten().collect();

        let stats = RunStats {
            total_queries: queries.len(),
            total_candidates: candidates.len(),
            matched_queries: results.len(),
            total_recommendations: results.iter().map(|r| r.recommendations.len()).sum(),
            batches: total,
        };

        info!(
            "Matching completed - {} of {} queries matched, {} recommendations",
            stats.matched_queries, stats.total_queries, stats.total_recommendations
        );

        Ok(RunOutput { results, stats })
    }
}

/// Run matching with a one-off coordinator
pub fn run(
    queries: &EmbeddingSet,
    candidates: &EmbeddingSet,
    top_n: usize,
    threshold: f32,
    batch_size: usize,
) -> Result<RunOutput> {
    let params = MatchParams::new(top_n, threshold)?;
    BatchCoordinator::new(params, batch_size)?.run(queries, candidates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Identifier;
    use ndarray::Array2;
    use std::sync::Mutex;

    /// Deterministic pseudo-random collection
    fn synthetic(n: usize, dim: usize, seed: u64, prefix: &str) -> EmbeddingSet {
        let mut state = seed;
        let data: Vec<f32> = (0..n * dim)
            .map(|_| {
                state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
                ((state >> 33) as f32 / (1u64 << 31) as f32) * 2.0 - 1.0
            })
            .collect();
        let ids = (0..n).map(|i| Identifier::Text(format!("{}{}", prefix, i))).collect();
        EmbeddingSet::new(Array2::from_shape_vec((n, dim), data).unwrap(), ids).unwrap()
    }

    #[test]
    fn test_chunk_ranges() {
        let params = MatchParams::new(1, 0.0).unwrap();
        let coordinator = BatchCoordinator::new(params, 4).unwrap();
        assert_eq!(coordinator.batch_size(), 4);
        assert_eq!(coordinator.params(), &params);

        assert_eq!(coordinator.chunk_ranges(10), vec![0..4, 4..8, 8..10]);
        assert_eq!(coordinator.chunk_ranges(8), vec![0..4, 4..8]);
        assert!(coordinator.chunk_ranges(0).is_empty());
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let params = MatchParams::new(1, 0.0).unwrap();
        let err = BatchCoordinator::new(params, 0).unwrap_err();
        assert!(err.is_invalid_input());
    }

    #[test]
    fn test_batch_size_transparency() {
        let queries = synthetic(23, 8, 7, "q");
        let candidates = synthetic(31, 8, 11, "c");

        let reference = run(&queries, &candidates, 4, 0.1, queries.len()).unwrap();
        assert!(!reference.results.is_empty());

        for batch_size in [1, 2, 5, 7, 22, 23, 100] {
            let output = run(&queries, &candidates, 4, 0.1, batch_size).unwrap();
            assert_eq!(output.results, reference.results, "batch_size={}", batch_size);
            assert_eq!(output.stats.matched_queries, reference.stats.matched_queries);
            assert_eq!(
                output.stats.total_recommendations,
                reference.stats.total_recommendations
            );
        }
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let queries = synthetic(40, 6, 3, "q");
        let candidates = synthetic(25, 6, 5, "c");
        let params = MatchParams::new(3, 0.0).unwrap();

        let sequential = BatchCoordinator::new(params, 6).unwrap().run(&queries, &candidates).unwrap();
        let parallel = BatchCoordinator::new(params, 6)
            .unwrap()
            .with_parallel(true)
            .run(&queries, &candidates)
            .unwrap();

        assert_eq!(parallel, sequential);
    }

    #[test]
    fn test_results_keep_query_order() {
        let queries = synthetic(30, 4, 17, "q");
        let candidates = synthetic(10, 4, 19, "c");

        let output = run(&queries, &candidates, 2, -1.0, 4).unwrap();
        // threshold -1.0 keeps every query
        let order: Vec<&Identifier> = output.results.iter().map(|r| &r.query).collect();
        let expected: Vec<&Identifier> = queries.ids().iter().collect();
        assert_eq!(order, expected);
    }

    #[test]
    fn test_stats() {
        let queries = synthetic(12, 5, 23, "q");
        let candidates = synthetic(9, 5, 29, "c");

        let output = run(&queries, &candidates, 3, 0.3, 5).unwrap();
        let stats = output.stats;
        assert_eq!(stats.total_queries, 12);
        assert_eq!(stats.total_candidates, 9);
        assert_eq!(stats.batches, 3);
        assert_eq!(stats.matched_queries, output.results.len());
        assert_eq!(
            stats.total_recommendations,
            output.results.iter().map(|r| r.recommendations.len()).sum::<usize>()
        );
        assert!(output.results.iter().all(|r| !r.recommendations.is_empty() && r.recommendations.len() <= 3));
    }

    #[test]
    fn test_empty_queries() {
        let queries = EmbeddingSet::empty(5);
        let candidates = synthetic(9, 5, 29, "c");

        let output = run(&queries, &candidates, 3, 0.3, 5).unwrap();
        assert!(output.results.is_empty());
        assert_eq!(output.stats.total_queries, 0);
        assert_eq!(output.stats.matched_queries, 0);
        assert_eq!(output.stats.total_recommendations, 0);
        assert_eq!(output.stats.batches, 0);
    }

    #[test]
    fn test_empty_candidates() {
        let queries = synthetic(7, 5, 31, "q");
        let candidates = EmbeddingSet::empty(5);

        let output = run(&queries, &candidates, 3, 0.0, 2).unwrap();
        assert!(output.results.is_empty());
        assert_eq!(output.stats.total_queries, 7);
        assert_eq!(output.stats.total_recommendations, 0);
    }

    #[test]
    fn test_chunk_error_aborts_run() {
        let queries = synthetic(7, 5, 31, "q");
        let candidates = synthetic(3, 4, 37, "c");

        let err = run(&queries, &candidates, 3, 0.0, 2).unwrap_err();
        assert!(err.is_invalid_input());
    }

    #[test]
    fn test_progress_callback() {
        let queries = synthetic(10, 3, 41, "q");
        let candidates = synthetic(4, 3, 43, "c");
        let params = MatchParams::new(2, -1.0).unwrap();
        let seen = Mutex::new(Vec::new());

        BatchCoordinator::new(params, 4)
            .unwrap()
            .run_with_progress(&queries, &candidates, |p| seen.lock().unwrap().push(p))
            .unwrap();

        let seen = seen.into_inner().unwrap();
        assert_eq!(seen.len(), 3);
        assert_eq!(seen[2], ChunkProgress { index: 2, total: 3, start: 8, end: 10, matched: 2 });
    }

    #[test]
    fn test_deterministic_runs() {
        let queries = synthetic(15, 6, 47, "q");
        let candidates = synthetic(15, 6, 53, "c");

        let first = run(&queries, &candidates, 5, 0.2, 4).unwrap();
        let second = run(&queries, &candidates, 5, 0.2, 4).unwrap();
        assert_eq!(first, second);
    }
}
