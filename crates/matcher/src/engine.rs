use cosmatch_common::{CosMatchError, Result};
use tracing::trace;

use crate::ranking::TopN;
use crate::similarity::similarity_matrix;
use crate::types::{EmbeddingView, Match, MatchParams, QueryResult};

/// Score one chunk of queries against the full candidate collection
///
/// Returns one `QueryResult` per query that kept at least one match, in
/// query order. Matches are sorted by descending score with ties broken by
/// candidate position, filtered by `score >= threshold`, and capped at
/// `top_n`.
///
/// An empty query chunk or an empty candidate collection yields no results.
/// Dimension mismatches and invalid parameters are `InvalidInput` errors.
pub fn match_chunk(
    queries: EmbeddingView<'_>,
    candidates: EmbeddingView<'_>,
    params: &MatchParams,
) -> Result<Vec<QueryResult>> {
    params.validate()?;

    if queries.is_empty() || candidates.is_empty() {
        return Ok(Vec::new());
    }

    if queries.dim() == 0 {
        return Err(CosMatchError::invalid_input(
            "Embedding dimension must be greater than 0",
        ));
    }

    let matrix = similarity_matrix(queries.vectors(), candidates.vectors())?;
    let candidate_ids = candidates.ids();

    let mut results = Vec::new();
    for (query_id, row) in queries.ids().iter().zip(matrix.rows()) {
        let mut top = TopN::new(params.top_n);
        for (index, &score) in row.iter().enumerate() {
            if score >= params.threshold {
                top.push(index, score);
            }
        }

        if top.is_empty() {
            trace!("No candidate above threshold for query {}", query_id);
            continue;
        }

        let recommendations = top
            .into_sorted_vec()
            .into_iter()
            .map(|ranked| Match {
                candidate: candidate_ids[ranked.index].clone(),
                score: ranked.score,
            })
            .collect();

        results.push(QueryResult {
            query: query_id.clone(),
            recommendations,
        });
    }

    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EmbeddingSet, Identifier};
    use ndarray::{array, Array2};

    fn ids(names: &[&str]) -> Vec<Identifier> {
        names.iter().map(|n| Identifier::from(*n)).collect()
    }

    fn example_sets() -> (EmbeddingSet, EmbeddingSet) {
        let queries = EmbeddingSet::new(array![[1.0f32, 0.0], [0.0, 1.0]], ids(&["q1", "q2"])).unwrap();
        let candidates = EmbeddingSet::new(
            array![[1.0f32, 0.0], [0.0, -1.0], [0.7, 0.7]],
            ids(&["c1", "c2", "c3"]),
        )
        .unwrap();
        (queries, candidates)
    }

    #[test]
    fn test_worked_example() {
        let (queries, candidates) = example_sets();
        let params = MatchParams::new(2, 0.5).unwrap();

        let results = match_chunk(queries.view(), candidates.view(), &params).unwrap();
        assert_eq!(results.len(), 2);

        let q1 = &results[0];
        assert_eq!(q1.query, Identifier::from("q1"));
        assert_eq!(q1.recommendations.len(), 2);
        assert_eq!(q1.recommendations[0].candidate, Identifier::from("c1"));
        assert!((q1.recommendations[0].score - 1.0).abs() < 1e-6);
        assert_eq!(q1.recommendations[1].candidate, Identifier::from("c3"));
        assert!((q1.recommendations[1].score - 0.7071).abs() < 1e-4);

        let q2 = &results[1];
        assert_eq!(q2.query, Identifier::from("q2"));
        assert_eq!(q2.recommendations.len(), 1);
        assert_eq!(q2.recommendations[0].candidate, Identifier::from("c3"));
    }

    #[test]
    fn test_query_without_matches_is_dropped() {
        let (queries, candidates) = example_sets();
        let params = MatchParams::new(3, 0.9).unwrap();

        let results = match_chunk(queries.view(), candidates.view(), &params).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].query, Identifier::from("q1"));
    }

    #[test]
    fn test_top_n_bound_and_order() {
        let queries = EmbeddingSet::with_default_ids(array![[1.0f32, 0.2, 0.0]]).unwrap();
        let candidates = EmbeddingSet::with_default_ids(array![
            [1.0f32, 0.0, 0.0],
            [0.9, 0.3, 0.1],
            [0.2, 1.0, 0.0],
            [1.0, 0.2, 0.0],
            [-1.0, 0.0, 0.0],
        ])
        .unwrap();
        let params = MatchParams::new(2, -1.0).unwrap();

        let results = match_chunk(queries.view(), candidates.view(), &params).unwrap();
        let recs = &results[0].recommendations;
        assert_eq!(recs.len(), 2);
        assert!(recs.windows(2).all(|w| w[0].score >= w[1].score));
        assert_eq!(recs[0].candidate, Identifier::from("3"));
    }

    #[test]
    fn test_self_similarity_ranks_first_among_ties() {
        let v = [0.12f32, -0.5, 0.33, 0.9];
        let queries = EmbeddingSet::with_default_ids(Array2::from_shape_vec((1, 4), v.to_vec()).unwrap()).unwrap();
        let candidates = EmbeddingSet::new(
            Array2::from_shape_vec((3, 4), [[0.0f32, 1.0, 0.0, 0.0], v, v].concat()).unwrap(),
            ids(&["other", "first-copy", "second-copy"]),
        )
        .unwrap();
        let params = MatchParams::new(3, 0.0).unwrap();

        let results = match_chunk(queries.view(), candidates.view(), &params).unwrap();
        let recs = &results[0].recommendations;
        assert_eq!(recs[0].candidate, Identifier::from("first-copy"));
        assert_eq!(recs[1].candidate, Identifier::from("second-copy"));
        assert!((recs[0].score - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_zero_vectors_score_zero() {
        let queries = EmbeddingSet::new(array![[0.0f32, 0.0], [1.0, 1.0]], ids(&["zero", "q"])).unwrap();
        let candidates = EmbeddingSet::new(array![[0.0f32, 0.0], [1.0, 1.0]], ids(&["zero", "c"])).unwrap();
        let params = MatchParams::new(5, 0.0).unwrap();

        let results = match_chunk(queries.view(), candidates.view(), &params).unwrap();
        assert_eq!(results.len(), 2);

        for m in &results[0].recommendations {
            assert_eq!(m.score, 0.0);
        }
        assert_eq!(results[1].recommendations[0].candidate, Identifier::from("c"));
        assert_eq!(results[1].recommendations[1].score, 0.0);
        assert!(results.iter().flat_map(|r| &r.recommendations).all(|m| !m.score.is_nan()));
    }

    #[test]
    fn test_large_magnitude_self_match_is_kept() {
        let queries = EmbeddingSet::new(array![[3e19f32, 1e19]], ids(&["big"])).unwrap();
        let candidates = EmbeddingSet::new(
            array![[3e19f32, 1e19], [1e-30, 2e-30]],
            ids(&["big-copy", "tiny"]),
        )
        .unwrap();
        let params = MatchParams::new(1, 0.5).unwrap();

        let results = match_chunk(queries.view(), candidates.view(), &params).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].recommendations[0].candidate, Identifier::from("big-copy"));
        assert!((results[0].recommendations[0].score - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_empty_candidates_yield_nothing() {
        let (queries, _) = example_sets();
        let candidates = EmbeddingSet::empty(2);
        let params = MatchParams::new(2, 0.0).unwrap();

        let results = match_chunk(queries.view(), candidates.view(), &params).unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn test_empty_queries_yield_nothing() {
        let (_, candidates) = example_sets();
        let queries = EmbeddingSet::empty(2);
        let params = MatchParams::new(2, 0.0).unwrap();

        let results = match_chunk(queries.view(), candidates.view(), &params).unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn test_dimension_mismatch() {
        let queries = EmbeddingSet::with_default_ids(array![[1.0f32, 0.0, 0.0]]).unwrap();
        let (_, candidates) = example_sets();
        let params = MatchParams::new(2, 0.0).unwrap();

        let err = match_chunk(queries.view(), candidates.view(), &params).unwrap_err();
        assert!(err.is_invalid_input());
    }

    #[test]
    fn test_invalid_params_rejected() {
        let (queries, candidates) = example_sets();
        let params = MatchParams {
            top_n: 0,
            threshold: 0.5,
        };

        assert!(match_chunk(queries.view(), candidates.view(), &params).is_err());
    }

    #[test]
    fn test_threshold_monotonic() {
        let queries = EmbeddingSet::with_default_ids(array![[0.3f32, 0.8, -0.1], [1.0, 0.1, 0.4]]).unwrap();
        let candidates = EmbeddingSet::with_default_ids(array![
            [0.2f32, 0.9, 0.0],
            [1.0, 0.0, 0.5],
            [-0.3, 0.2, 0.9],
            [0.6, 0.6, 0.1],
        ])
        .unwrap();

        let count = |threshold: f32| -> Vec<usize> {
            let params = MatchParams::new(10, threshold).unwrap();
            let results = match_chunk(queries.view(), candidates.view(), &params).unwrap();
            queries
                .ids()
                .iter()
                .map(|id| {
                    results
                        .iter()
                        .find(|r| &r.query == id)
                        .map_or(0, |r| r.recommendations.len())
                })
                .collect()
        };

        let mut previous = count(-1.0);
        for step in 1..=20 {
            let current = count(-1.0 + step as f32 * 0.1);
            for (before, after) in previous.iter().zip(&current) {
                assert!(after <= before);
            }
            previous = current;
        }

        assert_eq!(count(1.0 + 1e-3), vec![0, 0]);
    }

    #[test]
    fn test_deterministic() {
        let (queries, candidates) = example_sets();
        let params = MatchParams::new(3, -1.0).unwrap();

        let first = match_chunk(queries.view(), candidates.view(), &params).unwrap();
        let second = match_chunk(queries.view(), candidates.view(), &params).unwrap();
        assert_eq!(first, second);
    }
}
