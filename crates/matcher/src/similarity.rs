//! Cosine similarity primitives

use cosmatch_common::{CosMatchError, Result};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};

/// Cosine similarity of two vectors of equal length
///
/// Returns 0.0 when either vector has zero norm. The result is clamped to
/// [-1.0, 1.0] to absorb rounding error.
pub fn cosine_similarity(a: ArrayView1<'_, f32>, b: ArrayView1<'_, f32>) -> f32 {
    debug_assert_eq!(a.len(), b.len());
    scaled_dot(a, b, norm(a), norm(b))
}

/// Euclidean norm of every row
///
/// Accumulated in f64: squares of any finite f32 fit without overflow or underflow.
pub fn row_norms(matrix: ArrayView2<'_, f32>) -> Array1<f64> {
    matrix.rows().into_iter().map(norm).collect()
}

fn dot(a: ArrayView1<'_, f32>, b: ArrayView1<'_, f32>) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| f64::from(*x) * f64::from(*y))
        .sum()
}

fn norm(v: ArrayView1<'_, f32>) -> f64 {
    dot(v, v).sqrt()
}

/// Pairwise cosine similarity matrix (rows = queries, columns = candidates)
///
/// Every entry depends only on its own query and candidate rows, so a chunk's
/// rows are identical to the matching rows of a larger matrix.
pub fn similarity_matrix(
    queries: ArrayView2<'_, f32>,
    candidates: ArrayView2<'_, f32>,
) -> Result<Array2<f32>> {
    if queries.ncols() != candidates.ncols() {
        return Err(CosMatchError::invalid_input(format!(
            "Dimension mismatch: queries have {} components, candidates have {}",
            queries.ncols(),
            candidates.ncols()
        )));
    }

    let query_norms = row_norms(queries);
    let candidate_norms = row_norms(candidates);

    let matrix = Array2::from_shape_fn((queries.nrows(), candidates.nrows()), |(i, j)| {
        scaled_dot(
            queries.row(i),
            candidates.row(j),
            query_norms[i],
            candidate_norms[j],
        )
    });

    Ok(matrix)
}

fn scaled_dot(a: ArrayView1<'_, f32>, b: ArrayView1<'_, f32>, norm_a: f64, norm_b: f64) -> f32 {
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    let sim = ((dot(a, b) / (norm_a * norm_b)) as f32).clamp(-1.0, 1.0);
    // -0.0 would sort below 0.0 under total ordering
    if sim == 0.0 {
        0.0
    } else {
        sim
    }
}
