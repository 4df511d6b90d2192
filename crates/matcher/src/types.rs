use cosmatch_common::{CosMatchError, Result};
use ndarray::{s, Array2, ArrayView2};
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::ops::Range;

/// Opaque identifier attached to an embedding
///
/// Decided once when a collection is loaded; echoed back verbatim in results.
/// Numbers that do not fit an `i64` (floats, integers above `i64::MAX`) are
/// kept as their decimal text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(untagged)]
pub enum Identifier {
    /// Integer-like id
    Int(i64),

    /// String-like id
    Text(String),
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{}", v),
            Self::Text(v) => f.write_str(v),
        }
    }
}

impl<'de> Deserialize<'de> for Identifier {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        deserializer.deserialize_any(IdentifierVisitor)
    }
}

struct IdentifierVisitor;

impl<'de> Visitor<'de> for IdentifierVisitor {
    type Value = Identifier;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a number or a string identifier")
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> std::result::Result<Identifier, E> {
        Ok(Identifier::Int(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<Identifier, E> {
        Ok(match i64::try_from(v) {
            Ok(v) => Identifier::Int(v),
            Err(_) => Identifier::Text(v.to_string()),
        })
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> std::result::Result<Identifier, E> {
        Ok(Identifier::Text(v.to_string()))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<Identifier, E> {
        Ok(Identifier::Text(v.to_string()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> std::result::Result<Identifier, E> {
        Ok(Identifier::Text(v))
    }
}

impl From<i64> for Identifier {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<String> for Identifier {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<&str> for Identifier {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

/// Positional identifiers "0", "1", ... for collections shipped without ids
pub fn default_ids(n: usize) -> Vec<Identifier> {
    (0..n).map(|i| Identifier::Text(i.to_string())).collect()
}

/// Embedding collection: dense vectors paired index-for-index with identifiers
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingSet {
    vectors: Array2<f32>,
    ids: Vec<Identifier>,
}

impl EmbeddingSet {
    /// Create a collection, validating shape and contents
    pub fn new(vectors: Array2<f32>, ids: Vec<Identifier>) -> Result<Self> {
        if vectors.nrows() != ids.len() {
            return Err(CosMatchError::invalid_input(format!(
                "{} vectors but {} identifiers",
                vectors.nrows(),
                ids.len()
            )));
        }

        if vectors.nrows() > 0 && vectors.ncols() == 0 {
            return Err(CosMatchError::invalid_input(
                "Embedding dimension must be greater than 0",
            ));
        }

        if let Some(((row, col), value)) = vectors.indexed_iter().find(|(_, v)| !v.is_finite()) {
            return Err(CosMatchError::invalid_input(format!(
                "Non-finite value {} at vector {}, component {}",
                value, row, col
            )));
        }

        Ok(Self { vectors, ids })
    }

    /// Create a collection from row vectors (all rows must share one length)
    pub fn from_rows(rows: Vec<Vec<f32>>, ids: Vec<Identifier>) -> Result<Self> {
        let n = rows.len();
        let dim = rows.first().map(Vec::len).unwrap_or(0);

        if let Some((i, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != dim) {
            return Err(CosMatchError::invalid_input(format!(
                "Vector {} has dimension {}, expected {}",
                i,
                row.len(),
                dim
            )));
        }

        let flat: Vec<f32> = rows.into_iter().flatten().collect();
        let vectors = Array2::from_shape_vec((n, dim), flat)
            .map_err(|e| CosMatchError::invalid_input(format!("Malformed vector data: {}", e)))?;

        Self::new(vectors, ids)
    }

    /// Create a collection whose ids are the row positions as text ("0", "1", ...)
    pub fn with_default_ids(vectors: Array2<f32>) -> Result<Self> {
        let ids = default_ids(vectors.nrows());
        Self::new(vectors, ids)
    }

    /// Empty collection of the given dimension
    pub fn empty(dim: usize) -> Self {
        Self {
            vectors: Array2::zeros((0, dim)),
            ids: Vec::new(),
        }
    }

    /// Number of vectors
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Vector dimension
    pub fn dim(&self) -> usize {
        self.vectors.ncols()
    }

    pub fn vectors(&self) -> &Array2<f32> {
        &self.vectors
    }

    pub fn ids(&self) -> &[Identifier] {
        &self.ids
    }

    /// Borrow the whole collection
    pub fn view(&self) -> EmbeddingView<'_> {
        EmbeddingView {
            vectors: self.vectors.view(),
            ids: &self.ids,
        }
    }

    /// Borrow a contiguous range of rows
    ///
    /// Panics if the range is out of bounds.
    pub fn slice(&self, range: Range<usize>) -> EmbeddingView<'_> {
        EmbeddingView {
            vectors: self.vectors.slice(s![range.clone(), ..]),
            ids: &self.ids[range],
        }
    }
}

/// Read-only borrowed view of an embedding collection (or a chunk of one)
#[derive(Debug, Clone, Copy)]
pub struct EmbeddingView<'a> {
    vectors: ArrayView2<'a, f32>,
    ids: &'a [Identifier],
}

impl<'a> EmbeddingView<'a> {
    pub fn vectors(&self) -> ArrayView2<'a, f32> {
        self.vectors
    }

    pub fn ids(&self) -> &'a [Identifier] {
        self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn dim(&self) -> usize {
        self.vectors.ncols()
    }
}

/// Ranking parameters shared by every chunk of a run
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchParams {
    /// Maximum matches kept per query (>= 1)
    pub top_n: usize,

    /// Minimum score for a match to be kept (inclusive)
    pub threshold: f32,
}

impl MatchParams {
    pub fn new(top_n: usize, threshold: f32) -> Result<Self> {
        let params = Self { top_n, threshold };
        params.validate()?;
        Ok(params)
    }

    pub fn validate(&self) -> Result<()> {
        if self.top_n == 0 {
            return Err(CosMatchError::invalid_input("top_n must be at least 1"));
        }
        if self.threshold.is_nan() {
            return Err(CosMatchError::invalid_input("threshold must not be NaN"));
        }
        Ok(())
    }
}

/// A single recommended candidate
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Match {
    /// Candidate identifier
    pub candidate: Identifier,

    /// Cosine similarity (-1.0 to 1.0)
    pub score: f32,
}

/// Ranked matches for one query (best first, never empty)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResult {
    /// Query identifier
    pub query: Identifier,

    /// Matches sorted by descending score
    pub recommendations: Vec<Match>,
}

/// Aggregate counters for one run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    pub total_queries: usize,
    pub total_candidates: usize,

    /// Queries with at least one match
    pub matched_queries: usize,

    pub total_recommendations: usize,

    /// Number of chunks evaluated
    pub batches: usize,
}

impl RunStats {
    /// Share of queries with at least one match (0.0 when there were no queries)
    pub fn matched_ratio(&self) -> f64 {
        if self.total_queries == 0 {
            return 0.0;
        }
        self.matched_queries as f64 / self.total_queries as f64
    }

    /// Average recommendations per matched query (0.0 when nothing matched)
    pub fn avg_recommendations(&self) -> f64 {
        if self.matched_queries == 0 {
            return 0.0;
        }
        self.total_recommendations as f64 / self.matched_queries as f64
    }
}
