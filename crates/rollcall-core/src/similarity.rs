//! Batched cosine similarity between query descriptors and a registry
//! snapshot.
//!
//! Registry rows are normalized once at snapshot build; query rows are
//! normalized once here. Scores come out of a single M×D · D×N matrix
//! multiplication rather than per-pair loops, mirroring how the similarity
//! cost should scale with registry size.

use ndarray::Array2;

use crate::error::RecognizeError;
use crate::types::{Descriptor, RegistrySnapshot};

/// M×N cosine similarity scores: one row per query, one column per
/// registry entry (in snapshot order).
#[derive(Debug, Clone)]
pub struct SimilarityMatrix {
    pub(crate) scores: Array2<f32>,
    /// Queries whose descriptor had zero or non-finite norm. They hold a
    /// zeroed row and are never eligible as candidates.
    pub(crate) degenerate: Vec<bool>,
}

impl SimilarityMatrix {
    pub fn num_queries(&self) -> usize {
        self.degenerate.len()
    }

    pub fn is_degenerate(&self, query: usize) -> bool {
        self.degenerate[query]
    }

    /// True when no query carries a usable descriptor.
    pub fn all_degenerate(&self) -> bool {
        !self.degenerate.is_empty() && self.degenerate.iter().all(|d| *d)
    }

    pub(crate) fn row(&self, query: usize) -> ndarray::ArrayView1<'_, f32> {
        self.scores.row(query)
    }
}

/// Score every query against every registry entry in one batched operation.
///
/// Any query of the wrong dimensionality fails the whole call with
/// [`RecognizeError::DimensionMismatch`] before any arithmetic runs —
/// mismatched descriptors are never truncated or padded.
pub fn score(
    snapshot: &RegistrySnapshot,
    queries: &[Descriptor],
) -> Result<SimilarityMatrix, RecognizeError> {
    let dim = snapshot.dimension();
    for query in queries {
        if query.dim() != dim {
            return Err(RecognizeError::DimensionMismatch {
                expected: dim,
                actual: query.dim(),
            });
        }
    }

    let mut normalized = Array2::<f32>::zeros((queries.len(), dim));
    let mut degenerate = vec![false; queries.len()];
    for (i, query) in queries.iter().enumerate() {
        let norm = query.norm();
        if !norm.is_finite() || norm <= 0.0 {
            tracing::warn!(query = i, "degenerate query descriptor; excluded from candidacy");
            degenerate[i] = true;
            continue;
        }
        let inv = 1.0 / norm;
        for (j, v) in query.values().iter().enumerate() {
            normalized[[i, j]] = v * inv;
        }
    }

    let mut scores = normalized.dot(&snapshot.normalized().t());
    // Unit rows can still drift past ±1 in f32; clamp to the valid range.
    scores.mapv_inplace(|s| s.clamp(-1.0, 1.0));

    Ok(SimilarityMatrix { scores, degenerate })
}
