//! Threshold decision, tie-break, and duplicate resolution over a
//! similarity matrix.

use std::collections::BTreeMap;

use crate::similarity::SimilarityMatrix;
use crate::types::{MatchCandidate, RegistrySnapshot};

/// Per-request decision outcome before the orchestrator attaches face
/// counts.
#[derive(Debug, Clone)]
pub struct RosterDecision {
    /// Accepted matches, one per identity, highest confidence first.
    pub recognized: Vec<MatchCandidate>,
    /// Queries whose best score failed the threshold, plus degenerate
    /// queries. Deduplicated hits are not counted.
    pub unrecognized_count: usize,
}

/// Best registry entry for one query row: `(entry index, score)`.
///
/// Ties at the maximum resolve to the first (lowest-index) entry; snapshot
/// entries are sorted by identity id, so the tie-break is "lowest identity
/// id" and is deterministic for a fixed input. Returns `None` for a
/// degenerate query or an empty registry.
pub(crate) fn best_of_row(sim: &SimilarityMatrix, query: usize) -> Option<(usize, f32)> {
    if sim.is_degenerate(query) {
        return None;
    }
    let row = sim.row(query);
    let mut best: Option<(usize, f32)> = None;
    for (idx, &score) in row.iter().enumerate() {
        match best {
            Some((_, prev)) if prev >= score => {}
            _ => best = Some((idx, score)),
        }
    }
    best
}

/// Apply the acceptance threshold to every query and deduplicate repeated
/// identity hits.
///
/// Acceptance is strict: the best score must be greater than `threshold`;
/// an exact-threshold score is rejected. When the same identity is the best
/// match for several queries (the same person detected as two overlapping
/// face boxes), only the highest-confidence occurrence is kept and the
/// duplicates are dropped without counting as unrecognized.
pub fn decide(
    snapshot: &RegistrySnapshot,
    sim: &SimilarityMatrix,
    threshold: f32,
) -> RosterDecision {
    let mut by_identity: BTreeMap<String, MatchCandidate> = BTreeMap::new();
    let mut unrecognized_count = 0usize;

    for query in 0..sim.num_queries() {
        let Some((idx, score)) = best_of_row(sim, query) else {
            unrecognized_count += 1;
            continue;
        };
        if score <= threshold {
            tracing::debug!(query, best = score, threshold, "below threshold");
            unrecognized_count += 1;
            continue;
        }
        let (identity_id, display_name) = snapshot.identity(idx);
        tracing::debug!(query, identity_id, confidence = score, "accepted match");
        let candidate = MatchCandidate {
            identity_id: identity_id.to_string(),
            display_name: display_name.to_string(),
            confidence: score,
        };
        by_identity
            .entry(candidate.identity_id.clone())
            .and_modify(|kept| {
                if candidate.confidence > kept.confidence {
                    *kept = candidate.clone();
                }
            })
            .or_insert(candidate);
    }

    let mut recognized: Vec<MatchCandidate> = by_identity.into_values().collect();
    // Descending confidence; BTreeMap order already breaks exact ties by id.
    recognized.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    RosterDecision {
        recognized,
        unrecognized_count,
    }
}
