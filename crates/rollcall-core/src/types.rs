use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::error::RecognizeError;

/// Descriptor dimensionality produced by the default recognition model
/// (ArcFace-style 512-dimensional embeddings).
pub const DEFAULT_DESCRIPTOR_DIM: usize = 512;

/// Default cosine similarity threshold for a positive match.
pub const DEFAULT_THRESHOLD: f32 = 0.5;

/// A fixed-length face descriptor, immutable after creation.
///
/// Serialized as a plain JSON array of numbers, the wire form the external
/// vision service emits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Descriptor(Vec<f32>);

impl Descriptor {
    pub fn new(values: Vec<f32>) -> Self {
        Self(values)
    }

    pub fn dim(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn values(&self) -> &[f32] {
        &self.0
    }

    /// L2 norm. Zero (or non-finite) norm makes cosine similarity
    /// undefined; such descriptors are excluded from candidacy.
    pub fn norm(&self) -> f32 {
        self.0.iter().map(|v| v * v).sum::<f32>().sqrt()
    }
}

impl From<Vec<f32>> for Descriptor {
    fn from(values: Vec<f32>) -> Self {
        Self(values)
    }
}

/// An enrolled identity record as read from the registry store.
///
/// `descriptor: None` (or an empty vector) means the identity exists but is
/// not enrolled for recognition; it is filtered out before matching.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrolledIdentity {
    pub identity_id: String,
    pub display_name: String,
    pub descriptor: Option<Descriptor>,
}

impl EnrolledIdentity {
    /// Whether this record carries a usable descriptor.
    pub fn has_descriptor(&self) -> bool {
        self.descriptor.as_ref().is_some_and(|d| !d.is_empty())
    }
}

/// Matching parameters: registry dimensionality and acceptance threshold.
///
/// The threshold boundary is exclusive: a best score exactly equal to the
/// threshold is rejected.
#[derive(Debug, Clone, Copy)]
pub struct MatcherConfig {
    pub dimension: usize,
    pub threshold: f32,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            dimension: DEFAULT_DESCRIPTOR_DIM,
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

/// Immutable point-in-time working set of enrolled descriptors.
///
/// Built fresh per recognition request — the registry may change between
/// requests, so snapshots are never cached or mutated in place. Entries are
/// sorted by identity id so that exact similarity ties resolve
/// deterministically to the lowest id. Descriptor rows are L2-normalized
/// once here, since the registry is reused across every query in a request.
#[derive(Debug, Clone)]
pub struct RegistrySnapshot {
    dimension: usize,
    ids: Vec<String>,
    names: Vec<String>,
    normalized: Array2<f32>,
}

impl RegistrySnapshot {
    /// Build a snapshot from registry records.
    ///
    /// Records without a descriptor are skipped. A descriptor whose length
    /// differs from `dimension` is corrupted enrollment data and fails the
    /// build with [`RecognizeError::DimensionMismatch`]. A zero-norm
    /// descriptor is excluded from candidacy with a logged anomaly rather
    /// than letting a NaN reach the similarity matrix.
    pub fn build(
        dimension: usize,
        identities: Vec<EnrolledIdentity>,
    ) -> Result<Self, RecognizeError> {
        let mut enrolled: Vec<EnrolledIdentity> = identities
            .into_iter()
            .filter(EnrolledIdentity::has_descriptor)
            .collect();
        enrolled.sort_by(|a, b| a.identity_id.cmp(&b.identity_id));

        let mut ids = Vec::with_capacity(enrolled.len());
        let mut names = Vec::with_capacity(enrolled.len());
        let mut rows: Vec<(String, String, Descriptor)> = Vec::with_capacity(enrolled.len());

        for record in enrolled {
            let Some(descriptor) = record.descriptor else {
                continue;
            };
            if descriptor.dim() != dimension {
                return Err(RecognizeError::DimensionMismatch {
                    expected: dimension,
                    actual: descriptor.dim(),
                });
            }
            let norm = descriptor.norm();
            if !norm.is_finite() || norm <= 0.0 {
                tracing::warn!(
                    identity_id = %record.identity_id,
                    "degenerate enrolled descriptor (zero or non-finite norm); excluded from matching"
                );
                continue;
            }
            rows.push((record.identity_id, record.display_name, descriptor));
        }

        let mut normalized = Array2::<f32>::zeros((rows.len(), dimension));
        for (i, (id, name, descriptor)) in rows.into_iter().enumerate() {
            let inv = 1.0 / descriptor.norm();
            for (j, v) in descriptor.values().iter().enumerate() {
                normalized[[i, j]] = v * inv;
            }
            ids.push(id);
            names.push(name);
        }

        Ok(Self {
            dimension,
            ids,
            names,
            normalized,
        })
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Number of identities available as matching candidates.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub(crate) fn identity(&self, idx: usize) -> (&str, &str) {
        (&self.ids[idx], &self.names[idx])
    }

    /// Row-normalized N×D descriptor matrix.
    pub(crate) fn normalized(&self) -> &Array2<f32> {
        &self.normalized
    }
}

/// A single identity that cleared the acceptance threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchCandidate {
    pub identity_id: String,
    pub display_name: String,
    /// Cosine similarity of the accepted match, in [-1, 1].
    pub confidence: f32,
}

/// Multi-face recognition outcome for one image.
///
/// An empty `recognized` list with `total_faces > 0` is a valid result —
/// faces were present but none matched — and is distinct from
/// "no faces detected", which is an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterReport {
    /// Accepted matches, deduplicated by identity id, highest confidence
    /// first.
    pub recognized: Vec<MatchCandidate>,
    pub total_faces: usize,
    /// Faces that failed to clear the threshold. Duplicate hits removed by
    /// deduplication are not counted here.
    pub unrecognized_count: usize,
}
