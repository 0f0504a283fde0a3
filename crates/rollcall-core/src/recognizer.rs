//! Recognition orchestrator: snapshot load → descriptor extraction →
//! similarity → decision.
//!
//! The extractor and the registry loader are injected collaborators so the
//! pipeline can run against fakes in tests and against any vision model or
//! storage backend in production.

use std::sync::Mutex;

use crate::decision;
use crate::error::{ExtractError, RecognizeError, RegistryError};
use crate::similarity;
use crate::types::{
    Descriptor, EnrolledIdentity, MatchCandidate, MatcherConfig, RegistrySnapshot, RosterReport,
};

/// Black-box vision collaborator: decoded image in, zero or more face
/// descriptors out, in unspecified but stable order.
pub trait DescriptorExtractor {
    fn extract(
        &mut self,
        frame: &[u8],
        width: u32,
        height: u32,
    ) -> Result<Vec<Descriptor>, ExtractError>;
}

/// Point-in-time read of all enrolled identities from the storage
/// collaborator.
pub trait RegistryLoader {
    fn load(&self) -> Result<Vec<EnrolledIdentity>, RegistryError>;
}

impl<T: RegistryLoader + ?Sized> RegistryLoader for &T {
    fn load(&self) -> Result<Vec<EnrolledIdentity>, RegistryError> {
        (**self).load()
    }
}

/// Match a single query descriptor against a snapshot.
///
/// This is the matching stage on its own, for callers that already hold a
/// descriptor (no extraction involved).
pub fn match_single(
    snapshot: &RegistrySnapshot,
    query: &Descriptor,
    threshold: f32,
) -> Result<MatchCandidate, RecognizeError> {
    let sim = similarity::score(snapshot, std::slice::from_ref(query))?;
    let Some((idx, best)) = decision::best_of_row(&sim, 0) else {
        return Err(RecognizeError::DegenerateDescriptor);
    };
    if best <= threshold {
        return Err(RecognizeError::NotRecognized { best });
    }
    let (identity_id, display_name) = snapshot.identity(idx);
    Ok(MatchCandidate {
        identity_id: identity_id.to_string(),
        display_name: display_name.to_string(),
        confidence: best,
    })
}

/// Match a batch of query descriptors against a snapshot, with
/// deduplication and an unrecognized tally.
///
/// Zero accepted matches is a valid outcome here, not an error — the
/// caller must be able to distinguish "no faces present" from "faces
/// present but none matched". Only a batch with no usable descriptor at
/// all fails, with [`RecognizeError::DegenerateDescriptor`].
pub fn match_roster(
    snapshot: &RegistrySnapshot,
    queries: &[Descriptor],
    threshold: f32,
) -> Result<RosterReport, RecognizeError> {
    let sim = similarity::score(snapshot, queries)?;
    if sim.all_degenerate() {
        return Err(RecognizeError::DegenerateDescriptor);
    }
    let decision = decision::decide(snapshot, &sim, threshold);
    Ok(RosterReport {
        recognized: decision.recognized,
        total_faces: queries.len(),
        unrecognized_count: decision.unrecognized_count,
    })
}

/// Stateless-per-call recognition pipeline over injected collaborators.
///
/// The extractor sits behind a mutex: inference backends are not assumed
/// thread-safe, so concurrent callers are serialized through it. The
/// snapshot is rebuilt from the registry on every call and never cached —
/// the registry may change between requests and staleness must not be
/// silently tolerated.
pub struct Recognizer<E, R> {
    extractor: Mutex<E>,
    registry: R,
    config: MatcherConfig,
}

impl<E: DescriptorExtractor, R: RegistryLoader> Recognizer<E, R> {
    pub fn new(extractor: E, registry: R, config: MatcherConfig) -> Self {
        Self {
            extractor: Mutex::new(extractor),
            registry,
            config,
        }
    }

    pub fn config(&self) -> MatcherConfig {
        self.config
    }

    fn load_snapshot(&self) -> Result<RegistrySnapshot, RecognizeError> {
        let identities = self.registry.load()?;
        let snapshot = RegistrySnapshot::build(self.config.dimension, identities)?;
        if snapshot.is_empty() {
            return Err(RecognizeError::NoEnrolledIdentities);
        }
        tracing::debug!(candidates = snapshot.len(), "registry snapshot loaded");
        Ok(snapshot)
    }

    fn extract(&self, frame: &[u8], width: u32, height: u32) -> Result<Vec<Descriptor>, RecognizeError> {
        let mut extractor = self
            .extractor
            .lock()
            .map_err(|_| RecognizeError::Extractor("extractor mutex poisoned".into()))?;
        let descriptors = extractor.extract(frame, width, height)?;
        tracing::debug!(faces = descriptors.len(), "descriptors extracted");
        Ok(descriptors)
    }

    /// Identify the single face in an image.
    ///
    /// Fails with [`RecognizeError::AmbiguousMultipleFaces`] when more than
    /// one face is present; the caller must resubmit a single-face image.
    pub fn recognize_single(
        &self,
        frame: &[u8],
        width: u32,
        height: u32,
    ) -> Result<MatchCandidate, RecognizeError> {
        let snapshot = self.load_snapshot()?;
        let faces = self.extract(frame, width, height)?;
        let query = match faces.as_slice() {
            [] => return Err(RecognizeError::NoFaceDetected),
            [one] => one,
            many => {
                return Err(RecognizeError::AmbiguousMultipleFaces { count: many.len() })
            }
        };
        match_single(&snapshot, query, self.config.threshold)
    }

    /// Identify every face in a classroom image.
    pub fn recognize_multiple(
        &self,
        frame: &[u8],
        width: u32,
        height: u32,
    ) -> Result<RosterReport, RecognizeError> {
        let snapshot = self.load_snapshot()?;
        let faces = self.extract(frame, width, height)?;
        if faces.is_empty() {
            return Err(RecognizeError::NoFaceDetected);
        }
        match_roster(&snapshot, &faces, self.config.threshold)
    }

    /// Extract the descriptor of a single-face image without matching,
    /// for enrollment flows.
    pub fn extract_descriptor(
        &self,
        frame: &[u8],
        width: u32,
        height: u32,
    ) -> Result<Descriptor, RecognizeError> {
        let mut faces = self.extract(frame, width, height)?;
        let descriptor = match faces.len() {
            0 => return Err(RecognizeError::NoFaceDetected),
            1 => faces.remove(0),
            count => return Err(RecognizeError::AmbiguousMultipleFaces { count }),
        };
        if descriptor.dim() != self.config.dimension {
            return Err(RecognizeError::DimensionMismatch {
                expected: self.config.dimension,
                actual: descriptor.dim(),
            });
        }
        let norm = descriptor.norm();
        if !norm.is_finite() || norm <= 0.0 {
            // Enrolling a zero-norm vector would poison the registry.
            return Err(RecognizeError::DegenerateDescriptor);
        }
        Ok(descriptor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Fake vision collaborator returning a fixed descriptor list.
    struct FakeExtractor {
        faces: Vec<Descriptor>,
    }

    impl DescriptorExtractor for FakeExtractor {
        fn extract(
            &mut self,
            _frame: &[u8],
            _width: u32,
            _height: u32,
        ) -> Result<Vec<Descriptor>, ExtractError> {
            Ok(self.faces.clone())
        }
    }

    /// Fake storage collaborator returning a fixed registry.
    struct FakeRegistry {
        identities: Vec<EnrolledIdentity>,
    }

    impl RegistryLoader for FakeRegistry {
        fn load(&self) -> Result<Vec<EnrolledIdentity>, RegistryError> {
            Ok(self.identities.clone())
        }
    }

    fn identity(id: &str, name: &str, values: Vec<f32>) -> EnrolledIdentity {
        EnrolledIdentity {
            identity_id: id.into(),
            display_name: name.into(),
            descriptor: Some(Descriptor::new(values)),
        }
    }

    fn orthonormal_registry() -> Vec<EnrolledIdentity> {
        vec![
            identity("s1", "Ada", vec![1.0, 0.0, 0.0]),
            identity("s2", "Grace", vec![0.0, 1.0, 0.0]),
            identity("s3", "Edsger", vec![0.0, 0.0, 1.0]),
        ]
    }

    fn config(dim: usize) -> MatcherConfig {
        MatcherConfig {
            dimension: dim,
            threshold: 0.5,
        }
    }

    fn recognizer(
        faces: Vec<Descriptor>,
        identities: Vec<EnrolledIdentity>,
        dim: usize,
    ) -> Recognizer<FakeExtractor, FakeRegistry> {
        Recognizer::new(
            FakeExtractor { faces },
            FakeRegistry { identities },
            config(dim),
        )
    }

    #[test]
    fn test_single_matches_enrolled_identity() {
        let r = recognizer(
            vec![Descriptor::new(vec![0.0, 1.0, 0.0])],
            orthonormal_registry(),
            3,
        );
        let candidate = r.recognize_single(&[], 0, 0).unwrap();
        assert_eq!(candidate.identity_id, "s2");
        assert_eq!(candidate.display_name, "Grace");
        assert!((candidate.confidence - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_empty_registry_fails_both_modes() {
        let r = recognizer(vec![Descriptor::new(vec![1.0, 0.0, 0.0])], vec![], 3);
        assert!(matches!(
            r.recognize_single(&[], 0, 0),
            Err(RecognizeError::NoEnrolledIdentities)
        ));
        assert!(matches!(
            r.recognize_multiple(&[], 0, 0),
            Err(RecognizeError::NoEnrolledIdentities)
        ));
    }

    #[test]
    fn test_registry_with_only_unenrolled_records_is_empty() {
        let identities = vec![EnrolledIdentity {
            identity_id: "s1".into(),
            display_name: "Ada".into(),
            descriptor: None,
        }];
        let r = recognizer(vec![Descriptor::new(vec![1.0, 0.0, 0.0])], identities, 3);
        assert!(matches!(
            r.recognize_single(&[], 0, 0),
            Err(RecognizeError::NoEnrolledIdentities)
        ));
    }

    #[test]
    fn test_no_face_detected() {
        let r = recognizer(vec![], orthonormal_registry(), 3);
        assert!(matches!(
            r.recognize_single(&[], 0, 0),
            Err(RecognizeError::NoFaceDetected)
        ));
        assert!(matches!(
            r.recognize_multiple(&[], 0, 0),
            Err(RecognizeError::NoFaceDetected)
        ));
    }

    #[test]
    fn test_single_mode_rejects_multiple_faces() {
        let r = recognizer(
            vec![
                Descriptor::new(vec![1.0, 0.0, 0.0]),
                Descriptor::new(vec![0.0, 1.0, 0.0]),
            ],
            orthonormal_registry(),
            3,
        );
        assert!(matches!(
            r.recognize_single(&[], 0, 0),
            Err(RecognizeError::AmbiguousMultipleFaces { count: 2 })
        ));
    }

    #[test]
    fn test_single_mode_not_recognized_below_threshold() {
        // Query roughly equidistant from all three orthonormal entries:
        // best score 1/sqrt(3) ≈ 0.577 — use a higher threshold.
        let r = Recognizer::new(
            FakeExtractor {
                faces: vec![Descriptor::new(vec![1.0, 1.0, 1.0])],
            },
            FakeRegistry {
                identities: orthonormal_registry(),
            },
            MatcherConfig {
                dimension: 3,
                threshold: 0.9,
            },
        );
        match r.recognize_single(&[], 0, 0) {
            Err(RecognizeError::NotRecognized { best }) => {
                assert!((best - 1.0 / 3f32.sqrt()).abs() < 1e-5);
            }
            other => panic!("expected NotRecognized, got {other:?}"),
        }
    }

    #[test]
    fn test_exact_threshold_rejected_in_single_mode() {
        // Self-similarity is exactly 1.0; with threshold 1.0 the strict
        // inequality must reject it.
        let r = Recognizer::new(
            FakeExtractor {
                faces: vec![Descriptor::new(vec![1.0, 0.0, 0.0])],
            },
            FakeRegistry {
                identities: orthonormal_registry(),
            },
            MatcherConfig {
                dimension: 3,
                threshold: 1.0,
            },
        );
        assert!(matches!(
            r.recognize_single(&[], 0, 0),
            Err(RecognizeError::NotRecognized { .. })
        ));
    }

    #[test]
    fn test_multi_mode_dedupes_repeated_identity() {
        // Two overlapping boxes of the same person plus one stranger.
        let r = recognizer(
            vec![
                Descriptor::new(vec![1.0, 0.0, 0.0]),
                Descriptor::new(vec![1.0, 0.1, 0.0]),
                Descriptor::new(vec![-1.0, -1.0, -1.0]),
            ],
            orthonormal_registry(),
            3,
        );
        let report = r.recognize_multiple(&[], 0, 0).unwrap();
        assert_eq!(report.total_faces, 3);
        assert_eq!(report.recognized.len(), 1);
        assert_eq!(report.recognized[0].identity_id, "s1");
        assert!((report.recognized[0].confidence - 1.0).abs() < 1e-6);
        // Only the stranger counts as unrecognized, not the deduped box.
        assert_eq!(report.unrecognized_count, 1);
    }

    #[test]
    fn test_multi_mode_zero_matches_is_not_an_error() {
        let r = recognizer(
            vec![Descriptor::new(vec![-1.0, -1.0, -1.0])],
            orthonormal_registry(),
            3,
        );
        let report = r.recognize_multiple(&[], 0, 0).unwrap();
        assert!(report.recognized.is_empty());
        assert_eq!(report.total_faces, 1);
        assert_eq!(report.unrecognized_count, 1);
    }

    #[test]
    fn test_wrong_dimension_query_rejected() {
        let r = recognizer(
            vec![Descriptor::new(vec![1.0, 0.0])],
            orthonormal_registry(),
            3,
        );
        assert!(matches!(
            r.recognize_single(&[], 0, 0),
            Err(RecognizeError::DimensionMismatch {
                expected: 3,
                actual: 2
            })
        ));
    }

    #[test]
    fn test_degenerate_single_query_fails() {
        let r = recognizer(
            vec![Descriptor::new(vec![0.0, 0.0, 0.0])],
            orthonormal_registry(),
            3,
        );
        assert!(matches!(
            r.recognize_single(&[], 0, 0),
            Err(RecognizeError::DegenerateDescriptor)
        ));
    }

    #[test]
    fn test_all_degenerate_batch_fails_multi_mode() {
        let r = recognizer(
            vec![
                Descriptor::new(vec![0.0, 0.0, 0.0]),
                Descriptor::new(vec![0.0, 0.0, 0.0]),
            ],
            orthonormal_registry(),
            3,
        );
        assert!(matches!(
            r.recognize_multiple(&[], 0, 0),
            Err(RecognizeError::DegenerateDescriptor)
        ));
    }

    #[test]
    fn test_recognition_is_deterministic() {
        let r = recognizer(
            vec![Descriptor::new(vec![0.2, 0.9, 0.1])],
            orthonormal_registry(),
            3,
        );
        let first = r.recognize_single(&[], 0, 0).unwrap();
        let second = r.recognize_single(&[], 0, 0).unwrap();
        assert_eq!(first.identity_id, second.identity_id);
        assert_eq!(first.confidence, second.confidence);
    }

    #[test]
    fn test_extract_descriptor_single_face_rule() {
        let r = recognizer(
            vec![Descriptor::new(vec![0.3, 0.4, 0.5])],
            orthonormal_registry(),
            3,
        );
        let d = r.extract_descriptor(&[], 0, 0).unwrap();
        assert_eq!(d.values(), &[0.3, 0.4, 0.5]);

        let r = recognizer(
            vec![
                Descriptor::new(vec![1.0, 0.0, 0.0]),
                Descriptor::new(vec![0.0, 1.0, 0.0]),
            ],
            vec![],
            3,
        );
        assert!(matches!(
            r.extract_descriptor(&[], 0, 0),
            Err(RecognizeError::AmbiguousMultipleFaces { count: 2 })
        ));
    }

    #[test]
    fn test_extract_descriptor_validates_dimension_and_norm() {
        let r = recognizer(vec![Descriptor::new(vec![1.0, 0.0])], vec![], 3);
        assert!(matches!(
            r.extract_descriptor(&[], 0, 0),
            Err(RecognizeError::DimensionMismatch { .. })
        ));

        let r = recognizer(vec![Descriptor::new(vec![0.0, 0.0, 0.0])], vec![], 3);
        assert!(matches!(
            r.extract_descriptor(&[], 0, 0),
            Err(RecognizeError::DegenerateDescriptor)
        ));
    }

    #[test]
    fn test_extractor_failure_maps_to_typed_error() {
        struct FailingExtractor;
        impl DescriptorExtractor for FailingExtractor {
            fn extract(
                &mut self,
                _frame: &[u8],
                _width: u32,
                _height: u32,
            ) -> Result<Vec<Descriptor>, ExtractError> {
                Err(ExtractError::InvalidImage("not a decodable frame".into()))
            }
        }
        let r = Recognizer::new(
            FailingExtractor,
            FakeRegistry {
                identities: orthonormal_registry(),
            },
            config(3),
        );
        match r.recognize_single(&[], 0, 0) {
            Err(err @ RecognizeError::InvalidImage(_)) => {
                assert_eq!(err.code(), "invalid_image");
            }
            other => panic!("expected InvalidImage, got {other:?}"),
        }
    }
}
