use thiserror::Error;

/// Everything that can go wrong on the recognition path.
///
/// All variants are expected, recoverable-at-the-boundary conditions and
/// are returned as typed results, never panics. Each maps to a stable
/// machine code (see [`RecognizeError::code`]) so a calling UI can tell
/// "nobody enrolled yet" from "face not recognized" from "bad photo".
#[derive(Error, Debug)]
pub enum RecognizeError {
    #[error("invalid image: {0}")]
    InvalidImage(String),
    #[error("no face detected")]
    NoFaceDetected,
    #[error("multiple faces detected ({count}); provide an image with a single face")]
    AmbiguousMultipleFaces { count: usize },
    #[error("no identities with enrolled descriptors")]
    NoEnrolledIdentities,
    #[error("face not recognized (best score {best:.4})")]
    NotRecognized { best: f32 },
    #[error("descriptor dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("degenerate descriptor: zero-norm vector, cosine similarity undefined")]
    DegenerateDescriptor,
    #[error("extractor failure: {0}")]
    Extractor(String),
    #[error("registry load failed: {0}")]
    Registry(#[from] RegistryError),
}

impl RecognizeError {
    /// Stable machine-readable code, one per error kind.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidImage(_) => "invalid_image",
            Self::NoFaceDetected => "no_face_detected",
            Self::AmbiguousMultipleFaces { .. } => "ambiguous_multiple_faces",
            Self::NoEnrolledIdentities => "no_enrolled_identities",
            Self::NotRecognized { .. } => "not_recognized",
            Self::DimensionMismatch { .. } => "dimension_mismatch",
            Self::DegenerateDescriptor => "degenerate_descriptor",
            Self::Extractor(_) => "extractor_failure",
            Self::Registry(_) => "registry_failure",
        }
    }
}

/// Failures of the external descriptor-extraction collaborator.
#[derive(Error, Debug)]
pub enum ExtractError {
    /// The collaborator could not decode or use the supplied image.
    #[error("invalid image: {0}")]
    InvalidImage(String),
    /// Inference backend failure unrelated to the input image.
    #[error("{0}")]
    Backend(String),
}

impl From<ExtractError> for RecognizeError {
    fn from(err: ExtractError) -> Self {
        match err {
            ExtractError::InvalidImage(msg) => RecognizeError::InvalidImage(msg),
            ExtractError::Backend(msg) => RecognizeError::Extractor(msg),
        }
    }
}

/// Failure of the registry-loading collaborator (storage backend).
#[derive(Error, Debug)]
#[error("{0}")]
pub struct RegistryError(pub String);
