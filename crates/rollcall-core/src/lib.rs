//! rollcall-core — Face descriptor matching and decision engine.
//!
//! Matches query descriptors produced by an external vision model against
//! a registry of enrolled identities using batched cosine similarity,
//! then applies a threshold, tie-break, and duplicate-resolution policy.

pub mod decision;
pub mod error;
pub mod recognizer;
pub mod similarity;
pub mod types;

pub use error::{ExtractError, RecognizeError, RegistryError};
pub use recognizer::{match_roster, match_single, DescriptorExtractor, Recognizer, RegistryLoader};
pub use types::{
    Descriptor, EnrolledIdentity, MatchCandidate, MatcherConfig, RegistrySnapshot, RosterReport,
};
