use std::path::PathBuf;

use rollcall_core::types::{DEFAULT_DESCRIPTOR_DIM, DEFAULT_THRESHOLD};

/// CLI configuration, loaded from `ROLLCALL_*` environment variables.
pub struct Config {
    /// Path to the SQLite registry file.
    pub db_path: PathBuf,
    /// Cosine similarity threshold; the best score must be strictly
    /// greater to count as a match.
    pub threshold: f32,
    /// Registry descriptor dimensionality.
    pub dimension: usize,
}

impl Config {
    pub fn from_env() -> Self {
        let data_dir = std::env::var("XDG_DATA_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
                PathBuf::from(home).join(".local/share")
            })
            .join("rollcall");

        let db_path = std::env::var("ROLLCALL_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_dir.join("registry.db"));

        Self {
            db_path,
            threshold: env_f32("ROLLCALL_THRESHOLD", DEFAULT_THRESHOLD),
            dimension: env_usize("ROLLCALL_DESCRIPTOR_DIM", DEFAULT_DESCRIPTOR_DIM),
        }
    }
}

fn env_f32(key: &str, default: f32) -> f32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
