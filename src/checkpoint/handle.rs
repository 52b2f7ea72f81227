//! Checkpoint handles and storage key layout

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Reference to one persisted model state.
///
/// Identified by `(stage_index, metric, timestamp)`; `key` locates the
/// payload and `digest` guards it against corruption.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointHandle {
    pub stage_index: i64,
    /// Storage key of the payload
    pub key: String,
    /// Monitored metric; `None` for terminal-model checkpoints
    pub metric: Option<f64>,
    /// Epoch after which the model was saved
    pub epoch: usize,
    pub timestamp: DateTime<Utc>,
    /// Hex SHA-256 of the payload
    pub digest: String,
    pub size_bytes: u64,
}

impl CheckpointHandle {
    /// Whether `bytes` is the payload this handle points to.
    pub fn verifies(&self, bytes: &[u8]) -> bool {
        bytes.len() as u64 == self.size_bytes && compute_digest(bytes) == self.digest
    }
}

/// Compute SHA-256 hash of data
pub fn compute_digest(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

pub(crate) fn stage_prefix(stage_index: i64) -> String {
    format!("stage-{stage_index}/")
}

pub(crate) fn best_key(stage_index: i64) -> String {
    format!("stage-{stage_index}/best.json")
}

pub(crate) const LATEST_KEY: &str = "latest.json";

pub(crate) fn payload_key(stage_index: i64, timestamp: &DateTime<Utc>, seq: u64) -> String {
    format!(
        "stage-{stage_index}/ckpt-{}-{seq:06}.bin",
        timestamp.format("%Y%m%dT%H%M%S%.6fZ")
    )
}

/// Stage index encoded in a `stage-<index>/best.json` key.
pub(crate) fn parse_best_key(key: &str) -> Option<i64> {
    key.strip_prefix("stage-")?
        .strip_suffix("/best.json")?
        .parse()
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_compute_digest() {
        assert_eq!(
            compute_digest(b"hello world"),
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn test_key_layout() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        assert_eq!(
            payload_key(2, &ts, 17),
            "stage-2/ckpt-20240309T140507.000000Z-000017.bin"
        );
        assert_eq!(best_key(-1), "stage--1/best.json");
        assert_eq!(parse_best_key("stage--1/best.json"), Some(-1));
        assert_eq!(parse_best_key("stage-12/best.json"), Some(12));
        assert_eq!(parse_best_key("stage-1/ckpt-x.bin"), None);
        assert_eq!(parse_best_key("latest.json"), None);
    }

    #[test]
    fn test_verifies() {
        let payload = b"model bytes";
        let handle = CheckpointHandle {
            stage_index: 0,
            key: "stage-0/ckpt.bin".into(),
            metric: Some(0.5),
            epoch: 3,
            timestamp: Utc::now(),
            digest: compute_digest(payload),
            size_bytes: payload.len() as u64,
        };
        assert!(handle.verifies(payload));
        assert!(!handle.verifies(b"model byteZ"));
        assert!(!handle.verifies(b""));
    }

    #[test]
    fn test_handle_json() {
        let handle = CheckpointHandle {
            stage_index: 4,
            key: "k".into(),
            metric: None,
            epoch: 1,
            timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            digest: "d".into(),
            size_bytes: 0,
        };
        let json = serde_json::to_string(&handle).unwrap();
        assert!(json.contains("\"metric\":null"));
        let back: CheckpointHandle = serde_json::from_str(&json).unwrap();
        assert_eq!(back, handle);
    }
}
