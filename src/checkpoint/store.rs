//! Per-stage best-checkpoint store
//!
//! Publishing is two-step: the payload is written under a fresh key, then the
//! stage's `best.json` pointer is swapped to it. Readers follow the pointer,
//! so they see either the previous best or the new one. Payload keys are
//! never reused, which makes a digest mismatch a corruption and not a race.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use chrono::Utc;

use super::backend::StorageBackend;
use super::handle::{
    best_key, compute_digest, parse_best_key, payload_key, stage_prefix, CheckpointHandle,
    LATEST_KEY,
};
use crate::model::Model;
use crate::{Error, Result};

/// Pointer re-reads allowed when a payload is pruned under a reader.
const MAX_READ_ATTEMPTS: usize = 5;

/// Checkpoint store over a [`StorageBackend`]
#[derive(Debug)]
pub struct CheckpointStore {
    backend: Arc<dyn StorageBackend>,
    /// Keep superseded payloads for audit
    retain_all: bool,
    seq: AtomicU64,
    publish: Mutex<()>,
}

impl CheckpointStore {
    /// Create a store that keeps every payload.
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self {
            backend,
            retain_all: true,
            seq: AtomicU64::new(0),
            publish: Mutex::new(()),
        }
    }

    /// Configure whether superseded payloads are kept.
    pub fn with_retain_all(mut self, retain_all: bool) -> Self {
        self.retain_all = retain_all;
        self
    }

    pub fn retain_all(&self) -> bool {
        self.retain_all
    }

    pub fn backend(&self) -> &dyn StorageBackend {
        self.backend.as_ref()
    }

    /// Persist `model` and publish it as the best checkpoint of its stage.
    pub fn save<M: Model>(
        &self,
        stage_index: i64,
        model: &M,
        metric: Option<f64>,
        epoch: usize,
    ) -> Result<CheckpointHandle> {
        let bytes = model.encode()?;
        let timestamp = Utc::now();
        let seq = self.seq.fetch_add(1, Ordering::SeqCst);
        let handle = CheckpointHandle {
            stage_index,
            key: payload_key(stage_index, &timestamp, seq),
            metric,
            epoch,
            timestamp,
            digest: compute_digest(&bytes),
            size_bytes: bytes.len() as u64,
        };

        self.backend.write(&handle.key, &bytes)?;

        let pointer = serde_json::to_vec_pretty(&handle)
            .map_err(|e| Error::Serialization(format!("Failed to encode checkpoint handle: {e}")))?;

        let _guard = self
            .publish
            .lock()
            .map_err(|e| Error::Checkpoint(format!("publish lock poisoned: {e}")))?;
        let previous = self.best_handle(stage_index)?;
        self.backend.write(&best_key(stage_index), &pointer)?;
        self.backend.write(LATEST_KEY, &pointer)?;

        if let Some(previous) = previous.filter(|p| !self.retain_all && p.key != handle.key) {
            self.backend.remove(&previous.key)?;
        }

        tracing::debug!(
            stage = stage_index,
            key = %handle.key,
            metric = ?metric,
            epoch,
            "published checkpoint"
        );
        Ok(handle)
    }

    /// Current best handle of a stage, if any.
    pub fn best_handle(&self, stage_index: i64) -> Result<Option<CheckpointHandle>> {
        self.read_pointer(&best_key(stage_index))
    }

    /// Handle most recently published by any stage.
    pub fn latest_handle(&self) -> Result<Option<CheckpointHandle>> {
        self.read_pointer(LATEST_KEY)
    }

    /// Load the best model of a stage.
    pub fn load_best<M: Model>(&self, stage_index: i64) -> Result<M> {
        self.load_best_with_handle(stage_index).map(|(_, model)| model)
    }

    /// Load the best model of a stage together with its handle.
    pub fn load_best_with_handle<M: Model>(&self, stage_index: i64) -> Result<(CheckpointHandle, M)> {
        for attempt in 1..=MAX_READ_ATTEMPTS {
            let handle = self.best_handle(stage_index)?.ok_or_else(|| {
                Error::Checkpoint(format!("no checkpoint published for stage {stage_index}"))
            })?;
            match self.backend.read(&handle.key)? {
                Some(bytes) => {
                    let model = Self::decode_verified(&handle, &bytes)?;
                    return Ok((handle, model));
                }
                None => {
                    tracing::debug!(stage = stage_index, attempt, key = %handle.key, "payload pruned, re-reading pointer");
                }
            }
        }
        Err(Error::Checkpoint(format!(
            "best checkpoint of stage {stage_index} kept moving after {MAX_READ_ATTEMPTS} reads"
        )))
    }

    /// Load the best model of the most recently checkpointed stage.
    pub fn load_latest_best<M: Model>(&self) -> Result<(CheckpointHandle, M)> {
        let latest = self
            .latest_handle()?
            .ok_or_else(|| Error::Checkpoint("store holds no checkpoints".to_string()))?;
        self.load_best_with_handle(latest.stage_index)
    }

    /// Load the payload of a specific handle.
    pub fn load<M: Model>(&self, handle: &CheckpointHandle) -> Result<M> {
        let bytes = self.backend.read(&handle.key)?.ok_or_else(|| {
            Error::Checkpoint(format!("payload {} no longer exists", handle.key))
        })?;
        Self::decode_verified(handle, &bytes)
    }

    /// Stage indices with a published checkpoint, sorted.
    pub fn stages(&self) -> Result<Vec<i64>> {
        let mut stages: Vec<i64> = self
            .backend
            .list("stage-")?
            .iter()
            .filter_map(|key| parse_best_key(key))
            .collect();
        stages.sort_unstable();
        Ok(stages)
    }

    /// Payload keys stored for a stage, oldest first.
    pub fn payloads(&self, stage_index: i64) -> Result<Vec<String>> {
        Ok(self
            .backend
            .list(&stage_prefix(stage_index))?
            .into_iter()
            .filter(|key| key.ends_with(".bin"))
            .collect())
    }

    fn read_pointer(&self, key: &str) -> Result<Option<CheckpointHandle>> {
        match self.backend.read(key)? {
            None => Ok(None),
            Some(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|e| Error::Checkpoint(format!("corrupted pointer {key}: {e}"))),
        }
    }

    fn decode_verified<M: Model>(handle: &CheckpointHandle, bytes: &[u8]) -> Result<M> {
        if !handle.verifies(bytes) {
            return Err(Error::Checkpoint(format!(
                "digest mismatch for {} (expected {})",
                handle.key, handle.digest
            )));
        }
        M::decode(bytes)
    }
}
