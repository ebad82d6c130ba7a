//! Pipeline state store
//!
//! Holds, per audience, the pipelines that are active and, separately, the
//! ones that are paused. Both maps sit behind their own `RwLock`.
//!
//! # Lock Ordering
//!
//! Any operation touching both maps takes `active` first and `paused` second.
//! Nothing in this crate ever takes them in the other order.
//!
//! ```text
//! attach  ──► active.write() ──► paused.write()
//! detach  ──► active.write() ──► paused.write()
//! pause   ──► active.write() ──► paused.write()   (move active → paused)
//! resume  ──► active.write() ──► paused.write()   (move paused → active)
//! lookup  ──► active.read()
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use tracing::debug;

use tether_protocol::{Audience, AudienceKey, Pipeline};

use crate::error::{PipelineError, Result};

/// Stored pipeline with its attach sequence number
///
/// The sequence keeps lookups in attach order and survives pause/resume.
#[derive(Debug, Clone)]
struct Entry {
    seq: u64,
    pipeline: Arc<Pipeline>,
}

type PipelineMap = HashMap<AudienceKey, HashMap<String, Entry>>;

/// Where a pipeline currently lives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    /// In the active set, run by the execution engine
    Active,
    /// In the paused set, skipped by the execution engine
    Paused,
    /// Not attached
    Absent,
}

/// Active/paused pipeline state for all audiences
#[derive(Debug, Default)]
pub struct PipelineStore {
    /// Active pipelines (outer lock)
    active: RwLock<PipelineMap>,
    /// Paused pipelines (inner lock)
    paused: RwLock<PipelineMap>,
    /// Attach sequence counter
    next_seq: AtomicU64,
}

impl PipelineStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a pipeline to an audience
    ///
    /// Re-attaching an id that is already active replaces it in place,
    /// keeping its position. Attaching an id that is paused replaces it and
    /// makes it active again.
    pub fn attach(&self, audience: &Audience, pipeline: Pipeline) {
        let key = audience.key();
        let pipeline_id = pipeline.id.clone();

        let mut active = self.active.write();
        let mut paused = self.paused.write();

        let seq = active
            .get(&key)
            .and_then(|pipelines| pipelines.get(&pipeline_id))
            .map(|entry| entry.seq)
            .or_else(|| remove_entry(&mut paused, &key, &pipeline_id).map(|entry| entry.seq))
            .unwrap_or_else(|| self.next_seq.fetch_add(1, Ordering::Relaxed));

        active.entry(key).or_default().insert(
            pipeline_id.clone(),
            Entry {
                seq,
                pipeline: Arc::new(pipeline),
            },
        );

        debug!(audience = %audience, pipeline_id, "attached pipeline");
    }

    /// Detach a pipeline from an audience, whether active or paused
    ///
    /// Returns the state the pipeline was removed from. Detaching an unknown
    /// pipeline is not an error and returns `PipelineState::Absent`.
    pub fn detach(&self, audience: &Audience, pipeline_id: &str) -> PipelineState {
        let key = audience.key();

        let mut active = self.active.write();
        let mut paused = self.paused.write();

        let state = if remove_entry(&mut active, &key, pipeline_id).is_some() {
            PipelineState::Active
        } else if remove_entry(&mut paused, &key, pipeline_id).is_some() {
            PipelineState::Paused
        } else {
            PipelineState::Absent
        };

        if state != PipelineState::Absent {
            debug!(audience = %audience, pipeline_id, from = ?state, "detached pipeline");
        }

        state
    }

    /// Move a pipeline from the active set to the paused set
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::NotActive` if the pipeline is not active for
    /// the audience. Both sets are left unchanged in that case.
    pub fn pause(&self, audience: &Audience, pipeline_id: &str) -> Result<()> {
        let key = audience.key();

        let mut active = self.active.write();
        let mut paused = self.paused.write();

        let entry =
            remove_entry(&mut active, &key, pipeline_id).ok_or_else(|| PipelineError::NotActive {
                audience: key.to_string(),
                pipeline_id: pipeline_id.to_string(),
            })?;

        paused
            .entry(key)
            .or_default()
            .insert(pipeline_id.to_string(), entry);

        debug!(audience = %audience, pipeline_id, "paused pipeline");
        Ok(())
    }

    /// Move a pipeline from the paused set back to the active set
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::NotPaused` if the pipeline is not paused for
    /// the audience. Both sets are left unchanged in that case.
    pub fn resume(&self, audience: &Audience, pipeline_id: &str) -> Result<()> {
        let key = audience.key();

        let mut active = self.active.write();
        let mut paused = self.paused.write();

        let entry =
            remove_entry(&mut paused, &key, pipeline_id).ok_or_else(|| PipelineError::NotPaused {
                audience: key.to_string(),
                pipeline_id: pipeline_id.to_string(),
            })?;

        active
            .entry(key)
            .or_default()
            .insert(pipeline_id.to_string(), entry);

        debug!(audience = %audience, pipeline_id, "resumed pipeline");
        Ok(())
    }

    /// Snapshot of the active pipelines for an audience, in attach order
    pub fn active_pipelines_for(&self, audience: &Audience) -> Vec<Arc<Pipeline>> {
        snapshot(&self.active.read(), &audience.key())
    }

    /// Snapshot of the paused pipelines for an audience, in attach order
    pub fn paused_pipelines_for(&self, audience: &Audience) -> Vec<Arc<Pipeline>> {
        snapshot(&self.paused.read(), &audience.key())
    }

    /// Check whether a pipeline is active for an audience
    pub fn is_active(&self, audience: &Audience, pipeline_id: &str) -> bool {
        self.active
            .read()
            .get(&audience.key())
            .is_some_and(|pipelines| pipelines.contains_key(pipeline_id))
    }

    /// Current state of a pipeline
    pub fn state_of(&self, audience: &Audience, pipeline_id: &str) -> PipelineState {
        let key = audience.key();

        let active = self.active.read();
        let paused = self.paused.read();

        if active.get(&key).is_some_and(|p| p.contains_key(pipeline_id)) {
            PipelineState::Active
        } else if paused.get(&key).is_some_and(|p| p.contains_key(pipeline_id)) {
            PipelineState::Paused
        } else {
            PipelineState::Absent
        }
    }

    /// Number of active pipelines across all audiences
    pub fn active_count(&self) -> usize {
        self.active.read().values().map(HashMap::len).sum()
    }

    /// Number of paused pipelines across all audiences
    pub fn paused_count(&self) -> usize {
        self.paused.read().values().map(HashMap::len).sum()
    }
}

/// Remove an entry, dropping the audience sub-map once it is empty
fn remove_entry(map: &mut PipelineMap, key: &AudienceKey, pipeline_id: &str) -> Option<Entry> {
    let pipelines = map.get_mut(key)?;
    let entry = pipelines.remove(pipeline_id)?;
    if pipelines.is_empty() {
        map.remove(key);
    }
    Some(entry)
}

fn snapshot(map: &PipelineMap, key: &AudienceKey) -> Vec<Arc<Pipeline>> {
    let Some(pipelines) = map.get(key) else {
        return Vec::new();
    };

    let mut entries: Vec<&Entry> = pipelines.values().collect();
    entries.sort_unstable_by_key(|e| e.seq);
    entries.into_iter().map(|e| Arc::clone(&e.pipeline)).collect()
}

#[cfg(test)]
#[path = "store_test.rs"]
mod tests;
