#![forbid(unsafe_code)]

use std::collections::BTreeMap;

use updraft_core::Asset;

/// How a single asset was resolved.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AssetOutcome {
    /// Already on disk and recorded in the store.
    Existing,
    /// Downloaded or copied during this run.
    Finished,
    Errored,
}

/// Final partition of a run's assets, handed out exactly once.
#[derive(Clone, Debug, Default)]
pub struct Partition {
    pub existing: Vec<Asset>,
    pub finished: Vec<Asset>,
    pub errored: Vec<Asset>,
}

/// Result of recording one asset.
#[derive(Debug)]
pub struct Completion {
    pub loaded: usize,
    pub total: usize,
    pub fraction: f64,
    /// Set for the one call that emptied `to_load`.
    pub partition: Option<Partition>,
}

/// Per-run asset bookkeeping.
///
/// Every asset starts in `to_load` and moves to exactly one of the three
/// outcome sets. The emptiness check happens inside [`RunState::complete`],
/// which callers hold the run lock for, so only one completion can observe
/// the transition to empty.
#[derive(Debug, Default)]
pub struct RunState {
    to_load: BTreeMap<String, Asset>,
    existing: Vec<Asset>,
    finished: Vec<Asset>,
    errored: Vec<Asset>,
    progress: BTreeMap<String, f64>,
    total: usize,
    partitioned: bool,
}

impl RunState {
    pub fn new(assets: &[Asset]) -> Self {
        Self {
            to_load: assets.iter().map(|a| (a.key.clone(), a.clone())).collect(),
            progress: assets.iter().map(|a| (a.key.clone(), 0.0)).collect(),
            total: assets.len(),
            ..Self::default()
        }
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.to_load.is_empty()
    }

    /// Hand out the partition if nothing is left to load and it has not been
    /// taken yet. Covers runs with no assets at all.
    pub fn take_partition(&mut self) -> Option<Partition> {
        if !self.to_load.is_empty() || self.partitioned {
            return None;
        }
        self.partitioned = true;
        Some(Partition {
            existing: std::mem::take(&mut self.existing),
            finished: std::mem::take(&mut self.finished),
            errored: std::mem::take(&mut self.errored),
        })
    }

    /// Record the outcome for `asset`. Unknown or repeated keys are ignored.
    pub fn complete(&mut self, asset: Asset, outcome: AssetOutcome) -> Completion {
        if self.to_load.remove(&asset.key).is_some() {
            self.progress.insert(asset.key.clone(), 1.0);
            match outcome {
                AssetOutcome::Existing => self.existing.push(asset),
                AssetOutcome::Finished => self.finished.push(asset),
                AssetOutcome::Errored => self.errored.push(asset),
            }
        } else {
            tracing::warn!(asset_key = %asset.key, "ignoring completion for asset not in flight");
        }

        let loaded = self.total - self.to_load.len();
        Completion {
            loaded,
            total: self.total,
            fraction: self.fraction(),
            partition: self.take_partition(),
        }
    }

    /// Mean progress across all known assets.
    pub fn fraction(&self) -> f64 {
        if self.progress.is_empty() {
            return 1.0;
        }
        #[expect(clippy::cast_precision_loss, reason = "asset counts are small")]
        let count = self.progress.len() as f64;
        self.progress.values().sum::<f64>() / count
    }
}
