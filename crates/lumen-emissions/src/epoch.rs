use crate::error::{EmissionError, Result};
use crate::types::{ProjectId, SplitPolicy, BASIS_POINTS};
use lumen_economics::LumenAmount;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

/// One emission distribution period. `settled_at` is set exactly once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Epoch {
    pub index: u64,
    pub start_time: i64,
    pub end_time: i64,
    pub global_impact: u128,
    pub total_emission: LumenAmount,
    pub settled_at: Option<i64>,
}

impl Epoch {
    pub fn is_settled(&self) -> bool {
        self.settled_at.is_some()
    }
}

/// Frozen per-(epoch, project) allocation record. The three sub-amounts
/// sum to `total` exactly; the score totals are the claim denominators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectEpochEmission {
    pub epoch: u64,
    pub project: ProjectId,
    pub total: LumenAmount,
    pub staking_pool: LumenAmount,
    pub units_pool: LumenAmount,
    pub treasury_cut: LumenAmount,
    pub staking_score_total: u128,
    pub unit_weight_total: u128,
}

/// Cuts a project's emission share into treasury, staking pool and
/// ownership-unit pool. The units pool takes whatever remains after the
/// other two floor divisions, so conservation is exact by construction.
pub fn split_emission(
    epoch: u64,
    project: ProjectId,
    share: LumenAmount,
    split: &SplitPolicy,
    staking_score_total: u128,
    unit_weight_total: u128,
) -> ProjectEpochEmission {
    let total = share.to_base_units() as u128;
    let treasury = (total * split.treasury_bps as u128 / BASIS_POINTS as u128) as u64;
    let remainder = share.to_base_units() - treasury;
    let staking =
        (remainder as u128 * split.staking_pool_bps as u128 / BASIS_POINTS as u128) as u64;
    let units = remainder - staking;

    ProjectEpochEmission {
        epoch,
        project,
        total: share,
        staking_pool: LumenAmount::from_base_units(staking),
        units_pool: LumenAmount::from_base_units(units),
        treasury_cut: LumenAmount::from_base_units(treasury),
        staking_score_total,
        unit_weight_total,
    }
}

/// The epoch state machine: Inactive -> Active -> Settled -> Active -> ...
/// Also the archive of settled epochs and their frozen per-project
/// allocation records.
pub struct EpochController {
    active: Arc<RwLock<Option<Epoch>>>,
    settled: Arc<RwLock<HashMap<u64, Epoch>>>,
    emissions: Arc<RwLock<HashMap<(u64, ProjectId), ProjectEpochEmission>>>,
    next_index: Arc<RwLock<u64>>,
}

impl Default for EpochController {
    fn default() -> Self {
        Self::new()
    }
}

impl EpochController {
    pub fn new() -> Self {
        Self {
            active: Arc::new(RwLock::new(None)),
            settled: Arc::new(RwLock::new(HashMap::new())),
            emissions: Arc::new(RwLock::new(HashMap::new())),
            next_index: Arc::new(RwLock::new(1)),
        }
    }

    /// Opens the next epoch. Fails while another epoch is active. The
    /// duration is read at call time, so policy changes apply from the
    /// next start only.
    pub async fn start(&self, now: i64, duration_secs: i64) -> Result<Epoch> {
        let mut active = self.active.write().await;
        if active.is_some() {
            return Err(EmissionError::EpochAlreadyActive);
        }

        let mut next_index = self.next_index.write().await;
        let epoch = Epoch {
            index: *next_index,
            start_time: now,
            end_time: now + duration_secs,
            global_impact: 0,
            total_emission: LumenAmount::ZERO,
            settled_at: None,
        };
        *next_index += 1;
        *active = Some(epoch.clone());

        info!(
            epoch = epoch.index,
            start_time = epoch.start_time,
            end_time = epoch.end_time,
            "Epoch started"
        );
        Ok(epoch)
    }

    /// Takes the active epoch for settlement, enforcing the time gate.
    /// The caller must follow up with `record_settlement`.
    pub async fn take_for_settlement(&self, now: i64) -> Result<Epoch> {
        let mut active = self.active.write().await;
        let epoch = active.take().ok_or(EmissionError::NoActiveEpoch)?;

        if now < epoch.end_time {
            let end_time = epoch.end_time;
            *active = Some(epoch);
            return Err(EmissionError::EpochNotFinished { end_time, now });
        }

        Ok(epoch)
    }

    /// Archives a settled epoch with its frozen allocation records.
    pub async fn record_settlement(
        &self,
        mut epoch: Epoch,
        records: Vec<ProjectEpochEmission>,
        now: i64,
    ) {
        epoch.settled_at = Some(now);

        {
            let mut emissions = self.emissions.write().await;
            for record in records {
                emissions.insert((record.epoch, record.project), record);
            }
        }

        let mut settled = self.settled.write().await;
        info!(
            epoch = epoch.index,
            global_impact = epoch.global_impact,
            total_emission = epoch.total_emission.to_lumen(),
            "Epoch settled"
        );
        settled.insert(epoch.index, epoch);
    }

    /// Restores an epoch taken for settlement when settlement fails, so
    /// the failed attempt leaves no state change.
    pub async fn restore_active(&self, epoch: Epoch) {
        let mut active = self.active.write().await;
        *active = Some(epoch);
    }

    pub async fn current(&self) -> Option<Epoch> {
        self.active.read().await.clone()
    }

    pub async fn settled_epoch(&self, index: u64) -> Result<Epoch> {
        let settled = self.settled.read().await;
        if let Some(epoch) = settled.get(&index) {
            return Ok(epoch.clone());
        }
        drop(settled);

        // Distinguish "not settled yet" from "never existed"
        let active = self.active.read().await;
        match active.as_ref() {
            Some(epoch) if epoch.index == index => Err(EmissionError::EpochNotSettled(index)),
            _ => Err(EmissionError::UnknownEpoch(index)),
        }
    }

    pub async fn emission_record(
        &self,
        epoch: u64,
        project: ProjectId,
    ) -> Option<ProjectEpochEmission> {
        let emissions = self.emissions.read().await;
        emissions.get(&(epoch, project)).cloned()
    }
}
