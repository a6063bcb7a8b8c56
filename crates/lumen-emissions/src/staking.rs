use crate::error::{EmissionError, Result};
use crate::types::{ProjectId, StakePolicy, SECONDS_PER_DAY};
use lumen_economics::{AccountAddress, LumenAmount};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// A single time-locked stake. A user may hold any number of concurrent
/// positions per project, each scored and unlocked independently.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StakePosition {
    pub owner: AccountAddress,
    pub project: ProjectId,
    pub amount: LumenAmount,
    pub start_time: i64,
    pub lock_days: u32,
    pub unlock_time: i64,
    pub score: u128,
    pub active: bool,
}

#[derive(Debug, Clone, Copy, Default)]
struct ProjectTotals {
    amount: LumenAmount,
    score: u128,
}

/// Owns stake positions and keeps every aggregate the allocator needs
/// (per-project amount and score, per-user score, global score) current
/// on each stake/unstake, so settlement never iterates positions.
pub struct StakeLedger {
    positions: Arc<RwLock<HashMap<(ProjectId, AccountAddress), Vec<StakePosition>>>>,
    project_totals: Arc<RwLock<HashMap<ProjectId, ProjectTotals>>>,
    user_scores: Arc<RwLock<HashMap<(ProjectId, AccountAddress), u128>>>,
    global_score: Arc<RwLock<u128>>,
}

impl Default for StakeLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl StakeLedger {
    pub fn new() -> Self {
        Self {
            positions: Arc::new(RwLock::new(HashMap::new())),
            project_totals: Arc::new(RwLock::new(HashMap::new())),
            user_scores: Arc::new(RwLock::new(HashMap::new())),
            global_score: Arc::new(RwLock::new(0)),
        }
    }

    /// Validates a stake request without mutating anything, returning the
    /// score the position would carry. The caller moves the principal
    /// first and then calls `record_stake` with the returned score.
    pub async fn validate_stake(
        &self,
        project: ProjectId,
        amount: LumenAmount,
        lock_days: u32,
        ceiling: Option<LumenAmount>,
        policy: &StakePolicy,
    ) -> Result<u128> {
        if amount == LumenAmount::ZERO {
            return Err(EmissionError::ZeroAmount);
        }

        let weight_bps = policy.weight_bps(lock_days)?;

        if let Some(ceiling) = ceiling {
            let current = self.project_amount(project).await;
            let requested = current.saturating_add(amount);
            if requested > ceiling {
                return Err(EmissionError::StakeCeilingExceeded {
                    ceiling: ceiling.to_string(),
                    requested: requested.to_string(),
                });
            }
        }

        Ok(amount.to_base_units() as u128 * weight_bps as u128
            / crate::types::BASIS_POINTS as u128)
    }

    /// Appends a validated position and bumps every aggregate. Returns the
    /// position index within the (project, user) list and the position.
    pub async fn record_stake(
        &self,
        owner: AccountAddress,
        project: ProjectId,
        amount: LumenAmount,
        lock_days: u32,
        score: u128,
        now: i64,
    ) -> (usize, StakePosition) {
        let position = StakePosition {
            owner,
            project,
            amount,
            start_time: now,
            lock_days,
            unlock_time: now + lock_days as i64 * SECONDS_PER_DAY,
            score,
            active: true,
        };

        let index = {
            let mut positions = self.positions.write().await;
            let list = positions.entry((project, owner)).or_default();
            list.push(position.clone());
            list.len() - 1
        };

        {
            let mut totals = self.project_totals.write().await;
            let entry = totals.entry(project).or_default();
            entry.amount = entry.amount.saturating_add(amount);
            entry.score = entry.score.saturating_add(score);
        }
        {
            let mut user_scores = self.user_scores.write().await;
            let entry = user_scores.entry((project, owner)).or_default();
            *entry = entry.saturating_add(score);
        }
        {
            let mut global = self.global_score.write().await;
            *global = global.saturating_add(score);
        }

        info!(
            user = %owner,
            project = %project,
            amount = amount.to_lumen(),
            lock_days,
            unlock_time = position.unlock_time,
            score,
            position_index = index,
            "Stake recorded"
        );

        (index, position)
    }

    /// Marks a position inactive and rolls its contribution out of every
    /// aggregate. Fails while the position is still locked.
    pub async fn unstake(
        &self,
        owner: AccountAddress,
        project: ProjectId,
        index: usize,
        now: i64,
    ) -> Result<StakePosition> {
        let position = {
            let mut positions = self.positions.write().await;
            let list = positions
                .get_mut(&(project, owner))
                .ok_or(EmissionError::PositionNotFound { index })?;
            let position = list
                .get_mut(index)
                .ok_or(EmissionError::PositionNotFound { index })?;

            if !position.active {
                return Err(EmissionError::PositionInactive { index });
            }
            if now < position.unlock_time {
                return Err(EmissionError::StillLocked {
                    unlock_time: position.unlock_time,
                    now,
                });
            }

            position.active = false;
            position.clone()
        };

        {
            let mut totals = self.project_totals.write().await;
            if let Some(entry) = totals.get_mut(&project) {
                entry.amount = entry.amount.saturating_sub(position.amount);
                entry.score = entry.score.saturating_sub(position.score);
            }
        }
        {
            let mut user_scores = self.user_scores.write().await;
            if let Some(score) = user_scores.get_mut(&(project, owner)) {
                *score = score.saturating_sub(position.score);
            }
        }
        {
            let mut global = self.global_score.write().await;
            *global = global.saturating_sub(position.score);
        }

        debug!(
            user = %owner,
            project = %project,
            position_index = index,
            amount = position.amount.to_lumen(),
            "Stake released"
        );

        Ok(position)
    }

    /// A user's active positions in a project, with their indexes.
    pub async fn positions_of(
        &self,
        owner: AccountAddress,
        project: ProjectId,
    ) -> Vec<(usize, StakePosition)> {
        let positions = self.positions.read().await;
        positions
            .get(&(project, owner))
            .map(|list| {
                list.iter()
                    .enumerate()
                    .filter(|(_, p)| p.active)
                    .map(|(i, p)| (i, p.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub async fn project_amount(&self, project: ProjectId) -> LumenAmount {
        let totals = self.project_totals.read().await;
        totals.get(&project).map(|t| t.amount).unwrap_or_default()
    }

    pub async fn project_score(&self, project: ProjectId) -> u128 {
        let totals = self.project_totals.read().await;
        totals.get(&project).map(|t| t.score).unwrap_or_default()
    }

    pub async fn user_score(&self, owner: AccountAddress, project: ProjectId) -> u128 {
        let user_scores = self.user_scores.read().await;
        user_scores.get(&(project, owner)).copied().unwrap_or(0)
    }

    pub async fn global_score(&self) -> u128 {
        *self.global_score.read().await
    }
}
