use crate::error::{EmissionError, Result};
use crate::types::{ProjectId, WeightPair};
use lumen_economics::LumenAmount;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

/// Per-project bookkeeping consumed by settlement. Projects are never
/// deleted once registered; disabling removes them from allocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectAccount {
    pub id: ProjectId,
    pub enabled: bool,
    pub stake_ceiling: Option<LumenAmount>,
    pub metrics_score: u128,
    pub weight_override: Option<WeightPair>,
    pub created_at: i64,
}

pub struct ProjectRegistry {
    projects: Arc<RwLock<HashMap<ProjectId, ProjectAccount>>>,
}

impl Default for ProjectRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ProjectRegistry {
    pub fn new() -> Self {
        Self {
            projects: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn register(&self, id: ProjectId, now: i64) -> Result<()> {
        let mut projects = self.projects.write().await;
        if projects.contains_key(&id) {
            return Err(EmissionError::ProjectAlreadyRegistered(id.value()));
        }
        projects.insert(
            id,
            ProjectAccount {
                id,
                enabled: true,
                stake_ceiling: None,
                metrics_score: 0,
                weight_override: None,
                created_at: now,
            },
        );
        info!(project = %id, "Project registered");
        Ok(())
    }

    pub async fn get(&self, id: ProjectId) -> Result<ProjectAccount> {
        let projects = self.projects.read().await;
        projects
            .get(&id)
            .cloned()
            .ok_or(EmissionError::UnknownProject(id.value()))
    }

    pub async fn set_enabled(&self, id: ProjectId, enabled: bool) -> Result<()> {
        let mut projects = self.projects.write().await;
        let project = projects
            .get_mut(&id)
            .ok_or(EmissionError::UnknownProject(id.value()))?;
        project.enabled = enabled;
        info!(project = %id, enabled, "Project enabled flag updated");
        Ok(())
    }

    pub async fn set_stake_ceiling(
        &self,
        id: ProjectId,
        ceiling: Option<LumenAmount>,
    ) -> Result<()> {
        let mut projects = self.projects.write().await;
        let project = projects
            .get_mut(&id)
            .ok_or(EmissionError::UnknownProject(id.value()))?;
        project.stake_ceiling = ceiling;
        Ok(())
    }

    /// Metrics scores are trusted oracle inputs; only range-checked.
    pub async fn set_metrics_score(&self, id: ProjectId, score: u128) -> Result<()> {
        if score > u64::MAX as u128 {
            return Err(EmissionError::InvalidConfiguration(
                "metrics score exceeds supported range".to_string(),
            ));
        }
        let mut projects = self.projects.write().await;
        let project = projects
            .get_mut(&id)
            .ok_or(EmissionError::UnknownProject(id.value()))?;
        project.metrics_score = score;
        info!(project = %id, score, "Project metrics score updated");
        Ok(())
    }

    pub async fn set_weight_override(
        &self,
        id: ProjectId,
        weights: Option<WeightPair>,
    ) -> Result<()> {
        if let Some(pair) = weights {
            pair.validate()?;
        }
        let mut projects = self.projects.write().await;
        let project = projects
            .get_mut(&id)
            .ok_or(EmissionError::UnknownProject(id.value()))?;
        project.weight_override = weights;
        Ok(())
    }

    /// Enumerates enabled projects for settlement. This is the one call
    /// whose cost scales with platform size; settlement makes exactly one
    /// pass over the result.
    pub async fn enabled_projects(&self) -> Vec<ProjectAccount> {
        let projects = self.projects.read().await;
        let mut enabled: Vec<ProjectAccount> =
            projects.values().filter(|p| p.enabled).cloned().collect();
        enabled.sort_by_key(|p| p.id);
        enabled
    }

    pub async fn len(&self) -> usize {
        self.projects.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.projects.read().await.is_empty()
    }
}
