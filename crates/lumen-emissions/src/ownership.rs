use crate::types::ProjectId;
use anyhow::Result;
use async_trait::async_trait;
use lumen_economics::AccountAddress;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Read-only view onto ownership-unit balances. The bonding-curve market
/// that issues the units lives outside this engine; settlement freezes
/// `total_issued` per project and claims read `balance_of` live.
#[async_trait]
pub trait OwnershipWeightSource: Send + Sync {
    async fn balance_of(&self, user: AccountAddress, project: ProjectId) -> Result<u128>;
    async fn total_issued(&self, project: ProjectId) -> Result<u128>;
}

/// In-memory ownership table for hosting and tests.
pub struct MemoryOwnership {
    balances: Arc<RwLock<HashMap<(ProjectId, AccountAddress), u128>>>,
    issued: Arc<RwLock<HashMap<ProjectId, u128>>>,
}

impl Default for MemoryOwnership {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryOwnership {
    pub fn new() -> Self {
        Self {
            balances: Arc::new(RwLock::new(HashMap::new())),
            issued: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Sets a holder's unit balance, adjusting the project's issued total
    /// by the difference.
    pub async fn set_balance(&self, user: AccountAddress, project: ProjectId, units: u128) {
        let mut balances = self.balances.write().await;
        let mut issued = self.issued.write().await;

        let previous = balances.insert((project, user), units).unwrap_or(0);
        let total = issued.entry(project).or_insert(0);
        *total = total.saturating_sub(previous).saturating_add(units);
    }
}

#[async_trait]
impl OwnershipWeightSource for MemoryOwnership {
    async fn balance_of(&self, user: AccountAddress, project: ProjectId) -> Result<u128> {
        let balances = self.balances.read().await;
        Ok(balances.get(&(project, user)).copied().unwrap_or(0))
    }

    async fn total_issued(&self, project: ProjectId) -> Result<u128> {
        let issued = self.issued.read().await;
        Ok(issued.get(&project).copied().unwrap_or(0))
    }
}
