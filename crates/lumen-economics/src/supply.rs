use crate::types::{LumenAmount, TransferEvent};
use anyhow::{bail, Result};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

#[derive(Debug, Clone, Default)]
pub struct SupplyMetrics {
    pub total_supply: LumenAmount,
    pub emission_issued: LumenAmount,
}

/// Tracks minted supply against the hard cap. Every mint in the system
/// goes through here; the cap is enforced unconditionally.
pub struct TokenSupply {
    metrics: Arc<RwLock<SupplyMetrics>>,
    transfer_history: Arc<RwLock<Vec<TransferEvent>>>,
}

impl Default for TokenSupply {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenSupply {
    pub fn new() -> Self {
        Self {
            metrics: Arc::new(RwLock::new(SupplyMetrics::default())),
            transfer_history: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub async fn mint(&self, amount: LumenAmount) -> Result<()> {
        let mut metrics = self.metrics.write().await;

        let new_supply = metrics
            .total_supply
            .checked_add(amount)
            .ok_or_else(|| anyhow::anyhow!("Supply overflow"))?;

        if new_supply > LumenAmount::MAX_SUPPLY {
            bail!(
                "Cannot mint: would exceed max supply of {}",
                LumenAmount::MAX_SUPPLY
            );
        }

        metrics.total_supply = new_supply;
        metrics.emission_issued = metrics.emission_issued.saturating_add(amount);

        info!(
            minted = amount.to_lumen(),
            total_supply = new_supply.to_lumen(),
            "Supply minted"
        );
        Ok(())
    }

    pub async fn can_mint(&self, amount: LumenAmount) -> bool {
        let metrics = self.metrics.read().await;
        match metrics.total_supply.checked_add(amount) {
            Some(new_supply) => new_supply <= LumenAmount::MAX_SUPPLY,
            None => false,
        }
    }

    pub async fn remaining_mintable(&self) -> LumenAmount {
        let metrics = self.metrics.read().await;
        LumenAmount::MAX_SUPPLY.saturating_sub(metrics.total_supply)
    }

    pub async fn total_supply(&self) -> LumenAmount {
        let metrics = self.metrics.read().await;
        metrics.total_supply
    }

    pub async fn get_metrics(&self) -> SupplyMetrics {
        let metrics = self.metrics.read().await;
        metrics.clone()
    }

    pub async fn add_transfer_event(&self, event: TransferEvent) {
        let mut history = self.transfer_history.write().await;
        history.push(event);

        // Keep only the most recent events to prevent unbounded growth
        if history.len() > 10_000 {
            history.drain(0..1_000);
        }
    }

    pub async fn get_transfer_history(&self, limit: usize) -> Vec<TransferEvent> {
        let history = self.transfer_history.read().await;
        let start = history.len().saturating_sub(limit);
        history[start..].to_vec()
    }
}
