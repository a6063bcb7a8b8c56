use crate::error::{EmissionError, Result};
use crate::types::{ClaimKind, ProjectId};
use lumen_economics::{AccountAddress, LumenAmount};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

/// Write-once payout record. A key that exists means the payout happened.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimRecord {
    pub epoch: u64,
    pub project: ProjectId,
    pub user: AccountAddress,
    pub kind: ClaimKind,
    pub amount: LumenAmount,
    pub claimed_at: i64,
}

type ClaimKey = (u64, ProjectId, AccountAddress, ClaimKind);

pub struct ClaimLedger {
    records: Arc<RwLock<HashMap<ClaimKey, ClaimRecord>>>,
}

impl Default for ClaimLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl ClaimLedger {
    pub fn new() -> Self {
        Self {
            records: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn get(
        &self,
        epoch: u64,
        project: ProjectId,
        user: AccountAddress,
        kind: ClaimKind,
    ) -> Option<ClaimRecord> {
        let records = self.records.read().await;
        records.get(&(epoch, project, user, kind)).cloned()
    }

    pub async fn is_claimed(
        &self,
        epoch: u64,
        project: ProjectId,
        user: AccountAddress,
        kind: ClaimKind,
    ) -> bool {
        let records = self.records.read().await;
        records.contains_key(&(epoch, project, user, kind))
    }

    /// Inserts the record, failing if one already exists for the key.
    pub async fn record(&self, record: ClaimRecord) -> Result<()> {
        let key = (record.epoch, record.project, record.user, record.kind);
        let mut records = self.records.write().await;
        if records.contains_key(&key) {
            return Err(EmissionError::AlreadyClaimed);
        }

        info!(
            user = %record.user,
            project = %record.project,
            epoch = record.epoch,
            kind = ?record.kind,
            amount = record.amount.to_lumen(),
            "Claim recorded"
        );
        records.insert(key, record);
        Ok(())
    }

    pub async fn claims_for_user(&self, user: AccountAddress) -> Vec<ClaimRecord> {
        let records = self.records.read().await;
        let mut claims: Vec<ClaimRecord> = records
            .values()
            .filter(|r| r.user == user)
            .cloned()
            .collect();
        claims.sort_by_key(|r| (r.epoch, r.project, r.kind as u8));
        claims
    }
}

/// A user's proportional cut of a pool: `pool * numerator / denominator`,
/// with the numerator capped at the denominator so a payout can never
/// exceed the pool.
pub fn entitlement(pool: LumenAmount, numerator: u128, denominator: u128) -> LumenAmount {
    if denominator == 0 || numerator == 0 {
        return LumenAmount::ZERO;
    }
    let pool_units = pool.to_base_units() as u128;
    let amount = pool_units * numerator.min(denominator) / denominator;
    LumenAmount::from_base_units(amount as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(epoch: u64, user_byte: u8, kind: ClaimKind) -> ClaimRecord {
        ClaimRecord {
            epoch,
            project: ProjectId::new(1),
            user: AccountAddress::from_bytes([user_byte; 32]),
            kind,
            amount: LumenAmount::from_lumen(10.0),
            claimed_at: 0,
        }
    }

    #[tokio::test]
    async fn second_record_for_same_key_fails() {
        let ledger = ClaimLedger::new();
        ledger.record(record(1, 1, ClaimKind::Staking)).await.unwrap();

        assert!(matches!(
            ledger.record(record(1, 1, ClaimKind::Staking)).await,
            Err(EmissionError::AlreadyClaimed)
        ));
    }

    #[tokio::test]
    async fn kinds_and_epochs_are_independent_keys() {
        let ledger = ClaimLedger::new();
        ledger.record(record(1, 1, ClaimKind::Staking)).await.unwrap();
        ledger
            .record(record(1, 1, ClaimKind::OwnershipUnits))
            .await
            .unwrap();
        ledger.record(record(2, 1, ClaimKind::Staking)).await.unwrap();

        let claims = ledger
            .claims_for_user(AccountAddress::from_bytes([1; 32]))
            .await;
        assert_eq!(claims.len(), 3);
    }

    #[test]
    fn entitlement_proportions() {
        let pool = LumenAmount::from_base_units(1_000);
        assert_eq!(entitlement(pool, 1, 4), LumenAmount::from_base_units(250));
        assert_eq!(entitlement(pool, 4, 4), pool);
        assert_eq!(entitlement(pool, 0, 4), LumenAmount::ZERO);
        assert_eq!(entitlement(pool, 1, 0), LumenAmount::ZERO);
    }

    #[test]
    fn entitlement_capped_at_pool() {
        let pool = LumenAmount::from_base_units(1_000);
        // Live numerator grown past the frozen denominator still pays at
        // most the whole pool
        assert_eq!(entitlement(pool, 10, 4), pool);
    }
}
