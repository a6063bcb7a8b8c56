use crate::claims::{entitlement, ClaimLedger, ClaimRecord};
use crate::clock::Clock;
use crate::epoch::{split_emission, Epoch, EpochController, ProjectEpochEmission};
use crate::error::{EmissionError, Result};
use crate::impact::{emission_for_impact, impact_score, proportional_share};
use crate::ownership::OwnershipWeightSource;
use crate::registry::{ProjectAccount, ProjectRegistry};
use crate::staking::{StakeLedger, StakePosition};
use crate::types::{
    ClaimEvent, ClaimKind, EmissionPolicy, EngineConfig, EngineEvent, EpochPolicy, ProjectId,
    SettlementEvent, SplitPolicy, StakeEvent, StakePolicy, UnstakeEvent, WeightPair,
};
use lumen_economics::{AccountAddress, LumenAmount, TokenLedger, TransferReason};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

fn ledger_err(e: anyhow::Error) -> EmissionError {
    EmissionError::Ledger(e.to_string())
}

fn ownership_err(e: anyhow::Error) -> EmissionError {
    EmissionError::Ownership(e.to_string())
}

/// Result of `check_unclaimed`: whether a payout is still available and
/// the entitlement it would produce right now.
#[derive(Debug, Clone, Copy)]
pub struct UnclaimedReward {
    pub has_unclaimed: bool,
    pub amount: LumenAmount,
}

/// The emission distribution engine. One instance owns all mutable core
/// state; the token ledger and the ownership-unit source are external
/// collaborators reached through their interfaces only.
pub struct EmissionEngine {
    authority: AccountAddress,
    config: Arc<RwLock<EngineConfig>>,
    clock: Arc<dyn Clock>,
    ledger: Arc<TokenLedger>,
    ownership: Arc<dyn OwnershipWeightSource>,
    registry: ProjectRegistry,
    stakes: StakeLedger,
    epochs: EpochController,
    claims: ClaimLedger,
    global_metrics: Arc<RwLock<u128>>,
    events: Arc<RwLock<Vec<EngineEvent>>>,
}

impl EmissionEngine {
    pub fn new(
        ledger: Arc<TokenLedger>,
        ownership: Arc<dyn OwnershipWeightSource>,
        clock: Arc<dyn Clock>,
        authority: AccountAddress,
        config: EngineConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            authority,
            config: Arc::new(RwLock::new(config)),
            clock,
            ledger,
            ownership,
            registry: ProjectRegistry::new(),
            stakes: StakeLedger::new(),
            epochs: EpochController::new(),
            claims: ClaimLedger::new(),
            global_metrics: Arc::new(RwLock::new(0)),
            events: Arc::new(RwLock::new(Vec::new())),
        })
    }

    fn ensure_authority(&self, caller: AccountAddress) -> Result<()> {
        if caller != self.authority {
            return Err(EmissionError::Unauthorized);
        }
        Ok(())
    }

    async fn push_event(&self, event: EngineEvent) {
        let mut events = self.events.write().await;
        events.push(event);
        if events.len() > 10_000 {
            events.drain(0..1_000);
        }
    }

    // ---- project administration -------------------------------------

    pub async fn register_project(&self, caller: AccountAddress, id: ProjectId) -> Result<()> {
        self.ensure_authority(caller)?;
        self.registry.register(id, self.clock.now()).await
    }

    pub async fn set_project_enabled(
        &self,
        caller: AccountAddress,
        id: ProjectId,
        enabled: bool,
    ) -> Result<()> {
        self.ensure_authority(caller)?;
        self.registry.set_enabled(id, enabled).await
    }

    pub async fn set_stake_ceiling(
        &self,
        caller: AccountAddress,
        id: ProjectId,
        ceiling: Option<LumenAmount>,
    ) -> Result<()> {
        self.ensure_authority(caller)?;
        self.registry.set_stake_ceiling(id, ceiling).await
    }

    pub async fn set_project_metrics(
        &self,
        caller: AccountAddress,
        id: ProjectId,
        score: u128,
    ) -> Result<()> {
        self.ensure_authority(caller)?;
        self.registry.set_metrics_score(id, score).await
    }

    pub async fn set_project_weights(
        &self,
        caller: AccountAddress,
        id: ProjectId,
        weights: Option<WeightPair>,
    ) -> Result<()> {
        self.ensure_authority(caller)?;
        self.registry.set_weight_override(id, weights).await
    }

    // ---- configuration ----------------------------------------------

    pub async fn set_global_metrics(&self, caller: AccountAddress, score: u128) -> Result<()> {
        self.ensure_authority(caller)?;
        if score > u64::MAX as u128 {
            return Err(EmissionError::InvalidConfiguration(
                "metrics score exceeds supported range".to_string(),
            ));
        }
        let mut metrics = self.global_metrics.write().await;
        *metrics = score;
        info!(score, "Global metrics score updated");
        Ok(())
    }

    pub async fn set_global_weights(
        &self,
        caller: AccountAddress,
        staking_bps: u64,
        metrics_bps: u64,
    ) -> Result<()> {
        self.ensure_authority(caller)?;
        let pair = WeightPair::new(staking_bps, metrics_bps)?;
        let mut config = self.config.write().await;
        config.weights = pair;
        Ok(())
    }

    pub async fn set_split_policy(&self, caller: AccountAddress, split: SplitPolicy) -> Result<()> {
        self.ensure_authority(caller)?;
        split.validate()?;
        let mut config = self.config.write().await;
        config.split = split;
        Ok(())
    }

    pub async fn set_emission_policy(
        &self,
        caller: AccountAddress,
        emission: EmissionPolicy,
    ) -> Result<()> {
        self.ensure_authority(caller)?;
        emission.validate()?;
        let mut config = self.config.write().await;
        config.emission = emission;
        Ok(())
    }

    pub async fn set_stake_policy(&self, caller: AccountAddress, stake: StakePolicy) -> Result<()> {
        self.ensure_authority(caller)?;
        stake.validate()?;
        let mut config = self.config.write().await;
        config.stake = stake;
        Ok(())
    }

    /// Takes effect on the next `start_epoch` only; a running epoch keeps
    /// its end time.
    pub async fn set_epoch_duration(&self, caller: AccountAddress, duration_secs: i64) -> Result<()> {
        self.ensure_authority(caller)?;
        let policy = EpochPolicy { duration_secs };
        policy.validate()?;
        let mut config = self.config.write().await;
        config.epoch = policy;
        Ok(())
    }

    pub async fn config(&self) -> EngineConfig {
        *self.config.read().await
    }

    // ---- staking -----------------------------------------------------

    pub async fn stake(
        &self,
        caller: AccountAddress,
        project: ProjectId,
        amount: LumenAmount,
        lock_days: u32,
    ) -> Result<StakeEvent> {
        let account = self.registry.get(project).await?;
        if !account.enabled {
            return Err(EmissionError::ProjectDisabled(project.value()));
        }

        let config = *self.config.read().await;
        let score = self
            .stakes
            .validate_stake(project, amount, lock_days, account.stake_ceiling, &config.stake)
            .await?;

        let now = self.clock.now();
        self.ledger
            .transfer(
                caller,
                AccountAddress::stake_vault(),
                amount,
                TransferReason::StakeDeposit,
                now,
            )
            .await
            .map_err(ledger_err)?;

        let (index, position) = self
            .stakes
            .record_stake(caller, project, amount, lock_days, score, now)
            .await;

        let event = StakeEvent {
            user: caller,
            project,
            amount,
            lock_days,
            unlock_time: position.unlock_time,
            score,
            position_index: index,
            timestamp: now,
        };
        self.push_event(EngineEvent::Staked(event.clone())).await;
        Ok(event)
    }

    pub async fn unstake(
        &self,
        caller: AccountAddress,
        project: ProjectId,
        position_index: usize,
    ) -> Result<LumenAmount> {
        self.registry.get(project).await?;

        let now = self.clock.now();
        let position = self
            .stakes
            .unstake(caller, project, position_index, now)
            .await?;

        self.ledger
            .transfer(
                AccountAddress::stake_vault(),
                caller,
                position.amount,
                TransferReason::StakeRefund,
                now,
            )
            .await
            .map_err(ledger_err)?;

        self.push_event(EngineEvent::Unstaked(UnstakeEvent {
            user: caller,
            project,
            position_index,
            amount: position.amount,
            timestamp: now,
        }))
        .await;

        Ok(position.amount)
    }

    // ---- epoch lifecycle --------------------------------------------

    pub async fn start_epoch(&self, caller: AccountAddress) -> Result<Epoch> {
        self.ensure_authority(caller)?;
        let duration = self.config.read().await.epoch.duration_secs;
        let epoch = self.epochs.start(self.clock.now(), duration).await?;

        self.push_event(EngineEvent::EpochStarted {
            epoch: epoch.index,
            start_time: epoch.start_time,
            end_time: epoch.end_time,
        })
        .await;
        Ok(epoch)
    }

    pub async fn process_epoch(&self, caller: AccountAddress) -> Result<SettlementEvent> {
        self.ensure_authority(caller)?;

        let now = self.clock.now();
        let epoch = self.epochs.take_for_settlement(now).await?;

        match self.settle(epoch.clone(), now).await {
            Ok(event) => Ok(event),
            Err(e) => {
                // Settlement failed after the time gate; put the epoch
                // back so the attempt leaves no state change.
                self.epochs.restore_active(epoch).await;
                Err(e)
            }
        }
    }

    async fn settle(&self, mut epoch: Epoch, now: i64) -> Result<SettlementEvent> {
        let config = *self.config.read().await;
        let global_metrics = *self.global_metrics.read().await;
        let global_staking = self.stakes.global_score().await;

        let global_impact = impact_score(global_staking, global_metrics, &config.weights);
        let total_emission = emission_for_impact(global_impact, &config.emission);

        // The one pass that scales with platform size: every enabled
        // project contributes its impact to the allocation denominator.
        let projects = self.registry.enabled_projects().await;
        let mut impacts = Vec::with_capacity(projects.len());
        let mut impact_sum: u128 = 0;
        for project in &projects {
            let weights = project.weight_override.unwrap_or(config.weights);
            let staking_total = self.stakes.project_score(project.id).await;
            let impact = impact_score(staking_total, project.metrics_score, &weights);
            impact_sum = impact_sum.saturating_add(impact);
            impacts.push((project.id, impact, staking_total));
        }

        let mut records = Vec::new();
        let mut treasury_total = LumenAmount::ZERO;
        for (id, impact, staking_total) in impacts {
            let share = proportional_share(total_emission, impact, impact_sum);
            if share.is_zero() {
                continue;
            }

            let unit_total = self
                .ownership
                .total_issued(id)
                .await
                .map_err(ownership_err)?;

            let record = split_emission(
                epoch.index,
                id,
                share,
                &config.split,
                staking_total,
                unit_total,
            );
            treasury_total = treasury_total.saturating_add(record.treasury_cut);
            records.push(record);
        }

        // Treasury cuts are minted eagerly; the pools mint lazily as
        // claims arrive.
        if !treasury_total.is_zero() {
            self.ledger
                .mint_to(
                    AccountAddress::treasury(),
                    treasury_total,
                    TransferReason::TreasuryCut,
                    now,
                )
                .await
                .map_err(ledger_err)?;
        }

        epoch.global_impact = global_impact;
        epoch.total_emission = total_emission;
        let projects_settled = records.len();
        let index = epoch.index;
        self.epochs.record_settlement(epoch, records, now).await;

        let event = SettlementEvent {
            epoch: index,
            global_impact,
            total_emission,
            projects_settled,
            timestamp: now,
        };
        info!(
            epoch = index,
            global_impact,
            total_emission = total_emission.to_lumen(),
            projects_settled,
            "Epoch settlement complete"
        );
        self.push_event(EngineEvent::EpochSettled(event.clone())).await;
        Ok(event)
    }

    // ---- claims ------------------------------------------------------

    pub async fn check_unclaimed(
        &self,
        epoch: u64,
        project: ProjectId,
        user: AccountAddress,
        kind: ClaimKind,
    ) -> Result<UnclaimedReward> {
        self.epochs.settled_epoch(epoch).await?;

        if self.claims.is_claimed(epoch, project, user, kind).await {
            return Ok(UnclaimedReward {
                has_unclaimed: false,
                amount: LumenAmount::ZERO,
            });
        }

        let amount = self.entitlement_for(epoch, project, user, kind).await?;
        Ok(UnclaimedReward {
            has_unclaimed: !amount.is_zero(),
            amount,
        })
    }

    pub async fn claim(
        &self,
        caller: AccountAddress,
        epoch: u64,
        project: ProjectId,
        kind: ClaimKind,
    ) -> Result<LumenAmount> {
        self.epochs.settled_epoch(epoch).await?;

        if self.claims.is_claimed(epoch, project, caller, kind).await {
            return Err(EmissionError::AlreadyClaimed);
        }

        let amount = self.entitlement_for(epoch, project, caller, kind).await?;
        if amount.is_zero() {
            return Err(EmissionError::NothingToClaim);
        }

        let now = self.clock.now();
        self.ledger
            .mint_to(caller, amount, TransferReason::RewardClaim, now)
            .await
            .map_err(ledger_err)?;

        self.claims
            .record(ClaimRecord {
                epoch,
                project,
                user: caller,
                kind,
                amount,
                claimed_at: now,
            })
            .await?;

        self.push_event(EngineEvent::Claimed(ClaimEvent {
            user: caller,
            project,
            epoch,
            kind,
            amount,
            timestamp: now,
        }))
        .await;

        Ok(amount)
    }

    /// `pool * numerator / frozen denominator`. The pool and denominators
    /// come from the immutable settlement record; the user's numerator is
    /// read live.
    async fn entitlement_for(
        &self,
        epoch: u64,
        project: ProjectId,
        user: AccountAddress,
        kind: ClaimKind,
    ) -> Result<LumenAmount> {
        let record = match self.epochs.emission_record(epoch, project).await {
            Some(record) => record,
            // Project earned nothing in this epoch
            None => return Ok(LumenAmount::ZERO),
        };

        let (pool, numerator, denominator) = match kind {
            ClaimKind::Staking => (
                record.staking_pool,
                self.stakes.user_score(user, project).await,
                record.staking_score_total,
            ),
            ClaimKind::OwnershipUnits => (
                record.units_pool,
                self.ownership
                    .balance_of(user, project)
                    .await
                    .map_err(ownership_err)?,
                record.unit_weight_total,
            ),
        };

        Ok(entitlement(pool, numerator, denominator))
    }

    // ---- queries -----------------------------------------------------

    pub async fn current_epoch(&self) -> Option<Epoch> {
        self.epochs.current().await
    }

    pub async fn settled_epoch(&self, index: u64) -> Result<Epoch> {
        self.epochs.settled_epoch(index).await
    }

    pub async fn project_emission(
        &self,
        epoch: u64,
        project: ProjectId,
    ) -> Option<ProjectEpochEmission> {
        self.epochs.emission_record(epoch, project).await
    }

    pub async fn project(&self, id: ProjectId) -> Result<ProjectAccount> {
        self.registry.get(id).await
    }

    pub async fn positions_of(
        &self,
        user: AccountAddress,
        project: ProjectId,
    ) -> Vec<(usize, StakePosition)> {
        self.stakes.positions_of(user, project).await
    }

    pub async fn project_score(&self, project: ProjectId) -> u128 {
        self.stakes.project_score(project).await
    }

    pub async fn user_score(&self, user: AccountAddress, project: ProjectId) -> u128 {
        self.stakes.user_score(user, project).await
    }

    pub async fn global_score(&self) -> u128 {
        self.stakes.global_score().await
    }

    pub async fn claims_for_user(&self, user: AccountAddress) -> Vec<ClaimRecord> {
        self.claims.claims_for_user(user).await
    }

    pub async fn events(&self, limit: usize) -> Vec<EngineEvent> {
        let events = self.events.read().await;
        let start = events.len().saturating_sub(limit);
        events[start..].to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::ownership::MemoryOwnership;
    use crate::types::SECONDS_PER_DAY;
    use lumen_economics::memory_ledger;

    fn addr(b: u8) -> AccountAddress {
        AccountAddress::from_bytes([b; 32])
    }

    struct Harness {
        engine: EmissionEngine,
        clock: Arc<ManualClock>,
        ledger: Arc<TokenLedger>,
        authority: AccountAddress,
    }

    async fn harness() -> Harness {
        let ledger = memory_ledger();
        let ownership = Arc::new(MemoryOwnership::new());
        let clock = Arc::new(ManualClock::new(1_700_000_000));
        let authority = addr(0xAD);
        let engine = EmissionEngine::new(
            ledger.clone(),
            ownership,
            clock.clone(),
            authority,
            EngineConfig::default(),
        )
        .unwrap();
        Harness {
            engine,
            clock,
            ledger,
            authority,
        }
    }

    #[tokio::test]
    async fn privileged_operations_reject_non_authority() {
        let h = harness().await;
        let intruder = addr(0x66);

        assert!(matches!(
            h.engine.start_epoch(intruder).await,
            Err(EmissionError::Unauthorized)
        ));
        assert!(matches!(
            h.engine.register_project(intruder, ProjectId::new(1)).await,
            Err(EmissionError::Unauthorized)
        ));
        assert!(matches!(
            h.engine.set_global_metrics(intruder, 100).await,
            Err(EmissionError::Unauthorized)
        ));
        assert!(matches!(
            h.engine.set_global_weights(intruder, 5_000, 5_000).await,
            Err(EmissionError::Unauthorized)
        ));
    }

    #[tokio::test]
    async fn weight_setter_validates_unity() {
        let h = harness().await;

        assert!(matches!(
            h.engine.set_global_weights(h.authority, 4_000, 7_000).await,
            Err(EmissionError::WeightsNotUnity { got: 11_000, .. })
        ));
        h.engine
            .set_global_weights(h.authority, 4_000, 6_000)
            .await
            .unwrap();
        assert_eq!(h.engine.config().await.weights.staking_bps, 4_000);
    }

    #[tokio::test]
    async fn stake_requires_known_enabled_project() {
        let h = harness().await;
        let user = addr(1);
        let project = ProjectId::new(1);

        assert!(matches!(
            h.engine
                .stake(user, project, LumenAmount::from_lumen(10.0), 30)
                .await,
            Err(EmissionError::UnknownProject(1))
        ));

        h.engine.register_project(h.authority, project).await.unwrap();
        h.engine
            .set_project_enabled(h.authority, project, false)
            .await
            .unwrap();

        assert!(matches!(
            h.engine
                .stake(user, project, LumenAmount::from_lumen(10.0), 30)
                .await,
            Err(EmissionError::ProjectDisabled(1))
        ));
    }

    #[tokio::test]
    async fn stake_moves_principal_into_vault() {
        let h = harness().await;
        let user = addr(1);
        let project = ProjectId::new(1);
        h.engine.register_project(h.authority, project).await.unwrap();

        h.ledger
            .mint_to(user, LumenAmount::from_lumen(100.0), TransferReason::Emission, 0)
            .await
            .unwrap();

        let event = h
            .engine
            .stake(user, project, LumenAmount::from_lumen(60.0), 30)
            .await
            .unwrap();
        assert_eq!(event.position_index, 0);
        assert!(event.score > 0);

        assert_eq!(
            h.ledger.balance_of(user).await.unwrap(),
            LumenAmount::from_lumen(40.0)
        );
        assert_eq!(
            h.ledger
                .balance_of(AccountAddress::stake_vault())
                .await
                .unwrap(),
            LumenAmount::from_lumen(60.0)
        );
    }

    #[tokio::test]
    async fn stake_without_funds_leaves_no_position() {
        let h = harness().await;
        let user = addr(1);
        let project = ProjectId::new(1);
        h.engine.register_project(h.authority, project).await.unwrap();

        assert!(matches!(
            h.engine
                .stake(user, project, LumenAmount::from_lumen(10.0), 30)
                .await,
            Err(EmissionError::Ledger(_))
        ));
        assert!(h.engine.positions_of(user, project).await.is_empty());
        assert_eq!(h.engine.global_score().await, 0);
    }

    #[tokio::test]
    async fn unstake_round_trips_principal() {
        let h = harness().await;
        let user = addr(1);
        let project = ProjectId::new(1);
        h.engine.register_project(h.authority, project).await.unwrap();
        h.ledger
            .mint_to(user, LumenAmount::from_lumen(50.0), TransferReason::Emission, 0)
            .await
            .unwrap();

        let event = h
            .engine
            .stake(user, project, LumenAmount::from_lumen(50.0), 7)
            .await
            .unwrap();

        h.clock.advance(7 * SECONDS_PER_DAY);
        let returned = h
            .engine
            .unstake(user, project, event.position_index)
            .await
            .unwrap();

        assert_eq!(returned, LumenAmount::from_lumen(50.0));
        assert_eq!(
            h.ledger.balance_of(user).await.unwrap(),
            LumenAmount::from_lumen(50.0)
        );
    }

    #[tokio::test]
    async fn claim_before_settlement_fails() {
        let h = harness().await;
        let user = addr(1);
        let project = ProjectId::new(1);
        h.engine.register_project(h.authority, project).await.unwrap();
        h.engine.start_epoch(h.authority).await.unwrap();

        assert!(matches!(
            h.engine.claim(user, 1, project, ClaimKind::Staking).await,
            Err(EmissionError::EpochNotSettled(1))
        ));
        assert!(matches!(
            h.engine.claim(user, 9, project, ClaimKind::Staking).await,
            Err(EmissionError::UnknownEpoch(9))
        ));
    }
}
