use crate::error::{EmissionError, Result};
use lumen_economics::{AccountAddress, LumenAmount};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const BASIS_POINTS: u64 = 10_000;
pub const SECONDS_PER_DAY: i64 = 86_400;

/// Ceiling on lock multipliers (100x). Keeps `weight_bps` interpolation
/// inside u64 for any permitted lock duration.
pub const MAX_MULTIPLIER_BPS: u64 = 1_000_000;

pub const MIN_EPOCH_DURATION_SECS: i64 = SECONDS_PER_DAY; // 1 day
pub const MAX_EPOCH_DURATION_SECS: i64 = 90 * SECONDS_PER_DAY; // 90 days

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProjectId(u64);

impl ProjectId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "project-{}", self.0)
    }
}

/// Which pool a claim draws from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClaimKind {
    Staking,
    OwnershipUnits,
}

/// Lock-duration scoring curve. The curve interpolates linearly, in basis
/// points, from `min_multiplier_bps` at the shortest permitted lock to
/// `max_multiplier_bps` at the longest. Monotonically non-decreasing for
/// any endpoints with max >= min.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct StakePolicy {
    pub min_lock_days: u32,
    pub max_lock_days: u32,
    pub min_multiplier_bps: u64,
    pub max_multiplier_bps: u64,
}

impl Default for StakePolicy {
    fn default() -> Self {
        Self {
            min_lock_days: 7,
            max_lock_days: 730,
            min_multiplier_bps: 10_000, // 1.0x
            max_multiplier_bps: 30_000, // 3.0x
        }
    }
}

impl StakePolicy {
    pub fn validate(&self) -> Result<()> {
        if self.min_lock_days == 0 || self.min_lock_days > self.max_lock_days {
            return Err(EmissionError::InvalidConfiguration(format!(
                "lock-day bounds {}..={} are invalid",
                self.min_lock_days, self.max_lock_days
            )));
        }
        if self.min_multiplier_bps == 0 || self.min_multiplier_bps > self.max_multiplier_bps {
            return Err(EmissionError::InvalidConfiguration(format!(
                "multiplier bounds {}..={} bps are invalid",
                self.min_multiplier_bps, self.max_multiplier_bps
            )));
        }
        if self.max_multiplier_bps > MAX_MULTIPLIER_BPS {
            return Err(EmissionError::InvalidConfiguration(format!(
                "max multiplier {} bps exceeds ceiling of {}",
                self.max_multiplier_bps, MAX_MULTIPLIER_BPS
            )));
        }
        Ok(())
    }

    /// Weight multiplier for a lock duration, in basis points. Fails for
    /// durations outside the permitted range.
    pub fn weight_bps(&self, lock_days: u32) -> Result<u64> {
        if lock_days < self.min_lock_days || lock_days > self.max_lock_days {
            return Err(EmissionError::LockOutOfRange {
                days: lock_days,
                min: self.min_lock_days,
                max: self.max_lock_days,
            });
        }

        let span_days = (self.max_lock_days - self.min_lock_days) as u64;
        if span_days == 0 {
            return Ok(self.min_multiplier_bps);
        }

        let progress = (lock_days - self.min_lock_days) as u64;
        let span_bps = self.max_multiplier_bps - self.min_multiplier_bps;
        Ok(self.min_multiplier_bps + span_bps * progress / span_days)
    }
}

/// A staking/metrics weight pair. Must sum to exactly `BASIS_POINTS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeightPair {
    pub staking_bps: u64,
    pub metrics_bps: u64,
}

impl Default for WeightPair {
    fn default() -> Self {
        Self {
            staking_bps: 6_000,
            metrics_bps: 4_000,
        }
    }
}

impl WeightPair {
    pub fn new(staking_bps: u64, metrics_bps: u64) -> Result<Self> {
        let pair = Self {
            staking_bps,
            metrics_bps,
        };
        pair.validate()?;
        Ok(pair)
    }

    pub fn validate(&self) -> Result<()> {
        // Saturating so a wrapping pair cannot masquerade as unity
        let sum = self.staking_bps.saturating_add(self.metrics_bps);
        if sum != BASIS_POINTS {
            return Err(EmissionError::WeightsNotUnity {
                expected: BASIS_POINTS,
                got: sum,
            });
        }
        Ok(())
    }
}

/// How each project's emission is cut up: treasury first, then the
/// remainder between the staking pool and the ownership-unit pool.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SplitPolicy {
    pub treasury_bps: u64,
    pub staking_pool_bps: u64,
    pub units_pool_bps: u64,
}

impl Default for SplitPolicy {
    fn default() -> Self {
        Self {
            treasury_bps: 500,      // 5%
            staking_pool_bps: 7_000, // 70% of the remainder
            units_pool_bps: 3_000,   // 30% of the remainder
        }
    }
}

impl SplitPolicy {
    pub fn validate(&self) -> Result<()> {
        if self.treasury_bps > BASIS_POINTS {
            return Err(EmissionError::InvalidConfiguration(format!(
                "treasury share {} bps exceeds {}",
                self.treasury_bps, BASIS_POINTS
            )));
        }
        let pool_sum = self.staking_pool_bps.saturating_add(self.units_pool_bps);
        if pool_sum != BASIS_POINTS {
            return Err(EmissionError::WeightsNotUnity {
                expected: BASIS_POINTS,
                got: pool_sum,
            });
        }
        Ok(())
    }
}

/// Emission sizing: each epoch mints between `base_emission` and
/// `max_emission`, scaled by the global impact score normalized against
/// `impact_reference` (scores at or above the reference saturate at max).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct EmissionPolicy {
    pub base_emission: LumenAmount,
    pub max_emission: LumenAmount,
    pub impact_reference: u64,
}

impl Default for EmissionPolicy {
    fn default() -> Self {
        Self {
            base_emission: LumenAmount::from_lumen(10_000.0),
            max_emission: LumenAmount::from_lumen(100_000.0),
            // Reference scale in score units (base units weighted by the
            // lock curve): roughly 10M LUMEN staked at 1x.
            impact_reference: 10_000_000 * lumen_economics::types::LUMEN_BASE_UNIT,
        }
    }
}

impl EmissionPolicy {
    pub fn validate(&self) -> Result<()> {
        if self.base_emission > self.max_emission {
            return Err(EmissionError::InvalidConfiguration(format!(
                "base emission {} exceeds max emission {}",
                self.base_emission, self.max_emission
            )));
        }
        if self.impact_reference == 0 {
            return Err(EmissionError::InvalidConfiguration(
                "impact reference must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct EpochPolicy {
    pub duration_secs: i64,
}

impl Default for EpochPolicy {
    fn default() -> Self {
        Self {
            duration_secs: 7 * SECONDS_PER_DAY,
        }
    }
}

impl EpochPolicy {
    pub fn validate(&self) -> Result<()> {
        if self.duration_secs < MIN_EPOCH_DURATION_SECS
            || self.duration_secs > MAX_EPOCH_DURATION_SECS
        {
            return Err(EmissionError::InvalidConfiguration(format!(
                "epoch duration {}s outside {}..={}s",
                self.duration_secs, MIN_EPOCH_DURATION_SECS, MAX_EPOCH_DURATION_SECS
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    pub stake: StakePolicy,
    pub weights: WeightPair,
    pub split: SplitPolicy,
    pub emission: EmissionPolicy,
    pub epoch: EpochPolicy,
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        self.stake.validate()?;
        self.weights.validate()?;
        self.split.validate()?;
        self.emission.validate()?;
        self.epoch.validate()?;
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StakeEvent {
    pub user: AccountAddress,
    pub project: ProjectId,
    pub amount: LumenAmount,
    pub lock_days: u32,
    pub unlock_time: i64,
    pub score: u128,
    pub position_index: usize,
    pub timestamp: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnstakeEvent {
    pub user: AccountAddress,
    pub project: ProjectId,
    pub position_index: usize,
    pub amount: LumenAmount,
    pub timestamp: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementEvent {
    pub epoch: u64,
    pub global_impact: u128,
    pub total_emission: LumenAmount,
    pub projects_settled: usize,
    pub timestamp: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimEvent {
    pub user: AccountAddress,
    pub project: ProjectId,
    pub epoch: u64,
    pub kind: ClaimKind,
    pub amount: LumenAmount,
    pub timestamp: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EngineEvent {
    Staked(StakeEvent),
    Unstaked(UnstakeEvent),
    EpochStarted {
        epoch: u64,
        start_time: i64,
        end_time: i64,
    },
    EpochSettled(SettlementEvent),
    Claimed(ClaimEvent),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weight_curve_is_monotonic() {
        let policy = StakePolicy::default();
        let mut previous = 0;
        for days in policy.min_lock_days..=policy.max_lock_days {
            let weight = policy.weight_bps(days).unwrap();
            assert!(weight >= previous, "curve decreased at {} days", days);
            previous = weight;
        }
    }

    #[test]
    fn weight_curve_endpoints() {
        let policy = StakePolicy::default();
        assert_eq!(
            policy.weight_bps(policy.min_lock_days).unwrap(),
            policy.min_multiplier_bps
        );
        assert_eq!(
            policy.weight_bps(policy.max_lock_days).unwrap(),
            policy.max_multiplier_bps
        );
    }

    #[test]
    fn weight_curve_rejects_out_of_range() {
        let policy = StakePolicy::default();
        assert!(matches!(
            policy.weight_bps(policy.min_lock_days - 1),
            Err(EmissionError::LockOutOfRange { .. })
        ));
        assert!(matches!(
            policy.weight_bps(policy.max_lock_days + 1),
            Err(EmissionError::LockOutOfRange { .. })
        ));
    }

    #[test]
    fn weight_pair_must_sum_to_unity() {
        assert!(WeightPair::new(4_000, 6_000).is_ok());
        assert!(matches!(
            WeightPair::new(4_000, 7_000),
            Err(EmissionError::WeightsNotUnity {
                expected: 10_000,
                got: 11_000
            })
        ));
    }

    #[test]
    fn weight_pair_rejects_wrapping_sum() {
        // u64::MAX + 10_001 wraps to exactly 10_000 in two's complement
        assert!(matches!(
            WeightPair::new(u64::MAX, 10_001),
            Err(EmissionError::WeightsNotUnity { .. })
        ));
        assert!(matches!(
            WeightPair::new(10_001, u64::MAX),
            Err(EmissionError::WeightsNotUnity { .. })
        ));
    }

    #[test]
    fn split_pools_must_sum_to_unity() {
        let bad = SplitPolicy {
            treasury_bps: 500,
            staking_pool_bps: 5_000,
            units_pool_bps: 4_000,
        };
        assert!(bad.validate().is_err());
        assert!(SplitPolicy::default().validate().is_ok());
    }

    #[test]
    fn split_pools_reject_wrapping_sum() {
        let wrapping = SplitPolicy {
            treasury_bps: 500,
            staking_pool_bps: u64::MAX,
            units_pool_bps: 10_001,
        };
        assert!(matches!(
            wrapping.validate(),
            Err(EmissionError::WeightsNotUnity { .. })
        ));
    }

    #[test]
    fn multiplier_ceiling_enforced() {
        let absurd = StakePolicy {
            max_multiplier_bps: MAX_MULTIPLIER_BPS + 1,
            ..StakePolicy::default()
        };
        assert!(absurd.validate().is_err());

        // The largest permitted config interpolates without overflow
        let extreme = StakePolicy {
            min_lock_days: 1,
            max_lock_days: u32::MAX,
            min_multiplier_bps: 1,
            max_multiplier_bps: MAX_MULTIPLIER_BPS,
        };
        extreme.validate().unwrap();
        assert_eq!(
            extreme.weight_bps(u32::MAX).unwrap(),
            MAX_MULTIPLIER_BPS
        );
    }

    #[test]
    fn epoch_duration_bounds() {
        assert!(EpochPolicy { duration_secs: 0 }.validate().is_err());
        assert!(EpochPolicy {
            duration_secs: 91 * SECONDS_PER_DAY
        }
        .validate()
        .is_err());
        assert!(EpochPolicy::default().validate().is_ok());
    }

    #[test]
    fn default_config_is_valid() {
        assert!(EngineConfig::default().validate().is_ok());
    }
}
