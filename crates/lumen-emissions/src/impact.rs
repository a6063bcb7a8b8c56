use crate::types::{EmissionPolicy, WeightPair, BASIS_POINTS};
use lumen_economics::LumenAmount;

/// Weighted combination of a staking score and a metrics score. Pure; the
/// same formula serves both global and per-project granularity.
pub fn impact_score(staking_score: u128, metrics_score: u128, weights: &WeightPair) -> u128 {
    let staking_part = staking_score.saturating_mul(weights.staking_bps as u128);
    let metrics_part = metrics_score.saturating_mul(weights.metrics_bps as u128);
    (staking_part.saturating_add(metrics_part)) / BASIS_POINTS as u128
}

/// Sizes an epoch's total emission from the global impact score:
/// `base + (max - base) * min(impact, reference) / reference`.
/// Monotonic in `impact` and saturating at `max`.
pub fn emission_for_impact(impact: u128, policy: &EmissionPolicy) -> LumenAmount {
    let base = policy.base_emission.to_base_units() as u128;
    let max = policy.max_emission.to_base_units() as u128;
    let span = max - base;
    let reference = policy.impact_reference as u128;

    let capped = impact.min(reference);
    // span < 2^64 and capped < 2^64, so the product fits u128
    let extra = span * capped / reference;

    LumenAmount::from_base_units((base + extra) as u64)
}

/// A project's proportional share of the epoch emission.
pub fn proportional_share(
    total_emission: LumenAmount,
    project_impact: u128,
    impact_sum: u128,
) -> LumenAmount {
    if impact_sum == 0 || project_impact == 0 {
        return LumenAmount::ZERO;
    }
    let total = total_emission.to_base_units() as u128;
    let share = total * project_impact.min(impact_sum) / impact_sum;
    LumenAmount::from_base_units(share as u64)
}
