use serde::{Deserialize, Serialize};
use std::fmt;

pub const LUMEN_DECIMALS: u32 = 9;
pub const LUMEN_BASE_UNIT: u64 = 1_000_000_000; // 10^9

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LumenAmount(u64);

impl LumenAmount {
    pub const ZERO: Self = Self(0);
    pub const MAX_SUPPLY: Self = Self(500_000_000 * LUMEN_BASE_UNIT); // 5×10^8 LUMEN

    pub fn from_lumen(lumen: f64) -> Self {
        Self((lumen * LUMEN_BASE_UNIT as f64) as u64)
    }

    pub fn from_base_units(units: u64) -> Self {
        Self(units)
    }

    pub fn to_lumen(&self) -> f64 {
        self.0 as f64 / LUMEN_BASE_UNIT as f64
    }

    pub fn to_base_units(&self) -> u64 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(&self, other: Self) -> Option<Self> {
        self.0.checked_add(other.0).map(Self)
    }

    pub fn checked_sub(&self, other: Self) -> Option<Self> {
        self.0.checked_sub(other.0).map(Self)
    }

    pub fn saturating_add(&self, other: Self) -> Self {
        Self(self.0.saturating_add(other.0).min(Self::MAX_SUPPLY.0))
    }

    pub fn saturating_sub(&self, other: Self) -> Self {
        Self(self.0.saturating_sub(other.0))
    }
}

impl Default for LumenAmount {
    fn default() -> Self {
        Self::ZERO
    }
}

impl fmt::Display for LumenAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.9} LUMEN", self.to_lumen())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AccountAddress([u8; 32]);

impl AccountAddress {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Sink for every epoch's treasury cut.
    pub fn treasury() -> Self {
        Self([0xFF; 32])
    }

    /// Custody account for staked principal.
    pub fn stake_vault() -> Self {
        let mut bytes = [0xEE; 32];
        bytes[0] = 0x01;
        Self(bytes)
    }
}

impl fmt::Display for AccountAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(&self.0[..8]))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferEvent {
    pub from: AccountAddress,
    pub to: AccountAddress,
    pub amount: LumenAmount,
    pub timestamp: i64,
    pub reason: TransferReason,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferReason {
    Emission,
    StakeDeposit,
    StakeRefund,
    RewardClaim,
    TreasuryCut,
}
