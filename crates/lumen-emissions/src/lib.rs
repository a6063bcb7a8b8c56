pub mod claims;
pub mod clock;
pub mod engine;
pub mod epoch;
pub mod error;
pub mod impact;
pub mod ownership;
pub mod registry;
pub mod staking;
pub mod types;

pub use claims::{ClaimLedger, ClaimRecord};
pub use clock::{Clock, ManualClock, SystemClock};
pub use engine::{EmissionEngine, UnclaimedReward};
pub use epoch::{Epoch, EpochController, ProjectEpochEmission};
pub use error::{EmissionError, Result};
pub use impact::{emission_for_impact, impact_score};
pub use ownership::{MemoryOwnership, OwnershipWeightSource};
pub use registry::{ProjectAccount, ProjectRegistry};
pub use staking::{StakeLedger, StakePosition};
pub use types::{
    ClaimKind, EmissionPolicy, EngineConfig, EngineEvent, EpochPolicy, ProjectId, SplitPolicy,
    StakePolicy, WeightPair,
};
