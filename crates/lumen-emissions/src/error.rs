use thiserror::Error;

#[derive(Error, Debug)]
pub enum EmissionError {
    // Validation
    #[error("Stake amount must be greater than zero")]
    ZeroAmount,

    #[error("Lock duration {days} days outside permitted range {min}..={max}")]
    LockOutOfRange { days: u32, min: u32, max: u32 },

    #[error("Stake ceiling exceeded: project cap {ceiling}, would reach {requested}")]
    StakeCeilingExceeded { ceiling: String, requested: String },

    #[error("Weights must sum to exactly {expected} basis points, got {got}")]
    WeightsNotUnity { expected: u64, got: u64 },

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Unknown project: {0}")]
    UnknownProject(u64),

    #[error("Project {0} is disabled")]
    ProjectDisabled(u64),

    #[error("Unknown epoch: {0}")]
    UnknownEpoch(u64),

    #[error("Stake position {index} not found")]
    PositionNotFound { index: usize },

    // State conflicts
    #[error("Epoch already active")]
    EpochAlreadyActive,

    #[error("No active epoch")]
    NoActiveEpoch,

    #[error("Epoch not finished yet: ends at {end_time}, now {now}")]
    EpochNotFinished { end_time: i64, now: i64 },

    #[error("Epoch {0} is not settled")]
    EpochNotSettled(u64),

    #[error("Position still locked until {unlock_time}, now {now}")]
    StillLocked { unlock_time: i64, now: i64 },

    #[error("Stake position {index} already unstaked")]
    PositionInactive { index: usize },

    #[error("Already claimed")]
    AlreadyClaimed,

    #[error("No rewards to claim")]
    NothingToClaim,

    #[error("Project {0} already registered")]
    ProjectAlreadyRegistered(u64),

    // Authorization
    #[error("Caller is not the engine authority")]
    Unauthorized,

    // Collaborator failures
    #[error("Token ledger error: {0}")]
    Ledger(String),

    #[error("Ownership source error: {0}")]
    Ownership(String),
}

pub type Result<T> = std::result::Result<T, EmissionError>;
