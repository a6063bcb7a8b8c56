pub mod balance;
pub mod ledger;
pub mod storage;
pub mod supply;
pub mod types;

pub use balance::BalanceManager;
pub use ledger::TokenLedger;
pub use storage::{EconomicsStorage, MemoryStorage};
pub use supply::{SupplyMetrics, TokenSupply};
pub use types::{AccountAddress, LumenAmount, TransferEvent, TransferReason};

use std::sync::Arc;

/// Build a fully wired in-memory token ledger.
pub fn memory_ledger() -> Arc<TokenLedger> {
    let storage = Arc::new(MemoryStorage::new());
    let supply = Arc::new(TokenSupply::new());
    let balances = Arc::new(BalanceManager::new(storage));
    Arc::new(TokenLedger::new(supply, balances))
}
