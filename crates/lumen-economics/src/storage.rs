use crate::types::{AccountAddress, LumenAmount};
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

type BalanceMap = HashMap<AccountAddress, LumenAmount>;

/// Storage seam for the token ledger. Hosts that persist balances supply
/// their own implementation; the engine only ships the in-memory one.
///
/// The begin/commit/rollback triple gives transfers all-or-nothing
/// semantics: a failed transfer must leave no trace.
#[async_trait]
pub trait EconomicsStorage: Send + Sync {
    async fn get_balance(&self, address: AccountAddress) -> Result<LumenAmount>;
    async fn set_balance(&self, address: AccountAddress, balance: LumenAmount) -> Result<()>;
    async fn get_all_accounts(&self) -> Result<Vec<AccountAddress>>;

    async fn begin_transaction(&self) -> Result<()>;
    async fn commit_transaction(&self) -> Result<()>;
    async fn rollback_transaction(&self) -> Result<()>;
}

pub struct MemoryStorage {
    balances: Arc<RwLock<BalanceMap>>,
    transaction_backup: Arc<RwLock<Option<BalanceMap>>>,
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self {
            balances: Arc::new(RwLock::new(HashMap::new())),
            transaction_backup: Arc::new(RwLock::new(None)),
        }
    }
}

#[async_trait]
impl EconomicsStorage for MemoryStorage {
    async fn get_balance(&self, address: AccountAddress) -> Result<LumenAmount> {
        let balances = self.balances.read().await;
        Ok(balances.get(&address).copied().unwrap_or(LumenAmount::ZERO))
    }

    async fn set_balance(&self, address: AccountAddress, balance: LumenAmount) -> Result<()> {
        let mut balances = self.balances.write().await;
        if balance == LumenAmount::ZERO {
            balances.remove(&address);
        } else {
            balances.insert(address, balance);
        }
        Ok(())
    }

    async fn get_all_accounts(&self) -> Result<Vec<AccountAddress>> {
        let balances = self.balances.read().await;
        Ok(balances.keys().copied().collect())
    }

    async fn begin_transaction(&self) -> Result<()> {
        let balances = self.balances.read().await;
        let mut backup = self.transaction_backup.write().await;
        *backup = Some(balances.clone());
        Ok(())
    }

    async fn commit_transaction(&self) -> Result<()> {
        let mut backup = self.transaction_backup.write().await;
        *backup = None;
        Ok(())
    }

    async fn rollback_transaction(&self) -> Result<()> {
        let mut backup = self.transaction_backup.write().await;
        if let Some(snapshot) = backup.take() {
            let mut balances = self.balances.write().await;
            let restored = snapshot.len();
            *balances = snapshot;
            info!(
                accounts_restored = restored,
                storage_type = "memory",
                "Transaction rolled back"
            );
        }
        Ok(())
    }
}
