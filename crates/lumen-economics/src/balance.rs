use crate::storage::EconomicsStorage;
use crate::types::{AccountAddress, LumenAmount};
use anyhow::{bail, Result};
use std::sync::Arc;
use tracing::info;

/// Storage-backed account balances. Transfers are transactional: either
/// both sides of the movement apply or neither does.
pub struct BalanceManager {
    storage: Arc<dyn EconomicsStorage>,
}

impl BalanceManager {
    pub fn new(storage: Arc<dyn EconomicsStorage>) -> Self {
        Self { storage }
    }

    pub async fn get_balance(&self, address: AccountAddress) -> Result<LumenAmount> {
        self.storage.get_balance(address).await
    }

    pub async fn credit(&self, address: AccountAddress, amount: LumenAmount) -> Result<()> {
        if amount == LumenAmount::ZERO {
            return Ok(());
        }

        let current = self.storage.get_balance(address).await?;
        let new_balance = current
            .checked_add(amount)
            .ok_or_else(|| anyhow::anyhow!("Balance overflow for {}", address))?;

        if new_balance > LumenAmount::MAX_SUPPLY {
            bail!("Balance would exceed max supply");
        }

        self.storage.set_balance(address, new_balance).await?;

        info!(
            address = %address,
            amount = amount.to_lumen(),
            balance_after = new_balance.to_lumen(),
            "Balance credited"
        );
        Ok(())
    }

    pub async fn debit(&self, address: AccountAddress, amount: LumenAmount) -> Result<()> {
        if amount == LumenAmount::ZERO {
            return Ok(());
        }

        let current = self.storage.get_balance(address).await?;
        let new_balance = current.checked_sub(amount).ok_or_else(|| {
            anyhow::anyhow!(
                "Insufficient balance for {}: has {}, needs {}",
                address,
                current,
                amount
            )
        })?;

        self.storage.set_balance(address, new_balance).await?;

        info!(
            address = %address,
            amount = amount.to_lumen(),
            balance_after = new_balance.to_lumen(),
            "Balance debited"
        );
        Ok(())
    }

    pub async fn transfer(
        &self,
        from: AccountAddress,
        to: AccountAddress,
        amount: LumenAmount,
    ) -> Result<()> {
        if amount == LumenAmount::ZERO {
            return Ok(());
        }

        if from == to {
            bail!("Cannot transfer to same address");
        }

        self.storage.begin_transaction().await?;

        match self.transfer_internal(from, to, amount).await {
            Ok(()) => {
                self.storage.commit_transaction().await?;
                info!(
                    from = %from,
                    to = %to,
                    amount = amount.to_lumen(),
                    "Transfer committed"
                );
                Ok(())
            }
            Err(e) => {
                self.storage.rollback_transaction().await?;
                info!(
                    from = %from,
                    to = %to,
                    amount = amount.to_lumen(),
                    error = %e,
                    "Transfer rolled back"
                );
                Err(e)
            }
        }
    }

    async fn transfer_internal(
        &self,
        from: AccountAddress,
        to: AccountAddress,
        amount: LumenAmount,
    ) -> Result<()> {
        let from_balance = self.storage.get_balance(from).await?;
        if from_balance < amount {
            bail!(
                "Insufficient balance: {} has {}, needs {}",
                from,
                from_balance,
                amount
            );
        }

        let to_balance = self.storage.get_balance(to).await?;
        let new_to_balance = to_balance
            .checked_add(amount)
            .ok_or_else(|| anyhow::anyhow!("Balance overflow for recipient"))?;

        self.storage
            .set_balance(from, from_balance.saturating_sub(amount))
            .await?;
        self.storage.set_balance(to, new_to_balance).await?;

        Ok(())
    }

    pub async fn get_all_accounts(&self) -> Result<Vec<AccountAddress>> {
        self.storage.get_all_accounts().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    fn manager() -> BalanceManager {
        BalanceManager::new(Arc::new(MemoryStorage::new()))
    }

    #[tokio::test]
    async fn credit_debit_transfer() {
        let balances = manager();
        let a = AccountAddress::from_bytes([1; 32]);
        let b = AccountAddress::from_bytes([2; 32]);

        balances.credit(a, LumenAmount::from_lumen(100.0)).await.unwrap();
        balances
            .transfer(a, b, LumenAmount::from_lumen(30.0))
            .await
            .unwrap();
        balances.debit(a, LumenAmount::from_lumen(20.0)).await.unwrap();

        assert_eq!(
            balances.get_balance(a).await.unwrap(),
            LumenAmount::from_lumen(50.0)
        );
        assert_eq!(
            balances.get_balance(b).await.unwrap(),
            LumenAmount::from_lumen(30.0)
        );
    }

    #[tokio::test]
    async fn insufficient_transfer_leaves_no_trace() {
        let balances = manager();
        let a = AccountAddress::from_bytes([3; 32]);
        let b = AccountAddress::from_bytes([4; 32]);

        balances.credit(a, LumenAmount::from_lumen(10.0)).await.unwrap();
        assert!(balances
            .transfer(a, b, LumenAmount::from_lumen(50.0))
            .await
            .is_err());

        assert_eq!(
            balances.get_balance(a).await.unwrap(),
            LumenAmount::from_lumen(10.0)
        );
        assert_eq!(balances.get_balance(b).await.unwrap(), LumenAmount::ZERO);
    }

    #[tokio::test]
    async fn self_transfer_rejected() {
        let balances = manager();
        let a = AccountAddress::from_bytes([5; 32]);
        balances.credit(a, LumenAmount::from_lumen(10.0)).await.unwrap();
        assert!(balances
            .transfer(a, a, LumenAmount::from_lumen(1.0))
            .await
            .is_err());
    }
}
