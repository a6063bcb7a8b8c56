use crate::balance::BalanceManager;
use crate::supply::TokenSupply;
use crate::types::{AccountAddress, LumenAmount, TransferEvent, TransferReason};
use anyhow::Result;
use std::sync::Arc;
use tracing::info;

/// The token-ledger surface the emission core consumes: mint under the
/// supply cap, and move balances between accounts. Both record a transfer
/// event for auditability.
pub struct TokenLedger {
    supply: Arc<TokenSupply>,
    balances: Arc<BalanceManager>,
}

impl TokenLedger {
    pub fn new(supply: Arc<TokenSupply>, balances: Arc<BalanceManager>) -> Self {
        Self { supply, balances }
    }

    pub fn supply(&self) -> &Arc<TokenSupply> {
        &self.supply
    }

    pub fn balances(&self) -> &Arc<BalanceManager> {
        &self.balances
    }

    /// Mint new tokens to a recipient. Fails if the mint would push total
    /// supply past the cap; the failure propagates with no state change.
    pub async fn mint_to(
        &self,
        recipient: AccountAddress,
        amount: LumenAmount,
        reason: TransferReason,
        timestamp: i64,
    ) -> Result<()> {
        if amount == LumenAmount::ZERO {
            return Ok(());
        }

        self.supply.mint(amount).await?;
        self.balances.credit(recipient, amount).await?;

        self.supply
            .add_transfer_event(TransferEvent {
                from: AccountAddress::from_bytes([0; 32]),
                to: recipient,
                amount,
                timestamp,
                reason,
            })
            .await;

        info!(
            recipient = %recipient,
            amount = amount.to_lumen(),
            reason = ?reason,
            "Minted to account"
        );
        Ok(())
    }

    pub async fn transfer(
        &self,
        from: AccountAddress,
        to: AccountAddress,
        amount: LumenAmount,
        reason: TransferReason,
        timestamp: i64,
    ) -> Result<()> {
        self.balances.transfer(from, to, amount).await?;

        self.supply
            .add_transfer_event(TransferEvent {
                from,
                to,
                amount,
                timestamp,
                reason,
            })
            .await;

        Ok(())
    }

    pub async fn balance_of(&self, address: AccountAddress) -> Result<LumenAmount> {
        self.balances.get_balance(address).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    fn ledger() -> TokenLedger {
        let storage = Arc::new(MemoryStorage::new());
        let supply = Arc::new(TokenSupply::new());
        let balances = Arc::new(BalanceManager::new(storage));
        TokenLedger::new(supply, balances)
    }

    #[tokio::test]
    async fn mint_credits_and_counts_supply() {
        let ledger = ledger();
        let user = AccountAddress::from_bytes([1; 32]);
        let amount = LumenAmount::from_lumen(500.0);

        ledger
            .mint_to(user, amount, TransferReason::Emission, 0)
            .await
            .unwrap();

        assert_eq!(ledger.balance_of(user).await.unwrap(), amount);
        assert_eq!(ledger.supply().total_supply().await, amount);
        assert_eq!(ledger.supply().get_transfer_history(10).await.len(), 1);
    }

    #[tokio::test]
    async fn mint_past_cap_fails() {
        let ledger = ledger();
        let user = AccountAddress::from_bytes([2; 32]);

        let remaining = ledger.supply().remaining_mintable().await;
        ledger
            .mint_to(user, remaining, TransferReason::Emission, 0)
            .await
            .unwrap();

        assert!(ledger
            .mint_to(
                user,
                LumenAmount::from_base_units(1),
                TransferReason::Emission,
                0
            )
            .await
            .is_err());
    }
}
