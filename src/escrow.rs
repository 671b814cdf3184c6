//! Escrow service - isolated fund custody, one account per campaign
//!
//! Each campaign gets its own escrow account at creation time, holding a
//! single balance that is separate from the ledger's bookkeeping. Money only
//! leaves an account through [`EscrowService::release_all`] or
//! [`EscrowService::refund`], both instructed by the campaign engine, and
//! every outgoing transfer is recorded as a [`Payout`] for audit.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{error, info};

use crate::{EngineResult, error::EngineError, models::EscrowId};

/// Why money left an escrow account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PayoutKind {
    /// Full balance paid to the campaign creator
    Release,
    /// One contributor's cumulative amount returned to them
    Refund,
}

/// A recorded outgoing transfer from an escrow account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payout {
    pub destination: String,
    pub amount: u64,
    pub kind: PayoutKind,
    pub paid_at: DateTime<Utc>,
}

/// One campaign's fund custody unit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscrowAccount {
    pub id: EscrowId,
    pub balance: u64,
    pub opened_at: DateTime<Utc>,
    pub payouts: Vec<Payout>,
}

impl EscrowAccount {
    fn new(id: EscrowId) -> Self {
        Self {
            id,
            balance: 0,
            opened_at: Utc::now(),
            payouts: Vec::new(),
        }
    }
}

/// Manages all escrow accounts, keyed by their id
#[derive(Debug, Default)]
pub struct EscrowService {
    accounts: RwLock<HashMap<EscrowId, EscrowAccount>>,
}

impl EscrowService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a fresh zero-balance account. Called once per campaign, at
    /// campaign creation; account ids are never reused.
    pub async fn open_account(&self) -> EscrowId {
        let id = EscrowId::generate();
        self.accounts
            .write()
            .await
            .insert(id, EscrowAccount::new(id));
        id
    }

    /// Deposit into an account. Never rejected for a positive amount while
    /// the engine invariants hold; overflow here means the ledger and escrow
    /// have diverged.
    pub async fn deposit(&self, id: EscrowId, amount: u64) -> EngineResult<u64> {
        let mut accounts = self.accounts.write().await;
        let account = accounts.get_mut(&id).ok_or(EngineError::EscrowMissing(id))?;
        let new_balance =
            account
                .balance
                .checked_add(amount)
                .ok_or(EngineError::AmountOverflow {
                    current: account.balance,
                    added: amount,
                })?;
        account.balance = new_balance;
        Ok(new_balance)
    }

    /// Pay out the full balance to `destination` and zero the account.
    ///
    /// Fails with `EmptyBalance` when there is nothing to pay, which makes a
    /// retried release a no-op at this layer.
    pub async fn release_all(&self, id: EscrowId, destination: &str) -> EngineResult<u64> {
        let mut accounts = self.accounts.write().await;
        let account = accounts.get_mut(&id).ok_or(EngineError::EscrowMissing(id))?;
        if account.balance == 0 {
            return Err(EngineError::EmptyBalance(id));
        }

        let amount = account.balance;
        account.balance = 0;
        account.payouts.push(Payout {
            destination: destination.to_owned(),
            amount,
            kind: PayoutKind::Release,
            paid_at: Utc::now(),
        });

        info!(escrow = %id, amount, destination, "released full escrow balance");
        Ok(amount)
    }

    /// Pay `amount` back to `destination`, decreasing the balance.
    ///
    /// A request exceeding the balance means the engine's accounting and this
    /// account have diverged; the operation refuses to proceed.
    pub async fn refund(
        &self,
        id: EscrowId,
        destination: &str,
        amount: u64,
    ) -> EngineResult<u64> {
        let mut accounts = self.accounts.write().await;
        let account = accounts.get_mut(&id).ok_or(EngineError::EscrowMissing(id))?;
        if amount > account.balance {
            error!(
                escrow = %id,
                balance = account.balance,
                requested = amount,
                "refund exceeds escrow balance"
            );
            return Err(EngineError::InsufficientEscrowBalance {
                escrow_id: id,
                balance: account.balance,
                requested: amount,
            });
        }

        account.balance -= amount;
        account.payouts.push(Payout {
            destination: destination.to_owned(),
            amount,
            kind: PayoutKind::Refund,
            paid_at: Utc::now(),
        });

        info!(escrow = %id, amount, destination, "refunded from escrow");
        Ok(account.balance)
    }

    /// Current balance of an account.
    pub async fn balance(&self, id: EscrowId) -> EngineResult<u64> {
        self.accounts
            .read()
            .await
            .get(&id)
            .map(|account| account.balance)
            .ok_or(EngineError::EscrowMissing(id))
    }

    /// Audit trail of outgoing transfers from an account.
    pub async fn payouts(&self, id: EscrowId) -> EngineResult<Vec<Payout>> {
        self.accounts
            .read()
            .await
            .get(&id)
            .map(|account| account.payouts.clone())
            .ok_or(EngineError::EscrowMissing(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn deposits_accumulate() {
        let escrow = EscrowService::new();
        let id = escrow.open_account().await;

        assert_eq!(escrow.deposit(id, 60).await.unwrap(), 60);
        assert_eq!(escrow.deposit(id, 50).await.unwrap(), 110);
        assert_eq!(escrow.balance(id).await.unwrap(), 110);
    }

    #[tokio::test]
    async fn release_all_pays_out_and_zeroes() {
        let escrow = EscrowService::new();
        let id = escrow.open_account().await;
        escrow.deposit(id, 110).await.unwrap();

        let paid = escrow.release_all(id, "alice").await.unwrap();
        assert_eq!(paid, 110);
        assert_eq!(escrow.balance(id).await.unwrap(), 0);

        let payouts = escrow.payouts(id).await.unwrap();
        assert_eq!(payouts.len(), 1);
        assert_eq!(payouts[0].destination, "alice");
        assert_eq!(payouts[0].kind, PayoutKind::Release);
    }

    #[tokio::test]
    async fn second_release_hits_empty_balance() {
        let escrow = EscrowService::new();
        let id = escrow.open_account().await;
        escrow.deposit(id, 40).await.unwrap();
        escrow.release_all(id, "alice").await.unwrap();

        let err = escrow.release_all(id, "alice").await.unwrap_err();
        assert!(matches!(err, EngineError::EmptyBalance(_)));
        assert_eq!(escrow.payouts(id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn refund_decrements_balance() {
        let escrow = EscrowService::new();
        let id = escrow.open_account().await;
        escrow.deposit(id, 65).await.unwrap();

        let remaining = escrow.refund(id, "bob", 40).await.unwrap();
        assert_eq!(remaining, 25);

        let payouts = escrow.payouts(id).await.unwrap();
        assert_eq!(payouts[0].kind, PayoutKind::Refund);
        assert_eq!(payouts[0].amount, 40);
    }

    #[tokio::test]
    async fn refund_over_balance_is_a_consistency_failure() {
        let escrow = EscrowService::new();
        let id = escrow.open_account().await;
        escrow.deposit(id, 30).await.unwrap();

        let err = escrow.refund(id, "bob", 31).await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::InsufficientEscrowBalance {
                balance: 30,
                requested: 31,
                ..
            }
        ));
        assert!(err.is_consistency());
        assert_eq!(escrow.balance(id).await.unwrap(), 30);
    }

    #[tokio::test]
    async fn unknown_account_is_rejected() {
        let escrow = EscrowService::new();
        let ghost = EscrowId::generate();
        assert!(matches!(
            escrow.deposit(ghost, 10).await.unwrap_err(),
            EngineError::EscrowMissing(_)
        ));
        assert!(matches!(
            escrow.balance(ghost).await.unwrap_err(),
            EngineError::EscrowMissing(_)
        ));
    }

    #[tokio::test]
    async fn deposit_overflow_is_rejected() {
        let escrow = EscrowService::new();
        let id = escrow.open_account().await;
        escrow.deposit(id, u64::MAX).await.unwrap();

        let err = escrow.deposit(id, 1).await.unwrap_err();
        assert!(matches!(err, EngineError::AmountOverflow { .. }));
        assert_eq!(escrow.balance(id).await.unwrap(), u64::MAX);
    }
}
