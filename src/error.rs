//! Error types for the campaign funding engine
//!
//! Three families of failures: validation errors (bad input, rejected before
//! any mutation), state errors (business-rule violations against the current
//! campaign state), and consistency errors (conditions that cannot occur
//! while the ledger/escrow invariants hold; fatal for the operation that
//! observes them).

use thiserror::Error;

use crate::models::{CampaignId, EscrowId};

/// Main error type for campaign and escrow operations
#[derive(Debug, Error)]
pub enum EngineError {
    /// Campaign goal must be a positive amount
    #[error("campaign goal must be greater than zero")]
    InvalidGoal,

    /// Campaign duration must be a positive number of seconds
    #[error("campaign duration must be greater than zero")]
    InvalidDuration,

    /// Contribution amount must be positive
    #[error("contribution amount must be greater than zero")]
    InvalidAmount,

    /// Campaign title is empty or exceeds the configured limit
    #[error("campaign title must be non-empty and at most {max} characters")]
    InvalidTitle { max: usize },

    /// Campaign description is empty or exceeds the configured limit
    #[error("campaign description must be non-empty and at most {max} characters")]
    InvalidDescription { max: usize },

    /// Too many media references supplied at creation
    #[error("{given} media references exceed the limit of {max}")]
    TooManyMediaRefs { given: usize, max: usize },

    /// Amount arithmetic would overflow the smallest-unit integer
    #[error("amount overflow: current {current}, added {added}")]
    AmountOverflow { current: u64, added: u64 },

    /// No campaign with the given id
    #[error("campaign {0} not found")]
    NotFound(CampaignId),

    /// Campaign is past its deadline or already resolved
    #[error("campaign {0} is not accepting contributions")]
    CampaignNotActive(CampaignId),

    /// Funds can only be released from a successful campaign
    #[error("campaign {0} is not successful; funds cannot be released")]
    CampaignNotSuccessful(CampaignId),

    /// Refunds are only available once a campaign has failed
    #[error("campaign {0} has not failed; refunds are not available")]
    CampaignNotFailed(CampaignId),

    /// Funds for this campaign were already paid out
    #[error("funds for campaign {0} were already released")]
    AlreadyReleased(CampaignId),

    /// This contributor already received their refund
    #[error("contributor {contributor} was already refunded for campaign {campaign_id}")]
    AlreadyRefunded {
        campaign_id: CampaignId,
        contributor: String,
    },

    /// This contributor has no recorded contribution to refund
    #[error("contributor {contributor} has nothing to refund for campaign {campaign_id}")]
    NothingToRefund {
        campaign_id: CampaignId,
        contributor: String,
    },

    /// Only the campaign creator may perform this operation
    #[error("caller {caller} is not the creator of campaign {campaign_id}")]
    Unauthorized {
        campaign_id: CampaignId,
        caller: String,
    },

    /// Escrow account holds no funds
    #[error("escrow account {0} holds no funds")]
    EmptyBalance(EscrowId),

    /// Escrow account cannot cover the requested payout
    #[error("escrow account {escrow_id} balance {balance} cannot cover payout of {requested}")]
    InsufficientEscrowBalance {
        escrow_id: EscrowId,
        balance: u64,
        requested: u64,
    },

    /// Campaign references an escrow account that does not exist
    #[error("escrow account {0} does not exist")]
    EscrowMissing(EscrowId),

    /// General internal errors
    #[error("internal error: {0}")]
    Internal(String),
}

impl EngineError {
    /// Input was malformed; the caller can retry with corrected input.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidGoal
                | Self::InvalidDuration
                | Self::InvalidAmount
                | Self::InvalidTitle { .. }
                | Self::InvalidDescription { .. }
                | Self::TooManyMediaRefs { .. }
                | Self::AmountOverflow { .. }
        )
    }

    /// The operation is not permitted in the campaign's current state.
    /// Surfaced to the caller verbatim; not a bug.
    pub fn is_state(&self) -> bool {
        matches!(
            self,
            Self::NotFound(_)
                | Self::CampaignNotActive(_)
                | Self::CampaignNotSuccessful(_)
                | Self::CampaignNotFailed(_)
                | Self::AlreadyReleased(_)
                | Self::AlreadyRefunded { .. }
                | Self::NothingToRefund { .. }
                | Self::Unauthorized { .. }
        )
    }

    /// The ledger/escrow invariants were violated. Fatal for the operation;
    /// logged for investigation rather than resolved by guessing.
    pub fn is_consistency(&self) -> bool {
        matches!(
            self,
            Self::EmptyBalance(_)
                | Self::InsufficientEscrowBalance { .. }
                | Self::EscrowMissing(_)
                | Self::Internal(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn taxonomy_is_a_partition() {
        let errors = [
            EngineError::InvalidGoal,
            EngineError::InvalidAmount,
            EngineError::AmountOverflow {
                current: u64::MAX,
                added: 1,
            },
            EngineError::NotFound(CampaignId(7)),
            EngineError::CampaignNotActive(CampaignId(7)),
            EngineError::AlreadyReleased(CampaignId(7)),
            EngineError::EmptyBalance(EscrowId::generate()),
            EngineError::Internal("broken".into()),
        ];

        for err in &errors {
            let classes = [err.is_validation(), err.is_state(), err.is_consistency()];
            assert_eq!(
                classes.iter().filter(|c| **c).count(),
                1,
                "{err} must belong to exactly one class"
            );
        }
    }

    #[test]
    fn messages_name_the_campaign() {
        let err = EngineError::NotFound(CampaignId(42));
        assert_eq!(err.to_string(), "campaign 42 not found");

        let err = EngineError::Unauthorized {
            campaign_id: CampaignId(3),
            caller: "mallory".into(),
        };
        assert!(err.to_string().contains("mallory"));
        assert!(err.to_string().contains('3'));
    }
}
