//! Ledger store - durable record of campaigns and contributions
//!
//! One writer lock over the whole ledger state, so every multi-key update
//! (contribution record + contributor ordering + campaign totals) commits
//! under a single guard: either all fields persist or none do. Higher-level
//! invariants are built on that guarantee. In-memory today; the interface is
//! shaped so a database-backed store can slot in behind the same methods.

use std::collections::{BTreeMap, HashMap};

use tokio::sync::RwLock;

use crate::{
    EngineResult,
    error::EngineError,
    models::{Campaign, CampaignId, CampaignStatus, ContributionRecord},
};

#[derive(Debug, Default)]
struct LedgerState {
    /// Next campaign id to hand out; ids are dense from 0 and never reused.
    next_id: u64,
    /// Campaigns keyed by id; BTreeMap keeps listings in creation order.
    campaigns: BTreeMap<u64, Campaign>,
    /// Cumulative contribution records keyed by (campaign, contributor).
    contributions: HashMap<(CampaignId, String), ContributionRecord>,
    /// Contributor identities per campaign, in first-contribution order.
    contributors: HashMap<CampaignId, Vec<String>>,
}

/// In-memory ledger of campaigns and per-contributor records
#[derive(Debug, Default)]
pub struct Ledger {
    state: RwLock<LedgerState>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the next campaign id. Monotonic; never reused.
    pub async fn next_campaign_id(&self) -> CampaignId {
        let mut state = self.state.write().await;
        let id = CampaignId(state.next_id);
        state.next_id += 1;
        id
    }

    /// Store a newly created campaign.
    pub async fn insert_campaign(&self, campaign: Campaign) {
        let mut state = self.state.write().await;
        state.campaigns.insert(campaign.id.0, campaign);
    }

    /// Fetch a campaign by id.
    pub async fn campaign(&self, id: CampaignId) -> Option<Campaign> {
        self.state.read().await.campaigns.get(&id.0).cloned()
    }

    /// Number of campaigns ever created.
    pub async fn campaign_count(&self) -> u64 {
        self.state.read().await.next_id
    }

    /// All campaigns in creation order.
    pub async fn campaigns(&self) -> Vec<Campaign> {
        self.state.read().await.campaigns.values().cloned().collect()
    }

    /// Cumulative record for one contributor, zero/false if none exists.
    pub async fn contribution(&self, id: CampaignId, contributor: &str) -> ContributionRecord {
        self.state
            .read()
            .await
            .contributions
            .get(&(id, contributor.to_owned()))
            .copied()
            .unwrap_or_default()
    }

    /// Contributor identities for a campaign, in first-contribution order.
    pub async fn contributors(&self, id: CampaignId) -> Vec<String> {
        self.state
            .read()
            .await
            .contributors
            .get(&id)
            .cloned()
            .unwrap_or_default()
    }

    /// Re-derive a campaign's status as of `now` and persist it if it flipped.
    ///
    /// Returns the (possibly updated) campaign and `Some(new_status)` exactly
    /// once per flip: the write guard serializes concurrent resolvers, so only
    /// the first one observes the transition.
    pub async fn resolve_status(
        &self,
        id: CampaignId,
        now: chrono::DateTime<chrono::Utc>,
    ) -> EngineResult<(Campaign, Option<CampaignStatus>)> {
        let mut state = self.state.write().await;
        let campaign = state
            .campaigns
            .get_mut(&id.0)
            .ok_or(EngineError::NotFound(id))?;

        let resolved = campaign.resolved_status(now);
        if resolved != campaign.status {
            campaign.status = resolved;
            Ok((campaign.clone(), Some(resolved)))
        } else {
            Ok((campaign.clone(), None))
        }
    }

    /// Record a contribution: bump the contributor's cumulative amount,
    /// register first-time contributors, and bump the campaign total, all
    /// under one write guard.
    ///
    /// Checked arithmetic runs before any field is touched, so a rejected
    /// contribution leaves the ledger exactly as it was.
    pub async fn apply_contribution(
        &self,
        id: CampaignId,
        contributor: &str,
        amount: u64,
    ) -> EngineResult<(Campaign, ContributionRecord)> {
        let mut guard = self.state.write().await;
        let state = &mut *guard;

        let campaign = state
            .campaigns
            .get_mut(&id.0)
            .ok_or(EngineError::NotFound(id))?;
        let new_total =
            campaign
                .total_funds
                .checked_add(amount)
                .ok_or(EngineError::AmountOverflow {
                    current: campaign.total_funds,
                    added: amount,
                })?;

        let key = (id, contributor.to_owned());
        let current = state.contributions.get(&key).copied().unwrap_or_default();
        let new_amount = current
            .amount
            .checked_add(amount)
            .ok_or(EngineError::AmountOverflow {
                current: current.amount,
                added: amount,
            })?;

        let record = ContributionRecord {
            amount: new_amount,
            refunded: current.refunded,
        };
        let first_time = !state.contributions.contains_key(&key);
        state.contributions.insert(key, record);
        if first_time {
            state
                .contributors
                .entry(id)
                .or_default()
                .push(contributor.to_owned());
        }
        campaign.total_funds = new_total;

        Ok((campaign.clone(), record))
    }

    /// Flag one contributor's record as refunded and decrement the campaign
    /// total by their cumulative amount, under one write guard.
    ///
    /// The recorded amount itself is kept for audit; only the flag flips.
    pub async fn apply_refund(
        &self,
        id: CampaignId,
        contributor: &str,
    ) -> EngineResult<(Campaign, u64)> {
        let mut guard = self.state.write().await;
        let state = &mut *guard;

        let campaign = state
            .campaigns
            .get_mut(&id.0)
            .ok_or(EngineError::NotFound(id))?;
        let key = (id, contributor.to_owned());
        let record = state
            .contributions
            .get_mut(&key)
            .ok_or_else(|| EngineError::NothingToRefund {
                campaign_id: id,
                contributor: contributor.to_owned(),
            })?;

        if record.amount == 0 {
            return Err(EngineError::NothingToRefund {
                campaign_id: id,
                contributor: contributor.to_owned(),
            });
        }
        if record.refunded {
            return Err(EngineError::AlreadyRefunded {
                campaign_id: id,
                contributor: contributor.to_owned(),
            });
        }

        let new_total = campaign
            .total_funds
            .checked_sub(record.amount)
            .ok_or_else(|| {
                EngineError::Internal(format!(
                    "refund of {} exceeds recorded total {} for campaign {id}",
                    record.amount, campaign.total_funds
                ))
            })?;

        record.refunded = true;
        campaign.total_funds = new_total;

        Ok((campaign.clone(), record.amount))
    }

    /// Mark a campaign's funds as released.
    pub async fn set_funds_released(&self, id: CampaignId) -> EngineResult<Campaign> {
        let mut state = self.state.write().await;
        let campaign = state
            .campaigns
            .get_mut(&id.0)
            .ok_or(EngineError::NotFound(id))?;
        campaign.funds_released = true;
        Ok(campaign.clone())
    }
}
