//! Campaign engine - the state machine that owns every invariant
//!
//! Coordinates the ledger, the escrow service and the event notifier.
//! Campaign status moves `Active -> Successful` or `Active -> Failed`
//! exactly once, derived lazily from wall-clock time on every access, and
//! all mutating operations on one campaign run under that campaign's mutex
//! so the "update ledger + move escrow funds" step can never interleave.
//! Operations on different campaigns proceed in parallel.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

use crate::{
    EngineResult,
    error::EngineError,
    escrow::EscrowService,
    ledger::Ledger,
    models::{Campaign, CampaignId, CampaignStatus, ContributionRecord},
    notifier::{CampaignEvent, EventNotifier},
};

/// Configuration for the campaign engine
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Maximum campaign title length in characters
    pub max_title_len: usize,
    /// Maximum campaign description length in characters
    pub max_description_len: usize,
    /// Maximum number of media references per campaign
    pub max_media_refs: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_title_len: 100,
            max_description_len: 1000,
            max_media_refs: 16,
        }
    }
}

/// Campaign creation request
#[derive(Debug, Clone)]
pub struct CreateCampaignRequest {
    pub creator: String,
    pub title: String,
    pub description: String,
    /// Funding goal in the smallest currency unit
    pub goal: u64,
    /// Campaign duration in seconds; the deadline is fixed at creation
    pub duration_secs: u64,
    /// Opaque content identifiers from the external content store
    pub media_refs: Vec<String>,
}

/// The campaign state machine
pub struct CampaignEngine {
    config: EngineConfig,
    ledger: Arc<Ledger>,
    escrow: Arc<EscrowService>,
    notifier: Arc<EventNotifier>,
    /// Per-campaign mutation locks. One mutex per campaign id gives every
    /// mutating operation a single global ordering per campaign while
    /// leaving unrelated campaigns fully parallel.
    campaign_locks: RwLock<HashMap<CampaignId, Arc<Mutex<()>>>>,
}

impl CampaignEngine {
    pub fn new(
        config: EngineConfig,
        ledger: Arc<Ledger>,
        escrow: Arc<EscrowService>,
        notifier: Arc<EventNotifier>,
    ) -> Self {
        Self {
            config,
            ledger,
            escrow,
            notifier,
            campaign_locks: RwLock::new(HashMap::new()),
        }
    }

    /// Create a new campaign with a dedicated zero-balance escrow account.
    ///
    /// This is the only place an escrow account is created; the pairing is
    /// 1:1 and permanent.
    pub async fn create_campaign(
        &self,
        request: CreateCampaignRequest,
    ) -> EngineResult<CampaignId> {
        self.validate_create_request(&request)?;
        let duration_secs = i64::try_from(request.duration_secs)
            .map_err(|_| EngineError::InvalidDuration)?;

        let id = self.ledger.next_campaign_id().await;
        let escrow_id = self.escrow.open_account().await;
        let campaign = Campaign::new(
            id,
            escrow_id,
            request.creator.clone(),
            request.title,
            request.description,
            request.goal,
            TimeDelta::seconds(duration_secs),
            request.media_refs,
            Utc::now(),
        );
        self.ledger.insert_campaign(campaign).await;

        info!(
            campaign = %id,
            creator = %request.creator,
            goal = request.goal,
            "campaign created"
        );
        self.notifier.publish(CampaignEvent::Created {
            campaign_id: id,
            creator: request.creator,
            goal: request.goal,
        });

        Ok(id)
    }

    /// Record a contribution and deposit it into the campaign's escrow.
    ///
    /// Returns the contributor's cumulative amount after this contribution.
    /// The ledger update and the escrow deposit happen under the campaign
    /// lock with all fallible checks up front, so a failure leaves both
    /// sides untouched.
    pub async fn contribute(
        &self,
        id: CampaignId,
        contributor: &str,
        amount: u64,
    ) -> EngineResult<u64> {
        if amount == 0 {
            return Err(EngineError::InvalidAmount);
        }

        let lock = self.campaign_lock(id).await;
        let _guard = lock.lock().await;

        let now = Utc::now();
        let campaign = self.resolve_and_notify(id, now).await?;
        if campaign.status != CampaignStatus::Active || now >= campaign.deadline {
            warn!(campaign = %id, contributor, "contribution after close rejected");
            return Err(EngineError::CampaignNotActive(id));
        }

        // All failure paths run before either store is touched.
        let record = self.ledger.contribution(id, contributor).await;
        record
            .amount
            .checked_add(amount)
            .ok_or(EngineError::AmountOverflow {
                current: record.amount,
                added: amount,
            })?;
        campaign
            .total_funds
            .checked_add(amount)
            .ok_or(EngineError::AmountOverflow {
                current: campaign.total_funds,
                added: amount,
            })?;
        self.escrow.balance(campaign.escrow_id).await?;

        let (campaign, record) = self
            .ledger
            .apply_contribution(id, contributor, amount)
            .await?;
        self.escrow.deposit(campaign.escrow_id, amount).await?;

        info!(
            campaign = %id,
            contributor,
            amount,
            total_funds = campaign.total_funds,
            "contribution recorded"
        );
        self.notifier.publish(CampaignEvent::Contributed {
            campaign_id: id,
            contributor: contributor.to_owned(),
            amount,
        });

        Ok(record.amount)
    }

    /// Pay the full escrow balance to the creator, exactly once.
    ///
    /// Returns the amount paid out. A retried call observes
    /// `AlreadyReleased`: the escrow zeroing and the `funds_released` flag
    /// commit within the same locked step.
    pub async fn release_funds(&self, id: CampaignId, caller: &str) -> EngineResult<u64> {
        let lock = self.campaign_lock(id).await;
        let _guard = lock.lock().await;

        let now = Utc::now();
        let campaign = self.resolve_and_notify(id, now).await?;
        if campaign.creator != caller {
            warn!(campaign = %id, caller, "release attempted by non-creator");
            return Err(EngineError::Unauthorized {
                campaign_id: id,
                caller: caller.to_owned(),
            });
        }
        if campaign.status != CampaignStatus::Successful {
            return Err(EngineError::CampaignNotSuccessful(id));
        }
        if campaign.funds_released {
            return Err(EngineError::AlreadyReleased(id));
        }

        let amount = self
            .escrow
            .release_all(campaign.escrow_id, &campaign.creator)
            .await?;
        self.ledger.set_funds_released(id).await?;

        info!(campaign = %id, amount, creator = %campaign.creator, "funds released");
        self.notifier.publish(CampaignEvent::FundsReleased {
            campaign_id: id,
            creator: campaign.creator,
            amount,
        });

        Ok(amount)
    }

    /// Return one contributor's cumulative amount after the campaign failed.
    ///
    /// Returns the refunded amount. Refunds are independent per contributor:
    /// this touches only the caller's record, the campaign total and the
    /// escrow balance.
    pub async fn refund(&self, id: CampaignId, contributor: &str) -> EngineResult<u64> {
        let lock = self.campaign_lock(id).await;
        let _guard = lock.lock().await;

        let now = Utc::now();
        let campaign = self.resolve_and_notify(id, now).await?;
        if campaign.status != CampaignStatus::Failed {
            return Err(EngineError::CampaignNotFailed(id));
        }

        let record = self.ledger.contribution(id, contributor).await;
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

        let amount = self
            .escrow
            .refund(campaign.escrow_id, contributor, record.amount)
            .await
            .map(|_| record.amount)?;
        self.ledger.apply_refund(id, contributor).await?;

        info!(campaign = %id, contributor, amount, "contribution refunded");
        self.notifier.publish(CampaignEvent::Refunded {
            campaign_id: id,
            contributor: contributor.to_owned(),
            amount,
        });

        Ok(amount)
    }

    /// Fetch a campaign with its status freshly resolved; readers never see
    /// a stale `Active` past the deadline.
    ///
    /// Resolution can persist a status flip, which is a mutation, so reads
    /// take the same per-campaign lock as the mutating operations.
    pub async fn campaign(&self, id: CampaignId) -> EngineResult<Campaign> {
        let lock = self.campaign_lock(id).await;
        let _guard = lock.lock().await;
        self.resolve_and_notify(id, Utc::now()).await
    }

    /// Contributor identities in first-contribution order.
    pub async fn contributors(&self, id: CampaignId) -> EngineResult<Vec<String>> {
        let lock = self.campaign_lock(id).await;
        let _guard = lock.lock().await;
        self.resolve_and_notify(id, Utc::now()).await?;
        Ok(self.ledger.contributors(id).await)
    }

    /// One contributor's cumulative record.
    pub async fn contribution(
        &self,
        id: CampaignId,
        contributor: &str,
    ) -> EngineResult<ContributionRecord> {
        let lock = self.campaign_lock(id).await;
        let _guard = lock.lock().await;
        self.resolve_and_notify(id, Utc::now()).await?;
        Ok(self.ledger.contribution(id, contributor).await)
    }

    /// Whether the contributor has already been refunded.
    pub async fn is_refunded(&self, id: CampaignId, contributor: &str) -> EngineResult<bool> {
        Ok(self.contribution(id, contributor).await?.refunded)
    }

    /// Apply the lazy status transition and fire `StatusChanged` on the one
    /// call that observes the flip.
    async fn resolve_and_notify(
        &self,
        id: CampaignId,
        now: DateTime<Utc>,
    ) -> EngineResult<Campaign> {
        let (campaign, flipped) = self.ledger.resolve_status(id, now).await?;
        if let Some(status) = flipped {
            info!(campaign = %id, ?status, total_funds = campaign.total_funds, "campaign resolved");
            self.notifier.publish(CampaignEvent::StatusChanged {
                campaign_id: id,
                status,
            });
        }
        Ok(campaign)
    }

    /// Fetch or create the mutation lock for one campaign.
    async fn campaign_lock(&self, id: CampaignId) -> Arc<Mutex<()>> {
        if let Some(lock) = self.campaign_locks.read().await.get(&id) {
            return lock.clone();
        }
        let mut locks = self.campaign_locks.write().await;
        locks.entry(id).or_default().clone()
    }

    fn validate_create_request(&self, request: &CreateCampaignRequest) -> EngineResult<()> {
        if request.goal == 0 {
            return Err(EngineError::InvalidGoal);
        }
        if request.duration_secs == 0 {
            return Err(EngineError::InvalidDuration);
        }
        if request.title.trim().is_empty() || request.title.chars().count() > self.config.max_title_len {
            return Err(EngineError::InvalidTitle {
                max: self.config.max_title_len,
            });
        }
        if request.description.trim().is_empty()
            || request.description.chars().count() > self.config.max_description_len
        {
            return Err(EngineError::InvalidDescription {
                max: self.config.max_description_len,
            });
        }
        if request.media_refs.len() > self.config.max_media_refs {
            return Err(EngineError::TooManyMediaRefs {
                given: request.media_refs.len(),
                max: self.config.max_media_refs,
            });
        }
        Ok(())
    }
}
