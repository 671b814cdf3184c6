//! Crowdfund node - high-level API over the whole engine
//!
//! Wires the ledger, escrow service, event notifier and campaign engine
//! together behind one surface: the five mutating operations, the read
//! operations, the page projections and event subscription. This is the
//! boundary the UI layer calls; identity strings arrive already
//! authenticated from the wallet layer and are trusted as given.

use std::sync::Arc;

use crate::{
    EngineResult,
    engine::{CampaignEngine, CreateCampaignRequest, EngineConfig},
    escrow::{EscrowService, Payout},
    ledger::Ledger,
    models::{Campaign, CampaignId, ContributionRecord},
    notifier::{CampaignEvent, DEFAULT_EVENT_CAPACITY, EventNotifier},
    views::{CampaignView, ContributorView},
};
use tokio::sync::broadcast;
use tracing::info;

/// Configuration for the crowdfund node
#[derive(Debug, Clone)]
pub struct CrowdfundNodeConfig {
    /// Campaign engine configuration
    pub engine: EngineConfig,
    /// Broadcast capacity for event subscribers
    pub event_capacity: usize,
    /// Base URL media references are served from, joined as
    /// `<gateway>/<content_id>`
    pub media_gateway: String,
}

impl Default for CrowdfundNodeConfig {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            event_capacity: DEFAULT_EVENT_CAPACITY,
            media_gateway: "https://gateway.pinata.cloud/ipfs".to_string(),
        }
    }
}

/// Main node that coordinates all components
pub struct CrowdfundNode {
    engine: CampaignEngine,
    ledger: Arc<Ledger>,
    escrow: Arc<EscrowService>,
    notifier: Arc<EventNotifier>,
    media_gateway: String,
}

impl CrowdfundNode {
    /// Create a node with all components initialized and empty state.
    pub fn new(config: CrowdfundNodeConfig) -> Self {
        let ledger = Arc::new(Ledger::new());
        let escrow = Arc::new(EscrowService::new());
        let notifier = Arc::new(EventNotifier::new(config.event_capacity));
        let engine = CampaignEngine::new(
            config.engine,
            ledger.clone(),
            escrow.clone(),
            notifier.clone(),
        );

        info!("crowdfund node initialized");
        Self {
            engine,
            ledger,
            escrow,
            notifier,
            media_gateway: config.media_gateway,
        }
    }

    /// Create a campaign; returns its id.
    pub async fn create_campaign(
        &self,
        request: CreateCampaignRequest,
    ) -> EngineResult<CampaignId> {
        self.engine.create_campaign(request).await
    }

    /// Contribute to an active campaign; returns the contributor's
    /// cumulative amount.
    pub async fn contribute(
        &self,
        id: CampaignId,
        contributor: &str,
        amount: u64,
    ) -> EngineResult<u64> {
        self.engine.contribute(id, contributor, amount).await
    }

    /// Release a successful campaign's escrow to its creator; returns the
    /// amount paid out.
    pub async fn release_funds(&self, id: CampaignId, caller: &str) -> EngineResult<u64> {
        self.engine.release_funds(id, caller).await
    }

    /// Refund one contributor of a failed campaign; returns the amount
    /// returned.
    pub async fn refund(&self, id: CampaignId, contributor: &str) -> EngineResult<u64> {
        self.engine.refund(id, contributor).await
    }

    /// Campaign with freshly resolved status.
    pub async fn campaign(&self, id: CampaignId) -> EngineResult<Campaign> {
        self.engine.campaign(id).await
    }

    /// Contributor identities in first-contribution order.
    pub async fn contributors(&self, id: CampaignId) -> EngineResult<Vec<String>> {
        self.engine.contributors(id).await
    }

    /// One contributor's cumulative record.
    pub async fn contribution(
        &self,
        id: CampaignId,
        contributor: &str,
    ) -> EngineResult<ContributionRecord> {
        self.engine.contribution(id, contributor).await
    }

    /// Whether a contributor has already been refunded.
    pub async fn is_refunded(&self, id: CampaignId, contributor: &str) -> EngineResult<bool> {
        self.engine.is_refunded(id, contributor).await
    }

    /// Number of campaigns ever created. Listing UIs page through
    /// `0..campaign_count()`.
    pub async fn campaign_count(&self) -> u64 {
        self.ledger.campaign_count().await
    }

    /// Subscribe to state-change notifications. Best-effort delivery;
    /// reconcile through the reads above.
    pub fn subscribe(&self) -> broadcast::Receiver<CampaignEvent> {
        self.notifier.subscribe()
    }

    /// Full page projection for one campaign.
    pub async fn campaign_view(&self, id: CampaignId) -> EngineResult<CampaignView> {
        let campaign = self.engine.campaign(id).await?;
        let escrow_balance = self.escrow.balance(campaign.escrow_id).await?;
        Ok(CampaignView::from_parts(
            campaign,
            escrow_balance,
            &self.media_gateway,
        ))
    }

    /// Contributor roster with amounts and refund flags.
    pub async fn contributor_views(&self, id: CampaignId) -> EngineResult<Vec<ContributorView>> {
        self.engine.campaign(id).await?;
        let mut views = Vec::new();
        for contributor in self.ledger.contributors(id).await {
            let record = self.ledger.contribution(id, &contributor).await;
            views.push(ContributorView {
                contributor,
                amount: record.amount,
                refunded: record.refunded,
            });
        }
        Ok(views)
    }

    /// Projections for every campaign, in creation order.
    pub async fn list_campaigns(&self) -> EngineResult<Vec<CampaignView>> {
        let mut views = Vec::new();
        for campaign in self.ledger.campaigns().await {
            views.push(self.campaign_view(campaign.id).await?);
        }
        Ok(views)
    }

    /// Audit trail of payouts from one campaign's escrow account.
    pub async fn escrow_payouts(&self, id: CampaignId) -> EngineResult<Vec<Payout>> {
        let campaign = self.engine.campaign(id).await?;
        self.escrow.payouts(campaign.escrow_id).await
    }
}

impl Default for CrowdfundNode {
    fn default() -> Self {
        Self::new(CrowdfundNodeConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use crate::models::CampaignStatus;
    use std::time::Duration;

    fn request(goal: u64, duration_secs: u64) -> CreateCampaignRequest {
        CreateCampaignRequest {
            creator: "alice".into(),
            title: "Short film".into(),
            description: "A ten minute documentary about the harbor".into(),
            goal,
            duration_secs,
            media_refs: vec!["QmPosterHash".into(), "QmTrailerHash".into()],
        }
    }

    #[tokio::test]
    async fn successful_campaign_lifecycle() {
        let node = CrowdfundNode::default();
        let id = node.create_campaign(request(100, 1)).await.unwrap();

        node.contribute(id, "bob", 60).await.unwrap();
        node.contribute(id, "carol", 50).await.unwrap();

        tokio::time::sleep(Duration::from_millis(1200)).await;

        let campaign = node.campaign(id).await.unwrap();
        assert_eq!(campaign.status, CampaignStatus::Successful);
        assert_eq!(campaign.total_funds, 110);

        let paid = node.release_funds(id, "alice").await.unwrap();
        assert_eq!(paid, 110);

        let view = node.campaign_view(id).await.unwrap();
        assert!(view.funds_released);
        assert_eq!(view.escrow_balance, 0);
        assert_eq!(view.total_funds, 110, "release does not rewrite the ledger total");

        let err = node.release_funds(id, "alice").await.unwrap_err();
        assert!(matches!(err, EngineError::AlreadyReleased(_)));
        assert_eq!(node.campaign_view(id).await.unwrap().escrow_balance, 0);

        let payouts = node.escrow_payouts(id).await.unwrap();
        assert_eq!(payouts.len(), 1);
        assert_eq!(payouts[0].amount, 110);
        assert_eq!(payouts[0].destination, "alice");
    }

    #[tokio::test]
    async fn failed_campaign_refund_lifecycle() {
        let node = CrowdfundNode::default();
        let id = node.create_campaign(request(100, 1)).await.unwrap();

        node.contribute(id, "bob", 40).await.unwrap();

        tokio::time::sleep(Duration::from_millis(1200)).await;

        let campaign = node.campaign(id).await.unwrap();
        assert_eq!(campaign.status, CampaignStatus::Failed);

        let refunded = node.refund(id, "bob").await.unwrap();
        assert_eq!(refunded, 40);
        assert!(node.is_refunded(id, "bob").await.unwrap());
        assert_eq!(node.campaign(id).await.unwrap().total_funds, 0);
        assert_eq!(node.campaign_view(id).await.unwrap().escrow_balance, 0);

        let err = node.refund(id, "bob").await.unwrap_err();
        assert!(matches!(err, EngineError::AlreadyRefunded { .. }));
        assert_eq!(
            node.contribution(id, "bob").await.unwrap().amount,
            40,
            "refund keeps the recorded amount"
        );

        // release is never available on a failed campaign
        let err = node.release_funds(id, "alice").await.unwrap_err();
        assert!(matches!(err, EngineError::CampaignNotSuccessful(_)));
    }

    #[tokio::test]
    async fn refunds_are_independent_per_contributor() {
        let node = CrowdfundNode::default();
        let id = node.create_campaign(request(1000, 1)).await.unwrap();

        node.contribute(id, "bob", 40).await.unwrap();
        node.contribute(id, "carol", 30).await.unwrap();

        tokio::time::sleep(Duration::from_millis(1200)).await;

        node.refund(id, "bob").await.unwrap();

        // carol's eligibility and balance are untouched by bob's refund
        assert!(!node.is_refunded(id, "carol").await.unwrap());
        assert_eq!(node.contribution(id, "carol").await.unwrap().amount, 30);
        assert_eq!(node.campaign(id).await.unwrap().total_funds, 30);

        let refunded = node.refund(id, "carol").await.unwrap();
        assert_eq!(refunded, 30);
        assert_eq!(node.campaign(id).await.unwrap().total_funds, 0);
    }

    #[tokio::test]
    async fn basic_error_cases() {
        let node = CrowdfundNode::default();
        let id = node.create_campaign(request(100, 3600)).await.unwrap();

        assert!(matches!(
            node.contribute(id, "bob", 0).await.unwrap_err(),
            EngineError::InvalidAmount
        ));
        assert!(matches!(
            node.contribute(CampaignId(404), "bob", 5).await.unwrap_err(),
            EngineError::NotFound(_)
        ));
        assert!(matches!(
            node.refund(id, "bob").await.unwrap_err(),
            EngineError::CampaignNotFailed(_)
        ));
        assert!(matches!(
            node.campaign(CampaignId(404)).await.unwrap_err(),
            EngineError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn events_reach_subscribers() {
        let node = CrowdfundNode::default();
        let mut rx = node.subscribe();

        let id = node.create_campaign(request(100, 1)).await.unwrap();
        node.contribute(id, "bob", 100).await.unwrap();

        assert!(matches!(
            rx.recv().await.unwrap(),
            CampaignEvent::Created { campaign_id, .. } if campaign_id == id
        ));
        assert!(matches!(
            rx.recv().await.unwrap(),
            CampaignEvent::Contributed { amount: 100, .. }
        ));

        tokio::time::sleep(Duration::from_millis(1200)).await;

        // the first read past the deadline flips the status and notifies once
        node.campaign(id).await.unwrap();
        node.campaign(id).await.unwrap();
        assert!(matches!(
            rx.recv().await.unwrap(),
            CampaignEvent::StatusChanged {
                status: CampaignStatus::Successful,
                ..
            }
        ));

        node.release_funds(id, "alice").await.unwrap();
        assert!(matches!(
            rx.recv().await.unwrap(),
            CampaignEvent::FundsReleased { amount: 100, .. }
        ));
    }

    #[tokio::test]
    async fn views_expose_media_and_roster() {
        let node = CrowdfundNode::default();
        let id = node.create_campaign(request(100, 3600)).await.unwrap();
        node.contribute(id, "bob", 25).await.unwrap();
        node.contribute(id, "carol", 10).await.unwrap();

        let view = node.campaign_view(id).await.unwrap();
        assert_eq!(
            view.media_urls,
            vec![
                "https://gateway.pinata.cloud/ipfs/QmPosterHash".to_string(),
                "https://gateway.pinata.cloud/ipfs/QmTrailerHash".to_string(),
            ]
        );
        assert_eq!(view.escrow_balance, 35);

        let roster = node.contributor_views(id).await.unwrap();
        assert_eq!(roster.len(), 2);
        assert_eq!(roster[0].contributor, "bob");
        assert_eq!(roster[0].amount, 25);
        assert!(!roster[0].refunded);
        assert_eq!(roster[1].contributor, "carol");

        assert_eq!(node.campaign_count().await, 1);
        assert_eq!(node.list_campaigns().await.unwrap().len(), 1);
    }
}
