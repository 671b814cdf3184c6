//! Read-only projections served to the UI layer
//!
//! These types flatten the engine's state into what a campaign page renders:
//! the campaign with its freshly resolved status, the live escrow balance,
//! media gateway URLs, and the contributor roster with per-contributor
//! amounts and refund flags.

use serde::Serialize;

use crate::models::{Campaign, CampaignId, CampaignStatus, EscrowId};

/// Full campaign detail for a single page view
#[derive(Debug, Clone, Serialize)]
pub struct CampaignView {
    pub id: CampaignId,
    pub creator: String,
    pub title: String,
    pub description: String,
    pub goal: u64,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub deadline: chrono::DateTime<chrono::Utc>,
    pub total_funds: u64,
    pub status: CampaignStatus,
    pub funds_released: bool,
    /// Opaque content identifiers, exactly as supplied at creation
    pub media_refs: Vec<String>,
    /// Retrieval URLs for each media reference at the configured gateway
    pub media_urls: Vec<String>,
    pub escrow_id: EscrowId,
    pub escrow_balance: u64,
}

impl CampaignView {
    pub(crate) fn from_parts(campaign: Campaign, escrow_balance: u64, gateway: &str) -> Self {
        let media_urls = campaign
            .media_refs
            .iter()
            .map(|content_id| media_url(gateway, content_id))
            .collect();
        Self {
            id: campaign.id,
            creator: campaign.creator,
            title: campaign.title,
            description: campaign.description,
            goal: campaign.goal,
            created_at: campaign.created_at,
            deadline: campaign.deadline,
            total_funds: campaign.total_funds,
            status: campaign.status,
            funds_released: campaign.funds_released,
            media_refs: campaign.media_refs,
            media_urls,
            escrow_id: campaign.escrow_id,
            escrow_balance,
        }
    }
}

/// One row of the contributor roster
#[derive(Debug, Clone, Serialize)]
pub struct ContributorView {
    pub contributor: String,
    pub amount: u64,
    pub refunded: bool,
}

/// Build the retrieval URL for a content identifier: `<gateway>/<content_id>`.
pub fn media_url(gateway: &str, content_id: &str) -> String {
    format!("{}/{}", gateway.trim_end_matches('/'), content_id)
}
