//! Core data model for campaigns and contributions
//!
//! Campaign status is modeled as an explicit lazily-evaluated state machine:
//! the stored status only ever moves `Active -> Successful` or
//! `Active -> Failed`, and [`Campaign::resolved_status`] derives the current
//! status from wall-clock time and funds at the moment of access. Callers
//! apply it before every read and before every mutation precondition check,
//! so nothing in this crate depends on a background timer.

use std::fmt;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Monotonically assigned campaign identifier. Never reused.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct CampaignId(pub u64);

impl fmt::Display for CampaignId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a campaign's dedicated escrow account. Never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EscrowId(Uuid);

impl EscrowId {
    pub(crate) fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for EscrowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Campaign status state machine
///
/// `Active` is initial; `Successful` and `Failed` are terminal. Released
/// funds are an orthogonal flag on [`Campaign`], and refunds are tracked
/// per contributor, so neither introduces further states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CampaignStatus {
    /// Accepting contributions until the deadline
    Active,
    /// Deadline passed with the goal reached; funds releasable to the creator
    Successful,
    /// Deadline passed short of the goal; contributions refundable
    Failed,
}

impl CampaignStatus {
    /// Check if this is a terminal state (no further transitions possible)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Successful | Self::Failed)
    }
}

/// Campaign model: a funding goal with a deadline, owned by a creator
///
/// All fields other than `total_funds`, `status` and `funds_released` are
/// fixed at creation. Campaigns are never deleted; terminal states are
/// retained for audit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Campaign {
    pub id: CampaignId,
    pub creator: String,
    pub title: String,
    pub description: String,
    /// Funding goal in the smallest currency unit, strictly positive
    pub goal: u64,
    pub created_at: DateTime<Utc>,
    /// Fixed at creation: `created_at` + requested duration
    pub deadline: DateTime<Utc>,
    /// Sum of all non-refunded contributions
    pub total_funds: u64,
    pub status: CampaignStatus,
    /// Set exactly once, only after a successful release
    pub funds_released: bool,
    /// Opaque content identifiers supplied at creation, stored verbatim
    pub media_refs: Vec<String>,
    /// The campaign's dedicated escrow account, 1:1, never reassigned
    pub escrow_id: EscrowId,
}

impl Campaign {
    /// Create a new campaign starting now, with `deadline = now + duration`.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        id: CampaignId,
        escrow_id: EscrowId,
        creator: String,
        title: String,
        description: String,
        goal: u64,
        duration: TimeDelta,
        media_refs: Vec<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            creator,
            title,
            description,
            goal,
            created_at: now,
            deadline: now + duration,
            total_funds: 0,
            status: CampaignStatus::Active,
            funds_released: false,
            media_refs,
            escrow_id,
        }
    }

    /// Derive the campaign's status as of `now` without mutating anything.
    ///
    /// An `Active` campaign whose deadline has passed resolves to
    /// `Successful` when `total_funds >= goal` (the exact-goal boundary
    /// counts as success), otherwise `Failed`. Terminal statuses are
    /// returned unchanged. Idempotent.
    pub fn resolved_status(&self, now: DateTime<Utc>) -> CampaignStatus {
        if self.status == CampaignStatus::Active && now >= self.deadline {
            if self.total_funds >= self.goal {
                CampaignStatus::Successful
            } else {
                CampaignStatus::Failed
            }
        } else {
            self.status
        }
    }

    /// Whether a contribution at `now` would be accepted.
    pub fn accepts_contributions(&self, now: DateTime<Utc>) -> bool {
        self.resolved_status(now) == CampaignStatus::Active && now < self.deadline
    }
}

/// Cumulative contribution of one contributor to one campaign
///
/// Repeat contributions accumulate into the same record; they never create
/// a second one. `refunded` is set exactly once and only while the campaign
/// is `Failed`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContributionRecord {
    pub amount: u64,
    pub refunded: bool,
}
