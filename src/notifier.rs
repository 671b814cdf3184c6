//! Event notifier - typed state-change notifications for UI subscribers
//!
//! Fire-and-forget publishing over a broadcast channel. Delivery is
//! best-effort and not part of correctness: subscribers that lag are allowed
//! to miss events and are expected to reconcile through the read API, which
//! is what the calling UI's polling already does.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

use crate::models::{CampaignId, CampaignStatus};

/// Default broadcast capacity. Large enough to absorb short bursts without
/// dropping events for attached subscribers.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// State-change notification emitted by the campaign engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CampaignEvent {
    /// A campaign was created
    Created {
        campaign_id: CampaignId,
        creator: String,
        goal: u64,
    },
    /// Lazy resolution moved a campaign out of `Active`
    StatusChanged {
        campaign_id: CampaignId,
        status: CampaignStatus,
    },
    /// A contribution was recorded and deposited to escrow
    Contributed {
        campaign_id: CampaignId,
        contributor: String,
        amount: u64,
    },
    /// One contributor's cumulative amount was returned to them
    Refunded {
        campaign_id: CampaignId,
        contributor: String,
        amount: u64,
    },
    /// The full escrow balance was paid to the creator
    FundsReleased {
        campaign_id: CampaignId,
        creator: String,
        amount: u64,
    },
}

impl CampaignEvent {
    /// The campaign this event concerns.
    pub fn campaign_id(&self) -> CampaignId {
        match self {
            Self::Created { campaign_id, .. }
            | Self::StatusChanged { campaign_id, .. }
            | Self::Contributed { campaign_id, .. }
            | Self::Refunded { campaign_id, .. }
            | Self::FundsReleased { campaign_id, .. } => *campaign_id,
        }
    }
}

/// Broadcast publisher for campaign events
#[derive(Debug)]
pub struct EventNotifier {
    sender: broadcast::Sender<CampaignEvent>,
}

impl EventNotifier {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Attach a new subscriber. Events published before this call are not
    /// replayed.
    pub fn subscribe(&self) -> broadcast::Receiver<CampaignEvent> {
        self.sender.subscribe()
    }

    /// Publish an event to all current subscribers. Never fails: an empty
    /// subscriber set just drops the event.
    pub(crate) fn publish(&self, event: CampaignEvent) {
        if self.sender.send(event.clone()).is_err() {
            debug!(campaign = %event.campaign_id(), "no subscribers for event");
        }
    }
}

impl Default for EventNotifier {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_receive_published_events() {
        let notifier = EventNotifier::default();
        let mut rx = notifier.subscribe();

        let event = CampaignEvent::Contributed {
            campaign_id: CampaignId(3),
            contributor: "bob".into(),
            amount: 25,
        };
        notifier.publish(event.clone());

        assert_eq!(rx.recv().await.unwrap(), event);
    }

    #[tokio::test]
    async fn publishing_without_subscribers_is_a_noop() {
        let notifier = EventNotifier::default();
        notifier.publish(CampaignEvent::StatusChanged {
            campaign_id: CampaignId(0),
            status: CampaignStatus::Failed,
        });
        // nothing to assert; the call must simply not fail
    }

    #[test]
    fn events_serialize_for_external_consumers() {
        let event = CampaignEvent::FundsReleased {
            campaign_id: CampaignId(7),
            creator: "alice".into(),
            amount: 110,
        };
        let json = serde_json::to_string(&event).unwrap();
        let back: CampaignEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }
}
