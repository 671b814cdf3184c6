//! End-to-end driver for the campaign engine
//!
//! Runs one short campaign through its full lifecycle against an in-process
//! node: create, contribute from two parties, wait out the deadline, release
//! the escrow to the creator, and print the final projection as JSON.
//!
//! ```text
//! RUST_LOG=crowdfund_engine=debug cargo run --bin demo
//! ```

use anyhow::Result;
use tracing_subscriber::EnvFilter;

use crowdfund_engine::engine::CreateCampaignRequest;
use crowdfund_engine::node::{CrowdfundNode, CrowdfundNodeConfig};

#[tokio::main]
async fn main() -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("crowdfund_engine=info,demo=info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let node = CrowdfundNode::new(CrowdfundNodeConfig::default());
    let mut events = node.subscribe();
    let printer = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            tracing::info!(?event, "notification");
        }
    });

    let id = node
        .create_campaign(CreateCampaignRequest {
            creator: "alice".into(),
            title: "Harbor documentary".into(),
            description: "A short film about the old fishing harbor".into(),
            goal: 100,
            duration_secs: 2,
            media_refs: vec!["QmPosterHash".into()],
        })
        .await?;

    node.contribute(id, "bob", 60).await?;
    node.contribute(id, "carol", 50).await?;

    tracing::info!(campaign = %id, "waiting for the deadline to pass");
    tokio::time::sleep(std::time::Duration::from_millis(2300)).await;

    let released = node.release_funds(id, "alice").await?;
    tracing::info!(campaign = %id, released, "creator paid out");

    let view = node.campaign_view(id).await?;
    println!("{}", serde_json::to_string_pretty(&view)?);
    for row in node.contributor_views(id).await? {
        println!("{}", serde_json::to_string(&row)?);
    }

    printer.abort();
    Ok(())
}
