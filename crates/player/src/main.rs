//! AgentDeck player inspector: connects to the relay and logs every snapshot.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::task::JoinHandle;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use agentdeck_domain::{ShoppingSnapshot, SnapshotSchema, WorldSnapshot};
use agentdeck_player::config::load_dotenv_from_repo_root;
use agentdeck_player::ports::outbound::DataChannelPort;
use agentdeck_player::{create_connection, PlayerConfig, SnapshotHub, SnapshotLease};
use agentdeck_shared::ChannelName;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "agentdeck_player=debug,agentdeck_shared=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    load_dotenv_from_repo_root();
    let config = PlayerConfig::from_env().context("invalid player configuration")?;
    tracing::info!(
        relay_url = %config.relay_url,
        ordering = %config.ordering,
        channels = ?config.channels,
        "Starting AgentDeck player inspector"
    );

    let connection = create_connection(config.relay_url.as_str())?;
    let transport: Arc<dyn DataChannelPort> = Arc::new(connection.transport.clone());
    let hub = SnapshotHub::new(transport, config.ordering);

    let inspectors: Vec<JoinHandle<()>> = config
        .channels
        .iter()
        .map(|channel| match channel {
            ChannelName::WorldState => spawn_inspector(hub.world_state(), summarize_world),
            ChannelName::ShoppingState => spawn_inspector(hub.shopping_state(), summarize_shopping),
        })
        .collect();

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl-C")?;
    tracing::info!(state = %connection.state_observer.state(), "Shutting down");

    for inspector in inspectors {
        inspector.abort();
    }
    connection.handle.disconnect();
    Ok(())
}

fn spawn_inspector<S: SnapshotSchema>(
    lease: SnapshotLease<S>,
    summarize: fn(&S) -> String,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let channel = lease.channel();
        let mut watcher = lease.watch();
        while watcher.changed().await.is_ok() {
            let latest = watcher.borrow_and_update().clone();
            match latest {
                Some(snapshot) => tracing::info!(channel = %channel, "{}", summarize(&snapshot)),
                None => tracing::debug!(channel = %channel, "Snapshot cleared"),
            }
        }
    })
}

fn summarize_world(snapshot: &WorldSnapshot) -> String {
    let player = &snapshot.player;
    format!(
        "{} ({}) hp={} status={} items={} quests: {} active, {} completed, npcs={}",
        player.name,
        player.class.as_deref().unwrap_or("no class"),
        player.hp,
        player.status,
        player.inventory.len(),
        snapshot.quests.active.len(),
        snapshot.quests.completed.len(),
        snapshot.npcs.len()
    )
}

fn summarize_shopping(snapshot: &ShoppingSnapshot) -> String {
    let last_order = match &snapshot.last_order {
        Some(order) => format!(
            "{} ({} items, {} {}, {})",
            order.id,
            order.item_count(),
            order.total,
            order.currency,
            order.status
        ),
        None => "none".to_string(),
    };
    format!(
        "products={} cart={} last_order={}",
        snapshot.current_products.len(),
        snapshot.cart.len(),
        last_order
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentdeck_domain::normalize;

    #[test]
    fn world_summary_mentions_player_and_quests() {
        let snapshot: WorldSnapshot = normalize(
            r#"{"player":{"name":"Rin","hp":40,"status":"Healthy"},
                "quests":{"find_sword":{"status":"completed"},"talk_to_elder":{}}}"#,
        )
        .expect("snapshot");
        let summary = summarize_world(&snapshot);
        assert!(summary.starts_with("Rin (no class) hp=40 status=Healthy"));
        assert!(summary.contains("1 active, 1 completed"));
    }

    #[test]
    fn shopping_summary_mentions_last_order() {
        let snapshot: ShoppingSnapshot = normalize(
            r#"{"current_products":[{"id":"mug-001"}],
                "last_order":{"id":"ORD-1","total":800,"currency":"INR","status":"confirmed",
                              "items":[{"product_id":"mug-001","quantity":2,"price":400}]}}"#,
        )
        .expect("snapshot");
        assert_eq!(
            summarize_shopping(&snapshot),
            "products=1 cart=0 last_order=ORD-1 (2 items, 800 INR, confirmed)"
        );
    }
}
