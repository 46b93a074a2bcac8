#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use clover_common::id::{prefix, prefixed_ulid};
use clover_gateway::auth::tokens::{mint_token, Claims};
use clover_gateway::config::{Config, MailConfig};
use clover_gateway::db::memory::MemoryStore;
use clover_gateway::db::peers::MemoryPeerStore;
use clover_gateway::error::MediaError;
use clover_gateway::gateway::events::{Frame, Outbound};
use clover_gateway::gateway::media::{MediaCapability, MediaPeer};
use clover_gateway::gateway::session::Gateway;
use clover_gateway::AppState;

pub const SECRET: &str = "integration-test-secret";

/// Everything a test needs to poke at the gateway and its stores.
pub struct TestGateway {
    pub gateway: Arc<Gateway>,
    pub store: Arc<MemoryStore>,
    pub peers: Arc<MemoryPeerStore>,
}

pub fn test_gateway() -> TestGateway {
    build_gateway(None)
}

pub fn test_gateway_with_media(media: Arc<dyn MediaCapability>) -> TestGateway {
    build_gateway(Some(media))
}

fn build_gateway(media: Option<Arc<dyn MediaCapability>>) -> TestGateway {
    let store = Arc::new(MemoryStore::new());
    let peers = Arc::new(MemoryPeerStore::new());
    let gateway = Arc::new(Gateway::new(SECRET, store.clone(), peers.clone(), media));
    TestGateway {
        gateway,
        store,
        peers,
    }
}

pub fn test_config() -> Config {
    Config {
        port: 0,
        auth_secret: SECRET.to_string(),
        database_url: None,
        frontend_url: None,
        app_version: "test".to_string(),
        mail: MailConfig {
            enabled: false,
            relay_url: None,
            default_from: "admin@example.com".to_string(),
        },
    }
}

pub fn test_state(gateway: Arc<Gateway>) -> AppState {
    AppState {
        config: Arc::new(test_config()),
        gateway,
    }
}

/// A fresh user ID, also inserted into the store so `last_online` can be stamped.
pub fn new_user(store: &MemoryStore) -> String {
    let user_id = prefixed_ulid(prefix::USER);
    store.insert_user(&user_id);
    user_id
}

pub fn token_for(user_id: &str) -> String {
    let mut claims = Claims::for_user(user_id);
    claims.email = Some(format!("{user_id}@example.com"));
    mint_token(&claims, SECRET).expect("mint token")
}

pub fn connection_id() -> String {
    prefixed_ulid(prefix::CONNECTION)
}

/// Outbound queue for an in-process client.
pub fn client() -> (Outbound, mpsc::Receiver<Frame>) {
    mpsc::channel(64)
}

/// Every frame queued so far, parsed.
pub fn drain(rx: &mut mpsc::Receiver<Frame>) -> Vec<serde_json::Value> {
    let mut frames = Vec::new();
    while let Ok(frame) = rx.try_recv() {
        frames.push(serde_json::from_str(&frame).expect("frame is JSON"));
    }
    frames
}

/// Frames of one event type, in arrival order.
pub fn events_named<'a>(
    frames: &'a [serde_json::Value],
    name: &str,
) -> Vec<&'a serde_json::Value> {
    frames.iter().filter(|f| f["event"] == name).collect()
}

/// Wait up to a second for `condition` to hold.
pub async fn eventually(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..100 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

/// Media hook that always fails.
pub struct BrokenMedia;

#[async_trait]
impl MediaCapability for BrokenMedia {
    async fn init_connection(&self, _peer: &MediaPeer) -> Result<(), MediaError> {
        Err(MediaError("transport not available".to_string()))
    }
}
