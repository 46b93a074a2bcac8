//! Hook into the media server (SFU) at connection activation.

use async_trait::async_trait;

use crate::error::MediaError;

/// What the media capability is told about a newly active connection.
#[derive(Debug, Clone)]
pub struct MediaPeer {
    pub connection_id: String,
    pub user_id: Option<String>,
}

/// Per-connection media setup, run once when a connection becomes active.
///
/// The gateway never waits on this and never fails a connection because of
/// it: a failure only degrades media features for that connection.
#[async_trait]
pub trait MediaCapability: Send + Sync {
    async fn init_connection(&self, peer: &MediaPeer) -> Result<(), MediaError>;
}

/// Stand-in used when the media server is switched off.
pub struct DisabledMedia;

#[async_trait]
impl MediaCapability for DisabledMedia {
    async fn init_connection(&self, peer: &MediaPeer) -> Result<(), MediaError> {
        tracing::debug!(connection_id = %peer.connection_id, "media disabled, skipping init");
        Ok(())
    }
}
