//! Ordered, best-effort cleanup when an active connection goes away.
//!
//! Each step is independently fallible. A failing step is logged and
//! recorded in the report; the remaining steps still run.

use chrono::Utc;

use crate::error::StoreError;

use super::connection::{Connection, ConnectionState};
use super::session::Gateway;

/// Teardown steps in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeardownStep {
    /// Leave the current room and tell the remaining members.
    LeaveRoom,
    /// Pull the connection out of persisted meeting peer lists.
    PullMeetingPeer,
    /// Drop ephemeral producer records.
    RemovePeers,
    /// Remove the connection from the registry indexes.
    Unregister,
    /// Stamp the user's last-seen time.
    StampLastOnline,
    /// Drop the online record and rebroadcast presence.
    RemovePresence,
}

impl TeardownStep {
    pub const ORDER: [TeardownStep; 6] = [
        TeardownStep::LeaveRoom,
        TeardownStep::PullMeetingPeer,
        TeardownStep::RemovePeers,
        TeardownStep::Unregister,
        TeardownStep::StampLastOnline,
        TeardownStep::RemovePresence,
    ];
}

/// Outcome of one teardown.
#[derive(Debug, Clone)]
pub struct TeardownReport {
    pub connection_id: String,
    /// Room the connection was removed from, if any.
    pub left_room: Option<String>,
    /// Steps that failed, with the error message.
    pub failed: Vec<(TeardownStep, String)>,
}

impl TeardownReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Run every step for `conn`, then mark it terminated.
pub async fn run(gateway: &Gateway, conn: &Connection) -> TeardownReport {
    let mut report = TeardownReport {
        connection_id: conn.id.clone(),
        left_room: None,
        failed: Vec::new(),
    };

    for step in TeardownStep::ORDER {
        if let Err(e) = run_step(gateway, conn, step, &mut report).await {
            tracing::warn!(
                connection_id = %conn.id,
                ?step,
                error = %e,
                "teardown step failed, continuing"
            );
            report.failed.push((step, e.to_string()));
        }
    }

    if let Err(e) = conn.transition(ConnectionState::Terminated) {
        tracing::error!(connection_id = %conn.id, %e, "unexpected state after teardown");
    }

    report
}

async fn run_step(
    gateway: &Gateway,
    conn: &Connection,
    step: TeardownStep,
    report: &mut TeardownReport,
) -> Result<(), StoreError> {
    match step {
        TeardownStep::LeaveRoom => {
            report.left_room = gateway.leave_room(&conn.id, None);
        }
        TeardownStep::PullMeetingPeer => {
            let meetings = gateway.store.pull_meeting_peer(&conn.id).await?;
            tracing::debug!(connection_id = %conn.id, meetings, "pulled peer from meetings");
        }
        TeardownStep::RemovePeers => {
            let removed = gateway.peers.remove_connection(&conn.id).await?;
            tracing::debug!(connection_id = %conn.id, removed, "removed peer records");
        }
        TeardownStep::Unregister => {
            gateway.registry.unregister(&conn.id);
        }
        TeardownStep::StampLastOnline => {
            if let Some(user_id) = conn.user_id() {
                gateway.store.touch_last_online(user_id, Utc::now()).await?;
            }
        }
        TeardownStep::RemovePresence => {
            gateway.presence.record_offline(&conn.id);
            gateway.broadcast_presence();
        }
    }
    Ok(())
}
