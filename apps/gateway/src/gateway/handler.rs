//! Inbound event dispatch for active connections.

use crate::db::peers::PeerRecord;
use crate::error::StoreError;

use super::connection::Connection;
use super::events::{ClientEvent, ProducerPayload, RoomPayload, ServerEvent};
use super::session::Gateway;

/// Route one client event to its handler. Failures are logged; nothing is
/// sent back to the client.
pub async fn dispatch(gateway: &Gateway, conn: &Connection, event: ClientEvent) {
    let name = event.name();
    let result = match event {
        ClientEvent::Join(payload) => handle_join(gateway, conn, payload).await,
        ClientEvent::Leave(payload) => handle_leave(gateway, conn, payload),
        ClientEvent::NewProducer(payload) => handle_new_producer(gateway, conn, payload).await,
        ClientEvent::RemoveProducer(payload) => {
            handle_remove_producer(gateway, conn, payload).await
        }
    };

    if let Err(e) = result {
        tracing::warn!(connection_id = %conn.id, event = name, error = %e, "event handler failed");
    }
}

/// Join the room, then replay the producers other members already have
/// there so the newcomer can start consuming them.
async fn handle_join(
    gateway: &Gateway,
    conn: &Connection,
    payload: RoomPayload,
) -> Result<(), StoreError> {
    let Some(room_id) = payload.room_id else {
        tracing::debug!(connection_id = %conn.id, "join without roomID ignored");
        return Ok(());
    };
    gateway.join_room(&conn.id, &room_id);

    let producers = gateway.peers.in_room(&room_id).await?;
    for record in producers.into_iter().filter(|r| r.connection_id != conn.id) {
        let event = ServerEvent::NewProducer {
            connection_id: record.connection_id,
            producer_id: record.producer_id,
            kind: record.kind,
        };
        gateway.fanout.to_connection(&conn.id, &event);
    }
    Ok(())
}

fn handle_leave(gateway: &Gateway, conn: &Connection, payload: RoomPayload) -> Result<(), StoreError> {
    gateway.leave_room(&conn.id, payload.room_id.as_deref());
    Ok(())
}

async fn handle_new_producer(
    gateway: &Gateway,
    conn: &Connection,
    payload: ProducerPayload,
) -> Result<(), StoreError> {
    let Some(room_id) = gateway.rooms.room_of(&conn.id) else {
        tracing::debug!(connection_id = %conn.id, "newProducer outside a room ignored");
        return Ok(());
    };

    gateway
        .peers
        .insert(PeerRecord {
            connection_id: conn.id.clone(),
            room_id: room_id.clone(),
            producer_id: payload.producer_id.clone(),
            kind: payload.kind.clone(),
        })
        .await?;

    let event = ServerEvent::NewProducer {
        connection_id: conn.id.clone(),
        producer_id: payload.producer_id,
        kind: payload.kind,
    };
    gateway.fanout.to_room(&room_id, &event, Some(&conn.id));
    Ok(())
}

async fn handle_remove_producer(
    gateway: &Gateway,
    conn: &Connection,
    payload: ProducerPayload,
) -> Result<(), StoreError> {
    let Some(record) = gateway
        .peers
        .remove_producer(&conn.id, &payload.producer_id)
        .await?
    else {
        return Ok(());
    };

    let event = ServerEvent::RemoveProducer {
        connection_id: conn.id.clone(),
        producer_id: record.producer_id,
    };
    gateway.fanout.to_room(&record.room_id, &event, Some(&conn.id));
    Ok(())
}
