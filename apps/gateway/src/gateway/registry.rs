//! Connection registry: connection ID ↔ user ID ↔ outbound handle.

use dashmap::DashMap;
use parking_lot::Mutex;

use super::events::Outbound;

/// Shared registry of all active gateway connections.
///
/// Uses `DashMap` for shard-level concurrency and `parking_lot::Mutex` for
/// the ordered ID list. The three indexes are kept in step: a connection
/// appears in `handles` iff it appears in `ids`, and a user-bound connection
/// appears in exactly one `by_user` list with a matching `user_of` entry.
pub struct ConnectionRegistry {
    /// Registration order of live connection IDs.
    ids: Mutex<Vec<String>>,
    handles: DashMap<String, Outbound>,
    by_user: DashMap<String, Vec<String>>,
    user_of: DashMap<String, String>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            ids: Mutex::new(Vec::new()),
            handles: DashMap::new(),
            by_user: DashMap::new(),
            user_of: DashMap::new(),
        }
    }

    /// Register an authenticated connection. Re-registering an ID replaces
    /// its handle and user binding.
    pub fn register(&self, connection_id: &str, user_id: Option<&str>, handle: Outbound) {
        if self.handles.contains_key(connection_id) {
            self.unregister(connection_id);
        }

        self.ids.lock().push(connection_id.to_string());
        self.handles.insert(connection_id.to_string(), handle);

        if let Some(user_id) = user_id {
            self.by_user
                .entry(user_id.to_string())
                .or_default()
                .push(connection_id.to_string());
            self.user_of
                .insert(connection_id.to_string(), user_id.to_string());
        }
    }

    /// Remove a connection from every index. Returns the user it belonged to.
    /// Unknown IDs are a no-op.
    pub fn unregister(&self, connection_id: &str) -> Option<String> {
        self.ids.lock().retain(|id| id != connection_id);
        self.handles.remove(connection_id);

        let (_, user_id) = self.user_of.remove(connection_id)?;
        if let Some(mut conns) = self.by_user.get_mut(&user_id) {
            conns.retain(|id| id != connection_id);
        }
        self.by_user.remove_if(&user_id, |_, conns| conns.is_empty());
        Some(user_id)
    }

    pub fn contains(&self, connection_id: &str) -> bool {
        self.handles.contains_key(connection_id)
    }

    pub fn handle(&self, connection_id: &str) -> Option<Outbound> {
        self.handles.get(connection_id).map(|h| h.value().clone())
    }

    pub fn user_of(&self, connection_id: &str) -> Option<String> {
        self.user_of.get(connection_id).map(|u| u.value().clone())
    }

    /// All connection IDs held by a user, in connection order.
    pub fn connections_of(&self, user_id: &str) -> Vec<String> {
        self.by_user
            .get(user_id)
            .map(|c| c.value().clone())
            .unwrap_or_default()
    }

    /// Snapshot of every live connection ID in registration order.
    pub fn connection_ids(&self) -> Vec<String> {
        self.ids.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty() && self.by_user.is_empty() && self.user_of.is_empty()
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn handle() -> Outbound {
        mpsc::channel(1).0
    }

    #[test]
    fn register_indexes_both_directions() {
        let registry = ConnectionRegistry::new();
        registry.register("c1", Some("u1"), handle());
        registry.register("c2", Some("u1"), handle());

        assert_eq!(registry.connections_of("u1"), vec!["c1", "c2"]);
        assert_eq!(registry.user_of("c2").as_deref(), Some("u1"));
        assert_eq!(registry.connection_ids(), vec!["c1", "c2"]);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn unregister_removes_from_exactly_one_user() {
        let registry = ConnectionRegistry::new();
        registry.register("c1", Some("u1"), handle());
        registry.register("c2", Some("u1"), handle());
        registry.register("c3", Some("u2"), handle());

        assert_eq!(registry.unregister("c1").as_deref(), Some("u1"));
        assert_eq!(registry.connections_of("u1"), vec!["c2"]);
        assert_eq!(registry.connections_of("u2"), vec!["c3"]);
        assert!(!registry.contains("c1"));
        assert!(registry.user_of("c1").is_none());
    }

    #[test]
    fn last_connection_removes_user_entry() {
        let registry = ConnectionRegistry::new();
        registry.register("c1", Some("u1"), handle());
        registry.unregister("c1");

        assert!(registry.connections_of("u1").is_empty());
        assert!(registry.is_empty());
    }

    #[test]
    fn anonymous_connection_has_no_user_index() {
        let registry = ConnectionRegistry::new();
        registry.register("c1", None, handle());

        assert!(registry.contains("c1"));
        assert!(registry.user_of("c1").is_none());
        assert!(registry.unregister("c1").is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn unregister_unknown_is_noop() {
        let registry = ConnectionRegistry::new();
        registry.register("c1", Some("u1"), handle());
        assert!(registry.unregister("nope").is_none());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn reregister_rebinds_user() {
        let registry = ConnectionRegistry::new();
        registry.register("c1", Some("u1"), handle());
        registry.register("c1", Some("u2"), handle());

        assert!(registry.connections_of("u1").is_empty());
        assert_eq!(registry.connections_of("u2"), vec!["c1"]);
        assert_eq!(registry.connection_ids(), vec!["c1"]);
    }
}
