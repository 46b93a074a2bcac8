//! Room membership: which connections are producing/consuming in which room.

use dashmap::DashMap;

/// Room ID → member connection IDs, plus the reverse index.
///
/// A connection is in at most one room. Empty rooms are dropped.
pub struct RoomTracker {
    members: DashMap<String, Vec<String>>,
    room_of: DashMap<String, String>,
}

impl RoomTracker {
    pub fn new() -> Self {
        Self {
            members: DashMap::new(),
            room_of: DashMap::new(),
        }
    }

    /// Add a connection to a room. If it was in a different room it is moved
    /// and the previous room ID is returned.
    pub fn add(&self, room_id: &str, connection_id: &str) -> Option<String> {
        let previous = self
            .room_of
            .insert(connection_id.to_string(), room_id.to_string())
            .filter(|prev| prev != room_id);

        if let Some(prev) = &previous {
            self.remove_member(prev, connection_id);
        }

        let mut members = self.members.entry(room_id.to_string()).or_default();
        if !members.iter().any(|id| id == connection_id) {
            members.push(connection_id.to_string());
        }
        previous
    }

    /// Remove a connection from a room. Returns false (and changes nothing)
    /// when it was not a member.
    pub fn remove(&self, room_id: &str, connection_id: &str) -> bool {
        let removed = self.remove_member(room_id, connection_id);
        if removed {
            self.room_of
                .remove_if(connection_id, |_, room| room == room_id);
        }
        removed
    }

    /// Members of a room in join order. Unknown rooms are empty.
    pub fn members_of(&self, room_id: &str) -> Vec<String> {
        self.members
            .get(room_id)
            .map(|m| m.value().clone())
            .unwrap_or_default()
    }

    pub fn room_of(&self, connection_id: &str) -> Option<String> {
        self.room_of.get(connection_id).map(|r| r.value().clone())
    }

    pub fn room_count(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty() && self.room_of.is_empty()
    }

    fn remove_member(&self, room_id: &str, connection_id: &str) -> bool {
        let removed = match self.members.get_mut(room_id) {
            Some(mut members) => {
                let before = members.len();
                members.retain(|id| id != connection_id);
                members.len() != before
            }
            None => false,
        };
        self.members.remove_if(room_id, |_, members| members.is_empty());
        removed
    }
}

impl Default for RoomTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_and_list_members() {
        let rooms = RoomTracker::new();
        assert!(rooms.add("r1", "c1").is_none());
        rooms.add("r1", "c2");

        assert_eq!(rooms.members_of("r1"), vec!["c1", "c2"]);
        assert_eq!(rooms.room_of("c2").as_deref(), Some("r1"));
    }

    #[test]
    fn adding_twice_does_not_duplicate() {
        let rooms = RoomTracker::new();
        rooms.add("r1", "c1");
        assert!(rooms.add("r1", "c1").is_none());
        assert_eq!(rooms.members_of("r1"), vec!["c1"]);
    }

    #[test]
    fn joining_another_room_moves_connection() {
        let rooms = RoomTracker::new();
        rooms.add("r1", "c1");
        rooms.add("r1", "c2");

        assert_eq!(rooms.add("r2", "c1").as_deref(), Some("r1"));
        assert_eq!(rooms.members_of("r1"), vec!["c2"]);
        assert_eq!(rooms.members_of("r2"), vec!["c1"]);
        assert_eq!(rooms.room_of("c1").as_deref(), Some("r2"));
    }

    #[test]
    fn removing_non_member_is_noop() {
        let rooms = RoomTracker::new();
        rooms.add("r1", "c1");

        assert!(!rooms.remove("r1", "c9"));
        assert!(!rooms.remove("nowhere", "c1"));
        assert_eq!(rooms.members_of("r1"), vec!["c1"]);
        assert_eq!(rooms.room_of("c1").as_deref(), Some("r1"));
    }

    #[test]
    fn removing_last_member_drops_room() {
        let rooms = RoomTracker::new();
        rooms.add("r1", "c1");
        assert!(rooms.remove("r1", "c1"));

        assert!(rooms.members_of("r1").is_empty());
        assert!(rooms.room_of("c1").is_none());
        assert!(rooms.is_empty());
    }

    #[test]
    fn unknown_room_is_empty() {
        let rooms = RoomTracker::new();
        assert!(rooms.members_of("ghost").is_empty());
        assert_eq!(rooms.room_count(), 0);
    }
}
