//! ConnectionRegistry: the single authoritative collection of live connections.
//!
//! Three structures are kept in lock-step:
//!
//! - `connections` – `HashMap<ConnectionId, Connection>` for O(1) lookup.
//! - `order` – ids in accept order, so snapshots are deterministic.
//! - `names` – case-folded display name → owning id, so uniqueness checks
//!   are O(1) instead of a scan over every connection.
//!
//! Invariant: every named connection has exactly one entry in `names`, and
//! no two named connections share a case-folded name.

use std::collections::HashMap;

use thiserror::Error;

use crate::domain::connection::{Connection, ConnectionId};
use crate::domain::events::UserSummary;

/// Errors returned by registry operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("connection {0} is already registered")]
    DuplicateId(ConnectionId),

    #[error("connection {0} not found")]
    NotFound(ConnectionId),

    #[error("display name '{0}' is already taken")]
    NameTaken(String),

    #[error("connection {0} already has a display name")]
    AlreadyNamed(ConnectionId),
}

/// Case-folding used for every name comparison.
fn fold(name: &str) -> String {
    name.to_lowercase()
}

#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: HashMap<ConnectionId, Connection>,
    order: Vec<ConnectionId>,
    names: HashMap<String, ConnectionId>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a freshly accepted connection.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::DuplicateId`] if the id is already present.
    pub fn add(&mut self, connection: Connection) -> Result<(), RegistryError> {
        let id = connection.id();
        if self.connections.contains_key(&id) {
            return Err(RegistryError::DuplicateId(id));
        }
        if let Some(name) = connection.display_name() {
            let key = fold(name);
            if self.names.contains_key(&key) {
                return Err(RegistryError::NameTaken(name.to_string()));
            }
            self.names.insert(key, id);
        }
        self.order.push(id);
        self.connections.insert(id, connection);
        Ok(())
    }

    /// Removes a connection and releases its name.  Absent ids are a no-op.
    pub fn remove(&mut self, id: ConnectionId) -> Option<Connection> {
        let connection = self.connections.remove(&id)?;
        self.order.retain(|other| *other != id);
        if let Some(name) = connection.display_name() {
            self.names.remove(&fold(name));
        }
        Some(connection)
    }

    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] if no such connection is live.
    pub fn find(&self, id: ConnectionId) -> Result<&Connection, RegistryError> {
        self.connections.get(&id).ok_or(RegistryError::NotFound(id))
    }

    pub(crate) fn find_mut(&mut self, id: ConnectionId) -> Result<&mut Connection, RegistryError> {
        self.connections
            .get_mut(&id)
            .ok_or(RegistryError::NotFound(id))
    }

    pub fn contains(&self, id: ConnectionId) -> bool {
        self.connections.contains_key(&id)
    }

    /// Returns `true` if a connection other than `excluding` already owns
    /// `name`, compared case-insensitively.
    pub fn is_name_taken(&self, name: &str, excluding: ConnectionId) -> bool {
        matches!(self.names.get(&fold(name)), Some(owner) if *owner != excluding)
    }

    /// Sets the display name of an anonymous connection.
    ///
    /// The uniqueness check and the write happen in the same `&mut self`
    /// call, so no other claim can slip in between them.
    ///
    /// # Errors
    ///
    /// - [`RegistryError::NotFound`] – unknown id.
    /// - [`RegistryError::AlreadyNamed`] – names are immutable once set.
    /// - [`RegistryError::NameTaken`] – another connection owns the name.
    pub fn assign_name(&mut self, id: ConnectionId, name: &str) -> Result<(), RegistryError> {
        if self.is_name_taken(name, id) {
            return Err(RegistryError::NameTaken(name.to_string()));
        }
        let connection = self
            .connections
            .get_mut(&id)
            .ok_or(RegistryError::NotFound(id))?;
        if connection.display_name().is_some() {
            return Err(RegistryError::AlreadyNamed(id));
        }
        connection.set_display_name(name.to_string());
        self.names.insert(fold(name), id);
        Ok(())
    }

    /// Every named connection as `{displayName, activityState}`, in accept order.
    pub fn snapshot(&self) -> Vec<UserSummary> {
        self.named()
            .map(|c| UserSummary::new(c.display_name().unwrap_or_default(), c.activity_state()))
            .collect()
    }

    /// Like [`snapshot`](Self::snapshot) but without `excluded`.
    pub fn snapshot_excluding(&self, excluded: ConnectionId) -> Vec<UserSummary> {
        self.named()
            .filter(|c| c.id() != excluded)
            .map(|c| UserSummary::new(c.display_name().unwrap_or_default(), c.activity_state()))
            .collect()
    }

    /// All live ids in accept order.
    ///
    /// Callers that mutate the registry while walking it (broadcast, liveness
    /// sweep) iterate over this copy instead of the registry itself.
    pub fn ids(&self) -> Vec<ConnectionId> {
        self.order.clone()
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    pub fn named_count(&self) -> usize {
        self.names.len()
    }

    fn named(&self) -> impl Iterator<Item = &Connection> {
        self.order
            .iter()
            .filter_map(|id| self.connections.get(id))
            .filter(|c| c.display_name().is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::connection::ActivityState;
    use uuid::Uuid;

    fn add_anonymous(registry: &mut ConnectionRegistry) -> ConnectionId {
        let id = Uuid::new_v4();
        registry
            .add(Connection::new(id, "127.0.0.1:40000"))
            .unwrap();
        id
    }

    #[test]
    fn test_registry_starts_empty() {
        let registry = ConnectionRegistry::new();
        assert!(registry.is_empty());
        assert!(registry.snapshot().is_empty());
    }

    #[test]
    fn test_add_rejects_duplicate_id() {
        // Arrange
        let mut registry = ConnectionRegistry::new();
        let id = add_anonymous(&mut registry);

        // Act
        let result = registry.add(Connection::new(id, "127.0.0.1:40001"));

        // Assert
        assert_eq!(result, Err(RegistryError::DuplicateId(id)));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_remove_absent_id_is_noop() {
        let mut registry = ConnectionRegistry::new();
        add_anonymous(&mut registry);
        assert!(registry.remove(Uuid::new_v4()).is_none());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_find_unknown_returns_not_found() {
        let registry = ConnectionRegistry::new();
        let id = Uuid::new_v4();
        assert_eq!(registry.find(id).err(), Some(RegistryError::NotFound(id)));
    }

    #[test]
    fn test_is_name_taken_is_case_insensitive() {
        let mut registry = ConnectionRegistry::new();
        let alice = add_anonymous(&mut registry);
        let other = add_anonymous(&mut registry);
        registry.assign_name(alice, "Alice").unwrap();

        assert!(registry.is_name_taken("alice", other));
        assert!(registry.is_name_taken("ALICE", other));
        assert!(!registry.is_name_taken("Bob", other));
    }

    #[test]
    fn test_is_name_taken_excludes_the_owner() {
        let mut registry = ConnectionRegistry::new();
        let alice = add_anonymous(&mut registry);
        registry.assign_name(alice, "Alice").unwrap();
        assert!(!registry.is_name_taken("alice", alice));
    }

    #[test]
    fn test_assign_name_rejects_case_variant_of_existing_name() {
        // Arrange
        let mut registry = ConnectionRegistry::new();
        let first = add_anonymous(&mut registry);
        let second = add_anonymous(&mut registry);
        registry.assign_name(first, "Alice").unwrap();

        // Act
        let result = registry.assign_name(second, "aLiCe");

        // Assert
        assert_eq!(result, Err(RegistryError::NameTaken("aLiCe".to_string())));
        assert!(registry.find(second).unwrap().display_name().is_none());
    }

    #[test]
    fn test_assign_name_is_immutable_once_set() {
        let mut registry = ConnectionRegistry::new();
        let id = add_anonymous(&mut registry);
        registry.assign_name(id, "Alice").unwrap();

        assert_eq!(
            registry.assign_name(id, "Alicia"),
            Err(RegistryError::AlreadyNamed(id))
        );
        assert_eq!(registry.find(id).unwrap().display_name(), Some("Alice"));
    }

    #[test]
    fn test_remove_releases_name() {
        let mut registry = ConnectionRegistry::new();
        let alice = add_anonymous(&mut registry);
        registry.assign_name(alice, "Alice").unwrap();

        registry.remove(alice);

        assert!(!registry.is_name_taken("Alice", Uuid::new_v4()));
        assert_eq!(registry.named_count(), 0);
    }

    #[test]
    fn test_snapshot_lists_only_named_connections_in_accept_order() {
        // Arrange
        let mut registry = ConnectionRegistry::new();
        let carol = add_anonymous(&mut registry);
        let _anon = add_anonymous(&mut registry);
        let bob = add_anonymous(&mut registry);
        registry.assign_name(bob, "Bob").unwrap();
        registry.assign_name(carol, "Carol").unwrap();
        registry.find_mut(bob).unwrap().activity_state = ActivityState::Working;

        // Act
        let snapshot = registry.snapshot();

        // Assert
        assert_eq!(
            snapshot,
            vec![
                UserSummary::new("Carol", ActivityState::Resting),
                UserSummary::new("Bob", ActivityState::Working),
            ]
        );
    }

    #[test]
    fn test_snapshot_excluding_omits_one_connection() {
        let mut registry = ConnectionRegistry::new();
        let alice = add_anonymous(&mut registry);
        let bob = add_anonymous(&mut registry);
        registry.assign_name(alice, "Alice").unwrap();
        registry.assign_name(bob, "Bob").unwrap();

        let snapshot = registry.snapshot_excluding(bob);

        assert_eq!(snapshot, vec![UserSummary::new("Alice", ActivityState::Resting)]);
    }

    #[test]
    fn test_ids_follow_accept_order_after_removal() {
        let mut registry = ConnectionRegistry::new();
        let a = add_anonymous(&mut registry);
        let b = add_anonymous(&mut registry);
        let c = add_anonymous(&mut registry);

        registry.remove(b);

        assert_eq!(registry.ids(), vec![a, c]);
    }
}
