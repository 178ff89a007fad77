use std::collections::HashMap;
use std::sync::RwLock;
use uuid::Uuid;

/// One live field connection: the mesh root's socket plus every device id
/// (root included) reachable through it.
struct FieldConnection<H> {
    conn_id: Uuid,
    handle: H,
    member_ids: Vec<String>,
}

struct Inner<H> {
    /// Root device id -> its live connection.
    roots: HashMap<String, FieldConnection<H>>,
    /// Any member device id -> the root id owning it.
    members: HashMap<String, String>,
    /// Watched device id -> the dashboard sessions subscribed to it.
    dashboards: HashMap<String, HashMap<Uuid, H>>,
}

/// Tracks which socket currently speaks for which devices, on both sides of
/// the gateway. Generic over the session handle so the routing logic is
/// testable without sockets.
///
/// All operations take the lock briefly and never perform I/O under it.
pub struct ConnectionRegistry<H> {
    inner: RwLock<Inner<H>>,
}

impl<H: Clone> ConnectionRegistry<H> {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                roots: HashMap::new(),
                members: HashMap::new(),
                dashboards: HashMap::new(),
            }),
        }
    }

    /// Binds a connection to a mesh root and its member ids, replacing both
    /// any earlier binding of this connection (the mesh re-rooted) and any
    /// stale owner of the root id (the device reconnected before the old
    /// socket's cleanup ran). Membership is updated atomically: lookups
    /// never observe a half-moved mesh.
    pub fn register_device(
        &self,
        conn_id: Uuid,
        root_id: &str,
        member_ids: Vec<String>,
        handle: H,
    ) {
        let mut inner = self.inner.write().expect("registry lock poisoned");

        let stale_roots: Vec<String> = inner
            .roots
            .iter()
            .filter(|(id, conn)| conn.conn_id == conn_id || id.as_str() == root_id)
            .map(|(id, _)| id.clone())
            .collect();
        for id in stale_roots {
            if let Some(old) = inner.roots.remove(&id) {
                for member in &old.member_ids {
                    inner.members.remove(member);
                }
            }
        }

        for member in &member_ids {
            inner.members.insert(member.clone(), root_id.to_string());
        }
        inner.roots.insert(
            root_id.to_string(),
            FieldConnection {
                conn_id,
                handle,
                member_ids,
            },
        );
    }

    /// The socket handle to forward a command to `device_id` on, whether it
    /// is a root or a leaf of some root's mesh.
    pub fn lookup_device(&self, device_id: &str) -> Option<H> {
        let inner = self.inner.read().expect("registry lock poisoned");
        let root_id = inner.members.get(device_id)?;
        inner.roots.get(root_id).map(|conn| conn.handle.clone())
    }

    /// Drops the mesh bound to `conn_id`, returning the member ids that just
    /// went offline. A no-op when another connection has since taken over
    /// the root id, so a slow cleanup cannot evict its successor.
    pub fn unregister_device(&self, conn_id: Uuid) -> Vec<String> {
        let mut inner = self.inner.write().expect("registry lock poisoned");
        let root_id = inner
            .roots
            .iter()
            .find(|(_, conn)| conn.conn_id == conn_id)
            .map(|(id, _)| id.clone());
        let Some(root_id) = root_id else {
            return Vec::new();
        };
        let conn = inner.roots.remove(&root_id).expect("root present");
        for member in &conn.member_ids {
            inner.members.remove(member);
        }
        conn.member_ids
    }

    pub fn register_dashboard(&self, device_id: &str, conn_id: Uuid, handle: H) {
        let mut inner = self.inner.write().expect("registry lock poisoned");
        inner
            .dashboards
            .entry(device_id.to_string())
            .or_default()
            .insert(conn_id, handle);
    }

    pub fn unregister_dashboard(&self, device_id: &str, conn_id: Uuid) {
        let mut inner = self.inner.write().expect("registry lock poisoned");
        if let Some(watchers) = inner.dashboards.get_mut(device_id) {
            watchers.remove(&conn_id);
            if watchers.is_empty() {
                inner.dashboards.remove(device_id);
            }
        }
    }

    /// Snapshot of the dashboard sessions watching `device_id`; the caller
    /// pushes to them outside the lock.
    pub fn dashboards_watching(&self, device_id: &str) -> Vec<(Uuid, H)> {
        let inner = self.inner.read().expect("registry lock poisoned");
        inner
            .dashboards
            .get(device_id)
            .map(|watchers| {
                watchers
                    .iter()
                    .map(|(id, handle)| (*id, handle.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl<H: Clone> Default for ConnectionRegistry<H> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn leaf_devices_route_to_the_root_connection() {
        let registry = ConnectionRegistry::new();
        let conn = Uuid::new_v4();
        registry.register_device(conn, "bms_001", ids(&["bms_001", "bms_002", "bms_003"]), 7u8);

        assert_eq!(registry.lookup_device("bms_001"), Some(7));
        assert_eq!(registry.lookup_device("bms_003"), Some(7));
        assert_eq!(registry.lookup_device("bms_404"), None);
    }

    #[test]
    fn unregister_drops_the_whole_mesh_at_once() {
        let registry = ConnectionRegistry::new();
        let conn = Uuid::new_v4();
        registry.register_device(conn, "bms_001", ids(&["bms_001", "bms_002", "bms_003"]), 7u8);

        let offline = registry.unregister_device(conn);
        assert_eq!(offline, ids(&["bms_001", "bms_002", "bms_003"]));
        assert_eq!(registry.lookup_device("bms_001"), None);
        assert_eq!(registry.lookup_device("bms_002"), None);
    }

    #[test]
    fn reconnect_replaces_the_stale_owner() {
        let registry = ConnectionRegistry::new();
        let old = Uuid::new_v4();
        let new = Uuid::new_v4();
        registry.register_device(old, "bms_001", ids(&["bms_001", "bms_002"]), 1u8);
        registry.register_device(new, "bms_001", ids(&["bms_001"]), 2u8);

        assert_eq!(registry.lookup_device("bms_001"), Some(2));
        // the replaced mesh's extra member is gone with it
        assert_eq!(registry.lookup_device("bms_002"), None);
        // the old task's late cleanup must not evict the successor
        assert!(registry.unregister_device(old).is_empty());
        assert_eq!(registry.lookup_device("bms_001"), Some(2));
    }

    #[test]
    fn rerooted_mesh_moves_with_its_connection() {
        let registry = ConnectionRegistry::new();
        let conn = Uuid::new_v4();
        registry.register_device(conn, "bms_001", ids(&["bms_001", "bms_002"]), 1u8);
        registry.register_device(conn, "bms_002", ids(&["bms_002", "bms_001"]), 1u8);

        assert_eq!(registry.lookup_device("bms_001"), Some(1));
        let offline = registry.unregister_device(conn);
        assert_eq!(offline, ids(&["bms_002", "bms_001"]));
    }

    #[test]
    fn dashboards_are_tracked_per_watched_device() {
        let registry: ConnectionRegistry<u8> = ConnectionRegistry::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        registry.register_dashboard("bms_001", a, 1);
        registry.register_dashboard("bms_001", b, 2);
        registry.register_dashboard("bms_002", a, 1);

        let mut watching = registry.dashboards_watching("bms_001");
        watching.sort_by_key(|(_, h)| *h);
        assert_eq!(watching.len(), 2);
        assert_eq!(watching[0].1, 1);

        registry.unregister_dashboard("bms_001", a);
        assert_eq!(registry.dashboards_watching("bms_001").len(), 1);
        assert!(registry.dashboards_watching("bms_404").is_empty());
    }
}
