// ── Device registry ──
//
// Session-owned directory of every discovered device, keyed by composite
// identity and kept in discovery order. Append-only: there is no removal
// path, and registering an already known key keeps the first instance.

use std::sync::{Arc, RwLock};

use indexmap::IndexMap;
use indexmap::map::Entry;
use tracing::warn;

use crate::device::Device;
use crate::model::DeviceKey;

#[derive(Debug, Default)]
pub struct DeviceRegistry {
    devices: RwLock<IndexMap<DeviceKey, Arc<Device>>>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a device and return the instance the registry holds for its key.
    pub fn register(&self, device: Arc<Device>) -> Arc<Device> {
        let mut devices = self.devices.write().expect("registry lock poisoned");
        match devices.entry(device.key().clone()) {
            Entry::Occupied(existing) => {
                warn!(device = %device.key(), "device already registered, keeping first instance");
                Arc::clone(existing.get())
            }
            Entry::Vacant(slot) => Arc::clone(slot.insert(device)),
        }
    }

    pub fn get(&self, key: &DeviceKey) -> Option<Arc<Device>> {
        self.devices
            .read()
            .expect("registry lock poisoned")
            .get(key)
            .cloned()
    }

    /// Resolve a user-supplied identifier: a full `{org}_{group}_{device}`
    /// key, or a bare device id when it is unambiguous.
    pub fn find(&self, identifier: &str) -> Option<Arc<Device>> {
        if let Some(device) = DeviceKey::parse(identifier).and_then(|key| self.get(&key)) {
            return Some(device);
        }

        let devices = self.devices.read().expect("registry lock poisoned");
        let mut matches = devices
            .values()
            .filter(|d| d.device_id().as_str() == identifier);
        let first = matches.next()?;
        if matches.next().is_some() {
            warn!(identifier, "device id matches several groups; use the full key");
            return None;
        }
        Some(Arc::clone(first))
    }

    /// Snapshot of all devices, in registration order.
    pub fn all(&self) -> Vec<Arc<Device>> {
        self.devices
            .read()
            .expect("registry lock poisoned")
            .values()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.devices.read().expect("registry lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use incontrol_api::{ApiConnection, TokenRecord, TransportConfig};
    use url::Url;

    use super::*;

    fn connection() -> Arc<ApiConnection> {
        Arc::new(
            ApiConnection::new(
                &Url::parse("http://127.0.0.1:9/rest/").expect("url"),
                TokenRecord::issued("a".into(), "r".into(), 3600, 0),
                &TransportConfig::default(),
            )
            .expect("connection"),
        )
    }

    fn device(conn: &Arc<ApiConnection>, org: &str, group: i64, id: i64, name: &str) -> Arc<Device> {
        Arc::new(Device::new(
            DeviceKey::new(org.into(), group.into(), id.into()),
            Some(name.into()),
            Arc::clone(conn),
            Duration::ZERO,
        ))
    }

    #[test]
    fn duplicate_key_keeps_first_instance() {
        let conn = connection();
        let registry = DeviceRegistry::new();

        let first = registry.register(device(&conn, "o1", 1, 10, "first"));
        let kept = registry.register(device(&conn, "o1", 1, 10, "second"));

        assert!(Arc::ptr_eq(&first, &kept));
        assert_eq!(registry.len(), 1);
        assert_eq!(kept.name(), "first");
    }

    #[test]
    fn find_by_key_or_unambiguous_id() {
        let conn = connection();
        let registry = DeviceRegistry::new();
        registry.register(device(&conn, "o1", 1, 10, "a"));
        registry.register(device(&conn, "o1", 2, 10, "b"));
        registry.register(device(&conn, "o1", 2, 11, "c"));

        assert_eq!(registry.find("o1_2_10").expect("by key").name(), "b");
        assert_eq!(registry.find("11").expect("by id").name(), "c");
        assert!(registry.find("10").is_none(), "ambiguous id");
        assert!(registry.find("99").is_none());
    }

    #[test]
    fn all_preserves_registration_order() {
        let conn = connection();
        let registry = DeviceRegistry::new();
        for id in [3, 1, 2] {
            registry.register(device(&conn, "o", 1, id, "d"));
        }
        let ids: Vec<String> = registry
            .all()
            .iter()
            .map(|d| d.device_id().to_string())
            .collect();
        assert_eq!(ids, ["3", "1", "2"]);
    }
}
