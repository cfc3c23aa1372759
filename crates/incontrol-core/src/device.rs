// ── Device ──
//
// One physical router. Holds the last polled snapshot (metadata, GPS
// location, WAN list), throttles its own refresh rate and notifies weakly
// held observers after every real update.

use std::fmt;
use std::sync::{Arc, Mutex, Weak};
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use incontrol_api::{ApiConnection, DeviceMetadata, ResourceId, WanInterface};
use tracing::{debug, info, warn};

use crate::model::{DeviceKey, Location};

/// Receives a callback after each non-throttled device update.
///
/// Called synchronously on the updating task; implementations should only
/// re-read device state, never block.
pub trait DeviceObserver: Send + Sync {
    fn device_updated(&self, device: &Device);
}

/// Immutable view of a device's last poll.
#[derive(Debug, Clone, Default)]
pub struct DeviceSnapshot {
    pub metadata: DeviceMetadata,
    pub location: Location,
    pub wans: Vec<WanInterface>,
    /// When the last real update finished; `None` until the first one.
    pub updated_at: Option<DateTime<Utc>>,
}

pub struct Device {
    key: DeviceKey,
    /// Name from the group listing, used until metadata arrives.
    listed_name: Option<String>,
    connection: Arc<ApiConnection>,
    state: ArcSwap<DeviceSnapshot>,
    min_update_interval: Duration,
    last_update: Mutex<Option<Instant>>,
    observers: Mutex<Vec<Weak<dyn DeviceObserver>>>,
}

impl Device {
    pub fn new(
        key: DeviceKey,
        listed_name: Option<String>,
        connection: Arc<ApiConnection>,
        min_update_interval: Duration,
    ) -> Self {
        Self {
            key,
            listed_name,
            connection,
            state: ArcSwap::from_pointee(DeviceSnapshot::default()),
            min_update_interval,
            last_update: Mutex::new(None),
            observers: Mutex::new(Vec::new()),
        }
    }

    // ── Update ───────────────────────────────────────────────────────

    /// Poll metadata, location and WAN interfaces, in that order.
    ///
    /// Returns `false` without any I/O when the previous update started less
    /// than `min_update_interval` ago. Otherwise each facet is fetched
    /// independently and replaced unconditionally: a failed fetch blanks
    /// that facet until the next successful poll. Observers are notified
    /// and `true` is returned even if every fetch came back empty.
    pub async fn update(&self) -> bool {
        if !self.claim_update_slot() {
            debug!(device = %self.key, "update throttled");
            return false;
        }

        let conn = &self.connection;
        let DeviceKey {
            org_id,
            group_id,
            device_id,
        } = &self.key;

        let metadata = match conn.get_device(org_id, group_id, device_id).await {
            Ok(Some(metadata)) => metadata,
            Ok(None) => {
                warn!(device = %self.key, "device metadata empty");
                DeviceMetadata::default()
            }
            Err(e) => {
                warn!(device = %self.key, error = %e, "device metadata fetch failed");
                DeviceMetadata::default()
            }
        };

        let location = match conn.get_location(org_id, group_id, device_id).await {
            Ok(fixes) => Location::from_fixes(fixes),
            Err(e) => {
                warn!(device = %self.key, error = %e, "device location fetch failed");
                Location::default()
            }
        };

        let wans = match conn.get_interfaces(org_id, group_id, device_id).await {
            Ok(wans) => wans,
            Err(e) => {
                warn!(device = %self.key, error = %e, "device WAN fetch failed");
                Vec::new()
            }
        };

        info!(
            device = %self.key,
            name = metadata.name.as_deref().unwrap_or("-"),
            status = metadata.status.as_deref().unwrap_or("unknown"),
            wans = wans.len(),
            "device updated"
        );
        self.state.store(Arc::new(DeviceSnapshot {
            metadata,
            location,
            wans,
            updated_at: Some(Utc::now()),
        }));

        self.notify_observers();
        true
    }

    /// Stamp the update time if the throttle window has passed.
    fn claim_update_slot(&self) -> bool {
        let mut last = self.last_update.lock().expect("throttle lock poisoned");
        let now = Instant::now();
        if last.is_some_and(|prev| now.duration_since(prev) < self.min_update_interval) {
            return false;
        }
        *last = Some(now);
        true
    }

    // ── Observers ────────────────────────────────────────────────────

    /// Register an observer. Only a weak reference is kept; dropped
    /// observers are pruned on the next notification.
    pub fn add_observer<O: DeviceObserver + 'static>(&self, observer: &Arc<O>) {
        let weak: Weak<O> = Arc::downgrade(observer);
        let weak: Weak<dyn DeviceObserver> = weak;
        self.observers
            .lock()
            .expect("observer lock poisoned")
            .push(weak);
    }

    /// Number of observers still alive.
    pub fn observer_count(&self) -> usize {
        self.observers
            .lock()
            .expect("observer lock poisoned")
            .iter()
            .filter(|w| w.strong_count() > 0)
            .count()
    }

    fn notify_observers(&self) {
        let live: Vec<Arc<dyn DeviceObserver>> = {
            let mut observers = self.observers.lock().expect("observer lock poisoned");
            observers.retain(|w| w.strong_count() > 0);
            observers.iter().filter_map(Weak::upgrade).collect()
        };
        for observer in live {
            observer.device_updated(self);
        }
    }

    // ── Accessors ────────────────────────────────────────────────────

    pub fn key(&self) -> &DeviceKey {
        &self.key
    }

    pub fn device_id(&self) -> &ResourceId {
        &self.key.device_id
    }

    pub fn org_id(&self) -> &ResourceId {
        &self.key.org_id
    }

    pub fn group_id(&self) -> &ResourceId {
        &self.key.group_id
    }

    /// The full last-polled snapshot.
    pub fn snapshot(&self) -> Arc<DeviceSnapshot> {
        self.state.load_full()
    }

    /// Display name: metadata name, else the listing name, else the id.
    pub fn name(&self) -> String {
        self.state
            .load()
            .metadata
            .name
            .clone()
            .or_else(|| self.listed_name.clone())
            .unwrap_or_else(|| self.key.device_id.to_string())
    }

    /// Lifecycle status as reported by the API (`"online"`, `"offline"`, ...).
    pub fn status(&self) -> Option<String> {
        self.state.load().metadata.status.clone()
    }

    pub fn is_online(&self) -> bool {
        self.state.load().metadata.status.as_deref() == Some("online")
    }

    pub fn metadata(&self) -> DeviceMetadata {
        self.state.load().metadata.clone()
    }

    pub fn location(&self) -> Location {
        self.state.load().location.clone()
    }

    pub fn wans(&self) -> Vec<WanInterface> {
        self.state.load().wans.clone()
    }

    /// Look up a WAN record by interface id.
    pub fn wan(&self, wan_id: &ResourceId) -> Option<WanInterface> {
        self.state
            .load()
            .wans
            .iter()
            .find(|w| &w.id == wan_id)
            .cloned()
    }

    pub fn last_updated(&self) -> Option<DateTime<Utc>> {
        self.state.load().updated_at
    }
}

impl fmt::Debug for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Device")
            .field("key", &self.key)
            .field("name", &self.name())
            .field("updated_at", &self.last_updated())
            .finish_non_exhaustive()
    }
}
