// ── Entities ──
//
// Read-only views derived from devices: a status sensor and a location
// tracker per device, plus a signal sensor and a link-status sensor per WAN
// interface. Each entity caches what it shows and refreshes that cache when
// its device notifies it after an update.

use std::sync::{Arc, RwLock};

use incontrol_api::{ResourceId, WanInterface};
use serde::Serialize;
use strum::Display;
use tracing::debug;

use crate::device::{Device, DeviceObserver};
use crate::model::{DeviceKey, Location};
use crate::registry::DeviceRegistry;

/// Identifier namespace used in `DeviceInfo::identifiers`.
pub const DOMAIN: &str = "incontrol2";

pub const MANUFACTURER: &str = "Peplink";

/// Signal-strength icons indexed by `signal_bar` (0–5).
const SIGNAL_ICONS: [&str; 6] = [
    "mdi:network-strength-off-outline",
    "mdi:network-strength-outline",
    "mdi:network-strength-1",
    "mdi:network-strength-2",
    "mdi:network-strength-3",
    "mdi:network-strength-4",
];

/// Link state of a WAN interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ConnectivityState {
    Connected,
    Disconnected,
}

impl ConnectivityState {
    pub fn of(wan: &WanInterface) -> Self {
        if wan.is_connected() {
            Self::Connected
        } else {
            Self::Disconnected
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Gps,
}

/// The icon for a signal bar count; anything outside 0–5 shows "off".
pub fn signal_icon(signal_bar: Option<i64>) -> &'static str {
    signal_bar
        .and_then(|bar| usize::try_from(bar).ok())
        .and_then(|idx| SIGNAL_ICONS.get(idx))
        .copied()
        .unwrap_or(SIGNAL_ICONS[0])
}

// ── Common surface ──────────────────────────────────────────────────

/// What every entity exposes to a front end.
pub trait Entity: Send + Sync {
    fn unique_id(&self) -> String;
    fn name(&self) -> String;
    /// Human-readable state.
    fn state_text(&self) -> String;
    fn icon(&self) -> &'static str;
}

/// Hardware registry record shared by all entities of one device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceInfo {
    pub identifiers: Vec<(String, String)>,
    pub name: Option<String>,
    pub manufacturer: &'static str,
    pub model: Option<String>,
    pub sw_version: Option<String>,
}

impl DeviceInfo {
    pub fn from_device(device: &Device) -> Self {
        let metadata = device.metadata();
        Self {
            identifiers: vec![(DOMAIN.to_owned(), device.key().to_string())],
            name: metadata.name,
            manufacturer: MANUFACTURER,
            model: metadata.product_name,
            sw_version: metadata.fw_ver,
        }
    }
}

// ── Device status sensor ────────────────────────────────────────────

#[derive(Debug)]
struct StatusView {
    device_name: String,
    status: Option<String>,
    info: DeviceInfo,
}

/// Lifecycle status of a device; a problem whenever it is not `"online"`.
#[derive(Debug)]
pub struct DeviceStatusSensor {
    key: DeviceKey,
    view: RwLock<StatusView>,
}

impl DeviceStatusSensor {
    /// Build the sensor from current device state and subscribe it.
    pub fn attach(device: &Device) -> Arc<Self> {
        let sensor = Arc::new(Self {
            key: device.key().clone(),
            view: RwLock::new(StatusView::read(device)),
        });
        device.add_observer(&sensor);
        sensor
    }

    pub fn key(&self) -> &DeviceKey {
        &self.key
    }

    pub fn state(&self) -> Option<String> {
        self.view.read().expect("entity lock poisoned").status.clone()
    }

    pub fn is_problem(&self) -> bool {
        self.view.read().expect("entity lock poisoned").status.as_deref() != Some("online")
    }

    pub fn device_info(&self) -> DeviceInfo {
        self.view.read().expect("entity lock poisoned").info.clone()
    }
}

impl StatusView {
    fn read(device: &Device) -> Self {
        Self {
            device_name: device.name(),
            status: device.status(),
            info: DeviceInfo::from_device(device),
        }
    }
}

impl DeviceObserver for DeviceStatusSensor {
    fn device_updated(&self, device: &Device) {
        *self.view.write().expect("entity lock poisoned") = StatusView::read(device);
    }
}

impl Entity for DeviceStatusSensor {
    fn unique_id(&self) -> String {
        self.key.to_string()
    }

    fn name(&self) -> String {
        let view = self.view.read().expect("entity lock poisoned");
        format!("{} Status", view.device_name)
    }

    fn state_text(&self) -> String {
        self.state().unwrap_or_else(|| "unknown".into())
    }

    fn icon(&self) -> &'static str {
        "mdi:van-utility"
    }
}

// ── WAN binding ─────────────────────────────────────────────────────

/// A WAN record tracked by id across device updates.
#[derive(Debug)]
struct WanBinding {
    key: DeviceKey,
    wan_id: ResourceId,
    view: RwLock<WanView>,
}

#[derive(Debug)]
struct WanView {
    device_name: String,
    wan: WanInterface,
}

impl WanBinding {
    fn new(device: &Device, wan: WanInterface) -> Self {
        Self {
            key: device.key().clone(),
            wan_id: wan.id.clone(),
            view: RwLock::new(WanView {
                device_name: device.name(),
                wan,
            }),
        }
    }

    /// Re-resolve the WAN record by id. A vanished id keeps the cached
    /// record and returns `false`.
    fn refresh(&self, device: &Device) -> bool {
        let Some(wan) = device.wan(&self.wan_id) else {
            debug!(device = %self.key, wan = %self.wan_id, "WAN id not found in update");
            return false;
        };
        *self.view.write().expect("entity lock poisoned") = WanView {
            device_name: device.name(),
            wan,
        };
        true
    }

    fn wan(&self) -> WanInterface {
        self.view.read().expect("entity lock poisoned").wan.clone()
    }

    fn label(&self, suffix: &str) -> String {
        let view = self.view.read().expect("entity lock poisoned");
        let wan_name = view.wan.name.as_deref().unwrap_or("WAN");
        format!("{} {wan_name} {suffix}", view.device_name)
    }
}

// ── WAN signal sensor ───────────────────────────────────────────────

/// Signal strength of one WAN interface, in dB.
#[derive(Debug)]
pub struct WanSignalSensor {
    binding: WanBinding,
}

impl WanSignalSensor {
    pub const UNIT: &'static str = "dB";

    pub fn attach(device: &Device, wan: WanInterface) -> Arc<Self> {
        let sensor = Arc::new(Self {
            binding: WanBinding::new(device, wan),
        });
        device.add_observer(&sensor);
        sensor
    }

    pub fn wan_id(&self) -> &ResourceId {
        &self.binding.wan_id
    }

    pub fn signal(&self) -> Option<f64> {
        self.binding.view.read().expect("entity lock poisoned").wan.signal
    }

    pub fn signal_bar(&self) -> Option<i64> {
        self.binding.view.read().expect("entity lock poisoned").wan.signal_bar
    }

    pub fn unit(&self) -> &'static str {
        Self::UNIT
    }

    /// The WAN record as last resolved.
    pub fn wan(&self) -> WanInterface {
        self.binding.wan()
    }

    pub fn refresh(&self, device: &Device) -> bool {
        self.binding.refresh(device)
    }
}

impl DeviceObserver for WanSignalSensor {
    fn device_updated(&self, device: &Device) {
        self.refresh(device);
    }
}

impl Entity for WanSignalSensor {
    fn unique_id(&self) -> String {
        format!("{}_wan_{}", self.binding.key, self.binding.wan_id)
    }

    fn name(&self) -> String {
        self.binding.label("Signal")
    }

    fn state_text(&self) -> String {
        self.signal()
            .map_or_else(|| "unknown".into(), |s| format!("{s} {}", Self::UNIT))
    }

    fn icon(&self) -> &'static str {
        signal_icon(self.signal_bar())
    }
}

// ── WAN status sensor ───────────────────────────────────────────────

/// Link connectivity of one WAN interface.
#[derive(Debug)]
pub struct WanStatusSensor {
    binding: WanBinding,
}

impl WanStatusSensor {
    pub fn attach(device: &Device, wan: WanInterface) -> Arc<Self> {
        let sensor = Arc::new(Self {
            binding: WanBinding::new(device, wan),
        });
        device.add_observer(&sensor);
        sensor
    }

    pub fn wan_id(&self) -> &ResourceId {
        &self.binding.wan_id
    }

    pub fn connectivity(&self) -> ConnectivityState {
        ConnectivityState::of(&self.binding.view.read().expect("entity lock poisoned").wan)
    }

    pub fn is_connected(&self) -> bool {
        self.connectivity() == ConnectivityState::Connected
    }

    /// Disabled interfaces are still tracked but hidden by default.
    pub fn enabled_by_default(&self) -> bool {
        self.binding.view.read().expect("entity lock poisoned").wan.is_enabled()
    }

    pub fn wan(&self) -> WanInterface {
        self.binding.wan()
    }

    /// Re-read the WAN record from `device`; `false` if it disappeared.
    pub fn refresh(&self, device: &Device) -> bool {
        self.binding.refresh(device)
    }
}

impl DeviceObserver for WanStatusSensor {
    fn device_updated(&self, device: &Device) {
        self.refresh(device);
    }
}

impl Entity for WanStatusSensor {
    fn unique_id(&self) -> String {
        format!("{}_wan_status_{}", self.binding.key, self.binding.wan_id)
    }

    fn name(&self) -> String {
        self.binding.label("Status")
    }

    fn state_text(&self) -> String {
        self.connectivity().to_string()
    }

    fn icon(&self) -> &'static str {
        if self.is_connected() {
            "mdi:lan-connect"
        } else {
            "mdi:lan-disconnect"
        }
    }
}

// ── Location tracker ────────────────────────────────────────────────

/// GPS position of a device.
#[derive(Debug)]
pub struct LocationTracker {
    key: DeviceKey,
    view: RwLock<(String, Location)>,
}

impl LocationTracker {
    pub fn attach(device: &Device) -> Arc<Self> {
        let tracker = Arc::new(Self {
            key: device.key().clone(),
            view: RwLock::new((device.name(), device.location())),
        });
        device.add_observer(&tracker);
        tracker
    }

    pub fn latitude(&self) -> Option<f64> {
        self.view.read().expect("entity lock poisoned").1.latitude
    }

    pub fn longitude(&self) -> Option<f64> {
        self.view.read().expect("entity lock poisoned").1.longitude
    }

    pub fn source_type(&self) -> SourceType {
        SourceType::Gps
    }

    pub fn location(&self) -> Location {
        self.view.read().expect("entity lock poisoned").1.clone()
    }
}

impl DeviceObserver for LocationTracker {
    fn device_updated(&self, device: &Device) {
        *self.view.write().expect("entity lock poisoned") = (device.name(), device.location());
    }
}

impl Entity for LocationTracker {
    fn unique_id(&self) -> String {
        self.key.to_string()
    }

    fn name(&self) -> String {
        format!("{} Location", self.view.read().expect("entity lock poisoned").0)
    }

    fn state_text(&self) -> String {
        match self.location().coordinates() {
            Some((lat, lon)) => format!("{lat:.5}, {lon:.5}"),
            None => "unknown".into(),
        }
    }

    fn icon(&self) -> &'static str {
        "mdi:map-marker"
    }
}

// ── Entity set ──────────────────────────────────────────────────────

/// Strong owner of every entity built for a registry.
///
/// Devices only hold weak references, so entities live exactly as long as
/// the set that created them.
#[derive(Debug, Default)]
pub struct EntitySet {
    pub statuses: Vec<Arc<DeviceStatusSensor>>,
    pub trackers: Vec<Arc<LocationTracker>>,
    pub signals: Vec<Arc<WanSignalSensor>>,
    pub wan_statuses: Vec<Arc<WanStatusSensor>>,
}

impl EntitySet {
    /// One status sensor and tracker per device, plus a signal and a
    /// status sensor per WAN interface known at attach time.
    pub fn attach_all(registry: &DeviceRegistry) -> Self {
        let mut set = Self::default();
        for device in registry.all() {
            set.statuses.push(DeviceStatusSensor::attach(&device));
            set.trackers.push(LocationTracker::attach(&device));
            for wan in device.wans() {
                set.signals.push(WanSignalSensor::attach(&device, wan.clone()));
                set.wan_statuses.push(WanStatusSensor::attach(&device, wan));
            }
        }
        debug!(entities = set.len(), "attached entities");
        set
    }

    /// All entities as trait objects, device by device.
    pub fn entities(&self) -> Vec<Arc<dyn Entity>> {
        fn erase<E: Entity + 'static>(entity: &Arc<E>) -> Arc<dyn Entity> {
            let concrete: Arc<E> = Arc::clone(entity);
            concrete
        }

        let mut all = Vec::with_capacity(self.len());
        all.extend(self.statuses.iter().map(erase));
        all.extend(self.trackers.iter().map(erase));
        all.extend(self.signals.iter().map(erase));
        all.extend(self.wan_statuses.iter().map(erase));
        all
    }

    pub fn len(&self) -> usize {
        self.statuses.len() + self.trackers.len() + self.signals.len() + self.wan_statuses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signal_icon_covers_every_bar_and_falls_back() {
        assert_eq!(signal_icon(Some(0)), "mdi:network-strength-off-outline");
        assert_eq!(signal_icon(Some(3)), "mdi:network-strength-2");
        assert_eq!(signal_icon(Some(5)), "mdi:network-strength-4");
        assert_eq!(signal_icon(Some(6)), "mdi:network-strength-off-outline");
        assert_eq!(signal_icon(Some(-1)), "mdi:network-strength-off-outline");
        assert_eq!(signal_icon(None), "mdi:network-strength-off-outline");
    }

    #[test]
    fn connectivity_renders_lowercase() {
        let wan: WanInterface = serde_json::from_value(serde_json::json!({
            "id": 1, "status": "Connected (LTE)"
        }))
        .expect("wan");
        assert_eq!(ConnectivityState::of(&wan).to_string(), "connected");
        assert_eq!(SourceType::Gps.to_string(), "gps");
    }
}
