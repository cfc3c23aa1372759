use std::fmt;

use incontrol_api::ResourceId;
use serde::{Deserialize, Serialize};

/// Composite device identity: `(org_id, group_id, device_id)`.
///
/// Device ids are only unique within a group, so every externally visible
/// identifier is derived from the full triple. `Display` renders the
/// entity unique id form `{org}_{group}_{device}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeviceKey {
    pub org_id: ResourceId,
    pub group_id: ResourceId,
    pub device_id: ResourceId,
}

impl DeviceKey {
    pub fn new(org_id: ResourceId, group_id: ResourceId, device_id: ResourceId) -> Self {
        Self {
            org_id,
            group_id,
            device_id,
        }
    }

    /// Parse the `{org}_{group}_{device}` form.
    ///
    /// Org ids may themselves contain underscores, so the group and device
    /// ids are taken from the right.
    pub fn parse(raw: &str) -> Option<Self> {
        let (rest, device) = raw.rsplit_once('_')?;
        let (org, group) = rest.rsplit_once('_')?;
        if org.is_empty() || group.is_empty() || device.is_empty() {
            return None;
        }
        Some(Self::new(org.into(), group.into(), device.into()))
    }

    /// REST path of the device, `o/{org}/g/{group}/d/{device}`.
    pub fn path(&self) -> String {
        incontrol_api::resources::device_path(&self.org_id, &self.group_id, &self.device_id)
    }
}

impl fmt::Display for DeviceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}_{}", self.org_id, self.group_id, self.device_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_and_parse_agree() {
        let key = DeviceKey::new("org_a".into(), 12.into(), 345.into());
        assert_eq!(key.to_string(), "org_a_12_345");
        assert_eq!(DeviceKey::parse("org_a_12_345"), Some(key));
    }

    #[test]
    fn parse_rejects_short_forms() {
        assert!(DeviceKey::parse("345").is_none());
        assert!(DeviceKey::parse("12_345").is_none());
        assert!(DeviceKey::parse("_12_345").is_none());
    }

    #[test]
    fn path_follows_rest_layout() {
        let key = DeviceKey::new("a1".into(), 7.into(), 42.into());
        assert_eq!(key.path(), "o/a1/g/7/d/42");
    }
}
