use std::sync::Arc;

use incontrol_api::ResourceId;

use crate::device::Device;

/// A discovered organization and its groups, in API order.
///
/// Built once per discovery pass and never mutated afterwards.
#[derive(Debug, Clone)]
pub struct Org {
    pub id: ResourceId,
    pub name: Option<String>,
    pub status: Option<String>,
    pub groups: Vec<Group>,
}

/// A discovered group and its devices, in API order.
#[derive(Debug, Clone)]
pub struct Group {
    pub id: ResourceId,
    pub name: Option<String>,
    pub org_id: ResourceId,
    pub devices: Vec<Arc<Device>>,
}

impl Org {
    /// Every device under this organization, depth-first.
    pub fn devices(&self) -> impl Iterator<Item = &Arc<Device>> {
        self.groups.iter().flat_map(|g| g.devices.iter())
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(self.id.as_str())
    }
}

impl Group {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(self.id.as_str())
    }
}
