// ── Hierarchy discovery ──
//
// Walks org → group → device strictly sequentially and depth-first. A
// failed listing at any level counts as "no children" for that subtree
// only; siblings keep going. Every device is registered and updated once
// before it is returned, so callers never see an unpolled device.

use std::sync::Arc;
use std::time::Duration;

use incontrol_api::{ApiConnection, ResourceId};
use tracing::{info, warn};

use crate::device::Device;
use crate::model::{DeviceKey, Group, Org};
use crate::registry::DeviceRegistry;

/// One discovery pass over an account.
pub struct Discovery<'a> {
    connection: &'a Arc<ApiConnection>,
    registry: &'a DeviceRegistry,
    min_update_interval: Duration,
}

impl<'a> Discovery<'a> {
    pub fn new(
        connection: &'a Arc<ApiConnection>,
        registry: &'a DeviceRegistry,
        min_update_interval: Duration,
    ) -> Self {
        Self {
            connection,
            registry,
            min_update_interval,
        }
    }

    /// `GET o`, then groups and devices for each organization.
    ///
    /// An empty result means either the account has no organizations or
    /// the listing failed; both are logged.
    pub async fn discover_orgs(&self) -> Vec<Org> {
        let records = match self.connection.list_orgs().await {
            Ok(records) => records,
            Err(e) => {
                warn!(error = %e, "organization listing failed");
                return Vec::new();
            }
        };

        let mut orgs = Vec::with_capacity(records.len());
        for record in records {
            info!(org = %record.id, name = record.name.as_deref().unwrap_or("-"), "found organization");
            let groups = self.discover_groups(&record.id).await;
            orgs.push(Org {
                id: record.id,
                name: record.name,
                status: record.status,
                groups,
            });
        }
        orgs
    }

    /// `GET o/{org}/g`, then devices for each group.
    pub async fn discover_groups(&self, org_id: &ResourceId) -> Vec<Group> {
        let records = match self.connection.list_groups(org_id).await {
            Ok(records) => records,
            Err(e) => {
                warn!(org = %org_id, error = %e, "group listing failed");
                return Vec::new();
            }
        };

        let mut groups = Vec::with_capacity(records.len());
        for record in records {
            info!(org = %org_id, group = %record.id, "found group");
            let devices = self.discover_devices(org_id, &record.id).await;
            groups.push(Group {
                id: record.id,
                name: record.name,
                org_id: org_id.clone(),
                devices,
            });
        }
        groups
    }

    /// `GET o/{org}/g/{group}/d`, registering and updating each device.
    pub async fn discover_devices(
        &self,
        org_id: &ResourceId,
        group_id: &ResourceId,
    ) -> Vec<Arc<Device>> {
        let records = match self.connection.list_devices(org_id, group_id).await {
            Ok(records) => records,
            Err(e) => {
                warn!(org = %org_id, group = %group_id, error = %e, "device listing failed");
                return Vec::new();
            }
        };

        let mut devices = Vec::with_capacity(records.len());
        for record in records {
            let key = DeviceKey::new(org_id.clone(), group_id.clone(), record.id);
            info!(device = %key, "found device");

            let device = self.registry.register(Arc::new(Device::new(
                key,
                record.name,
                Arc::clone(self.connection),
                self.min_update_interval,
            )));
            device.update().await;
            devices.push(device);
        }
        devices
    }
}
