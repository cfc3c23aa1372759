// REST resource endpoints
//
// The vendor tree is org → group → device, with three facets hanging off
// each device: metadata, GPS location and WAN interfaces.

use tracing::debug;

use crate::connection::ApiConnection;
use crate::error::Error;
use crate::models::{
    DeviceMetadata, DeviceSummary, GroupRecord, LocationFix, OrgRecord, ResourceId, WanInterface,
};

/// `o/{org}/g/{group}/d/{device}`
pub fn device_path(org_id: &ResourceId, group_id: &ResourceId, device_id: &ResourceId) -> String {
    format!("o/{org_id}/g/{group_id}/d/{device_id}")
}

impl ApiConnection {
    /// List organizations visible to the token.
    ///
    /// `GET o`
    pub async fn list_orgs(&self) -> Result<Vec<OrgRecord>, Error> {
        debug!("listing organizations");
        self.get_list("o").await
    }

    /// List the groups of an organization.
    ///
    /// `GET o/{org}/g`
    pub async fn list_groups(&self, org_id: &ResourceId) -> Result<Vec<GroupRecord>, Error> {
        debug!(%org_id, "listing groups");
        self.get_list(&format!("o/{org_id}/g")).await
    }

    /// List the devices of a group.
    ///
    /// `GET o/{org}/g/{group}/d`
    pub async fn list_devices(
        &self,
        org_id: &ResourceId,
        group_id: &ResourceId,
    ) -> Result<Vec<DeviceSummary>, Error> {
        debug!(%org_id, %group_id, "listing devices");
        self.get_list(&format!("o/{org_id}/g/{group_id}/d")).await
    }

    /// Fetch device metadata (name, product, firmware, status).
    ///
    /// `GET o/{org}/g/{group}/d/{device}`
    pub async fn get_device(
        &self,
        org_id: &ResourceId,
        group_id: &ResourceId,
        device_id: &ResourceId,
    ) -> Result<Option<DeviceMetadata>, Error> {
        self.get_data(&device_path(org_id, group_id, device_id))
            .await
    }

    /// Fetch the device's recorded GPS fixes, newest first.
    ///
    /// `GET o/{org}/g/{group}/d/{device}/loc`
    pub async fn get_location(
        &self,
        org_id: &ResourceId,
        group_id: &ResourceId,
        device_id: &ResourceId,
    ) -> Result<Vec<LocationFix>, Error> {
        let path = format!("{}/loc", device_path(org_id, group_id, device_id));
        self.get_list(&path).await
    }

    /// Fetch the device's WAN interface list.
    ///
    /// `GET o/{org}/g/{group}/d/{device}/info/interfaces`
    pub async fn get_interfaces(
        &self,
        org_id: &ResourceId,
        group_id: &ResourceId,
        device_id: &ResourceId,
    ) -> Result<Vec<WanInterface>, Error> {
        let path = format!(
            "{}/info/interfaces",
            device_path(org_id, group_id, device_id)
        );
        self.get_list(&path).await
    }
}
