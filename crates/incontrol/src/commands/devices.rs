//! Device command handlers.

use std::fmt::Write;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tabled::Tabled;

use incontrol_core::{Device, Location, Session};

use crate::cli::{DevicesArgs, DevicesCommand, GlobalOpts};
use crate::error::CliError;
use crate::output;

// ── Views ───────────────────────────────────────────────────────────

#[derive(Serialize)]
struct DeviceView {
    key: String,
    org_id: String,
    group_id: String,
    device_id: String,
    name: String,
    status: Option<String>,
    product: Option<String>,
    firmware: Option<String>,
    serial: Option<String>,
    wans: usize,
    location: Location,
    last_updated: Option<DateTime<Utc>>,
}

impl From<&Arc<Device>> for DeviceView {
    fn from(d: &Arc<Device>) -> Self {
        let snapshot = d.snapshot();
        let metadata = &snapshot.metadata;
        Self {
            key: d.key().to_string(),
            org_id: d.org_id().to_string(),
            group_id: d.group_id().to_string(),
            device_id: d.device_id().to_string(),
            name: d.name(),
            status: metadata.status.clone(),
            product: metadata.product_name.clone(),
            firmware: metadata.fw_ver.clone(),
            serial: metadata.sn.clone(),
            wans: snapshot.wans.len(),
            location: snapshot.location.clone(),
            last_updated: snapshot.updated_at,
        }
    }
}

#[derive(Tabled)]
struct DeviceRow {
    #[tabled(rename = "Key")]
    key: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Model")]
    product: String,
    #[tabled(rename = "Firmware")]
    firmware: String,
    #[tabled(rename = "WANs")]
    wans: usize,
    #[tabled(rename = "GPS")]
    gps: String,
}

impl From<&DeviceView> for DeviceRow {
    fn from(v: &DeviceView) -> Self {
        Self {
            key: v.key.clone(),
            name: v.name.clone(),
            status: output::or_dash(v.status.as_ref()),
            product: output::or_dash(v.product.as_ref()),
            firmware: output::or_dash(v.firmware.as_ref()),
            wans: v.wans,
            gps: coordinates(&v.location),
        }
    }
}

fn coordinates(location: &Location) -> String {
    location
        .coordinates()
        .map_or_else(|| "-".into(), |(lat, lon)| format!("{lat:.5}, {lon:.5}"))
}

fn device_detail(v: &DeviceView) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Key:          {}", v.key);
    let _ = writeln!(out, "Name:         {}", v.name);
    let _ = writeln!(out, "Status:       {}", output::or_dash(v.status.as_ref()));
    let _ = writeln!(out, "Model:        {}", output::or_dash(v.product.as_ref()));
    let _ = writeln!(out, "Firmware:     {}", output::or_dash(v.firmware.as_ref()));
    let _ = writeln!(out, "Serial:       {}", output::or_dash(v.serial.as_ref()));
    let _ = writeln!(out, "WANs:         {}", v.wans);
    let _ = writeln!(out, "Location:     {}", coordinates(&v.location));
    let _ = write!(
        out,
        "Last update:  {}",
        output::or_dash(v.last_updated.map(|t| t.to_rfc3339()))
    );
    out
}

fn location_detail(location: &Location) -> String {
    if location.is_empty() {
        return "No location reported".into();
    }
    let mut out = String::new();
    let _ = writeln!(out, "Latitude:   {}", output::or_dash(location.latitude));
    let _ = writeln!(out, "Longitude:  {}", output::or_dash(location.longitude));
    let _ = writeln!(out, "Altitude:   {}", output::or_dash(location.altitude));
    let _ = writeln!(out, "Speed:      {}", output::or_dash(location.speed));
    let _ = write!(
        out,
        "Timestamp:  {}",
        output::or_dash(location.timestamp.as_ref())
    );
    out
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(session: &Session, args: DevicesArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        DevicesCommand::List => {
            let views: Vec<DeviceView> = session.devices().iter().map(DeviceView::from).collect();
            let out =
                output::render_list(&global.output, &views, |v| DeviceRow::from(v), |v| v.key.clone())?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        DevicesCommand::Get { device } => {
            let view = DeviceView::from(&session.device(&device)?);
            let out =
                output::render_single(&global.output, &view, device_detail, |v| v.key.clone())?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        DevicesCommand::Location { device } => {
            let location = session.device(&device)?.location();
            let out = output::render_single(&global.output, &location, location_detail, |l| {
                l.coordinates()
                    .map(|(lat, lon)| format!("{lat},{lon}"))
                    .unwrap_or_default()
            })?;
            output::print_output(&out, global.quiet);
            Ok(())
        }
    }
}
