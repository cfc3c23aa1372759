//! WAN interface command handlers.

use std::sync::Arc;

use serde::Serialize;
use tabled::Tabled;

use incontrol_core::{ConnectivityState, Device, Session, WanInterface, signal_icon};

use crate::cli::{GlobalOpts, WansArgs, WansCommand};
use crate::error::CliError;
use crate::output;

#[derive(Serialize)]
struct WanView {
    device: String,
    device_name: String,
    id: String,
    name: Option<String>,
    kind: Option<String>,
    status: Option<String>,
    connectivity: ConnectivityState,
    signal: Option<f64>,
    signal_bar: Option<i64>,
    icon: &'static str,
    enabled: bool,
}

impl WanView {
    fn new(device: &Device, wan: &WanInterface) -> Self {
        Self {
            device: device.key().to_string(),
            device_name: device.name(),
            id: wan.id.to_string(),
            name: wan.name.clone(),
            kind: wan.kind.clone(),
            status: wan.status.clone(),
            connectivity: ConnectivityState::of(wan),
            signal: wan.signal,
            signal_bar: wan.signal_bar,
            icon: signal_icon(wan.signal_bar),
            enabled: wan.is_enabled(),
        }
    }
}

#[derive(Tabled)]
struct WanRow {
    #[tabled(rename = "Device")]
    device: String,
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Type")]
    kind: String,
    #[tabled(rename = "Link")]
    connectivity: String,
    #[tabled(rename = "Signal (dB)")]
    signal: String,
    #[tabled(rename = "Bars")]
    signal_bar: String,
    #[tabled(rename = "Enabled")]
    enabled: String,
}

impl From<&WanView> for WanRow {
    fn from(v: &WanView) -> Self {
        Self {
            device: v.device_name.clone(),
            id: v.id.clone(),
            name: output::or_dash(v.name.as_ref()),
            kind: output::or_dash(v.kind.as_ref()),
            connectivity: v.connectivity.to_string(),
            signal: output::or_dash(v.signal),
            signal_bar: output::or_dash(v.signal_bar),
            enabled: if v.enabled { "yes" } else { "no" }.into(),
        }
    }
}

pub fn handle(session: &Session, args: WansArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        WansCommand::List { device } => {
            let devices: Vec<Arc<Device>> = match device {
                Some(identifier) => vec![session.device(&identifier)?],
                None => session.devices(),
            };
            let views: Vec<WanView> = devices
                .iter()
                .flat_map(|d| d.wans().into_iter().map(move |w| WanView::new(d, &w)))
                .collect();

            let out = output::render_list(&global.output, &views, |v| WanRow::from(v), |v| {
                format!("{}/{}", v.device, v.id)
            })?;
            output::print_output(&out, global.quiet);
            Ok(())
        }
    }
}
