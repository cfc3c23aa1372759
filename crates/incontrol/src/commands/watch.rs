//! `watch`: poll the fleet and print entity state changes until Ctrl-C.
//!
//! Every device gets its entities (status, location, per-WAN signal and
//! link) plus a `ChangePrinter` observer registered after them. Device
//! notifications run in registration order, so by the time the printer
//! runs the entities already hold the new state.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use owo_colors::OwoColorize;
use serde::Serialize;

use incontrol_core::{
    Device, DeviceObserver, DeviceStatusSensor, Entity, LocationTracker, Session,
    WanSignalSensor, WanStatusSensor,
};

use crate::cli::{GlobalOpts, OutputFormat, WatchArgs};
use crate::config;
use crate::error::CliError;
use crate::output;

// ── Change line ─────────────────────────────────────────────────────

#[derive(Serialize)]
struct Change<'a> {
    at: DateTime<Utc>,
    entity: String,
    name: String,
    from: Option<&'a str>,
    to: &'a str,
}

#[derive(Clone, Copy)]
enum LineStyle {
    Text { color: bool },
    Json,
}

impl LineStyle {
    fn new(global: &GlobalOpts) -> Self {
        match global.output {
            OutputFormat::Table | OutputFormat::Plain => Self::Text {
                color: output::should_color(&global.color),
            },
            _ => Self::Json,
        }
    }

    fn render(self, change: &Change<'_>) -> String {
        match self {
            Self::Json => serde_json::to_string(change).unwrap_or_default(),
            Self::Text { color } => {
                let at = change.at.format("%H:%M:%S").to_string();
                let from = change.from.unwrap_or("-");
                if color {
                    format!(
                        "{} {}: {} -> {}",
                        at.dimmed(),
                        change.name.bold(),
                        from.red(),
                        change.to.green()
                    )
                } else {
                    format!("{at} {}: {from} -> {}", change.name, change.to)
                }
            }
        }
    }
}

// ── Observer ────────────────────────────────────────────────────────

/// Prints every entity of one device whose state text changed.
struct ChangePrinter {
    entities: Vec<Arc<dyn Entity>>,
    last: Mutex<Vec<Option<String>>>,
    style: LineStyle,
    quiet: bool,
}

impl ChangePrinter {
    fn attach(device: &Device, style: LineStyle, quiet: bool) -> Arc<Self> {
        let mut entities: Vec<Arc<dyn Entity>> = Vec::new();
        entities.push(DeviceStatusSensor::attach(device));
        entities.push(LocationTracker::attach(device));
        for wan in device.wans() {
            entities.push(WanSignalSensor::attach(device, wan.clone()));
            entities.push(WanStatusSensor::attach(device, wan));
        }

        let printer = Arc::new(Self {
            last: Mutex::new(vec![None; entities.len()]),
            entities,
            style,
            quiet,
        });
        device.add_observer(&printer);
        printer
    }

    /// Compare each entity against its last printed state.
    fn print_changes(&self) {
        let mut last = self.last.lock().expect("printer lock poisoned");
        let at = Utc::now();
        for (entity, previous) in self.entities.iter().zip(last.iter_mut()) {
            let state = entity.state_text();
            if previous.as_deref() == Some(state.as_str()) {
                continue;
            }
            let line = self.style.render(&Change {
                at,
                entity: entity.unique_id(),
                name: entity.name(),
                from: previous.as_deref(),
                to: &state,
            });
            output::print_output(&line, self.quiet);
            *previous = Some(state);
        }
    }
}

impl DeviceObserver for ChangePrinter {
    fn device_updated(&self, _device: &Device) {
        self.print_changes();
    }
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(args: WatchArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let (profile, mut session_config) = config::resolve_session(global)?;
    if let Some(secs) = args.interval {
        session_config.scan_interval = Duration::from_secs(secs);
    }
    if session_config.scan_interval.is_zero() {
        return Err(CliError::Validation {
            field: "interval".into(),
            reason: "must be at least one second".into(),
        });
    }
    let interval = session_config.scan_interval;

    let session: Session = super::connect_with(&profile, session_config).await?;

    let style = LineStyle::new(global);
    let printers: Vec<Arc<ChangePrinter>> = session
        .devices()
        .iter()
        .map(|d| ChangePrinter::attach(d, style, global.quiet))
        .collect();

    if !global.quiet {
        eprintln!(
            "Watching {} device(s) every {}s, Ctrl-C to stop",
            printers.len(),
            interval.as_secs()
        );
    }
    // Discovery already polled each device once; show that as the baseline.
    for printer in &printers {
        printer.print_changes();
    }

    session.start_polling();
    tokio::signal::ctrl_c().await?;
    tracing::info!("interrupted, stopping poller");
    session.shutdown().await;
    Ok(())
}
