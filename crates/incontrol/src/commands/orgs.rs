//! Organization command handlers.

use serde::Serialize;
use tabled::Tabled;

use incontrol_core::{Org, Session};

use crate::cli::{GlobalOpts, OrgsArgs, OrgsCommand};
use crate::error::CliError;
use crate::output;

#[derive(Serialize)]
struct OrgView {
    id: String,
    name: String,
    status: Option<String>,
    groups: usize,
    devices: usize,
}

impl From<&Org> for OrgView {
    fn from(o: &Org) -> Self {
        Self {
            id: o.id.to_string(),
            name: o.display_name().to_owned(),
            status: o.status.clone(),
            groups: o.groups.len(),
            devices: o.devices().count(),
        }
    }
}

#[derive(Tabled)]
struct OrgRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Groups")]
    groups: usize,
    #[tabled(rename = "Devices")]
    devices: usize,
}

impl From<&OrgView> for OrgRow {
    fn from(v: &OrgView) -> Self {
        Self {
            id: v.id.clone(),
            name: v.name.clone(),
            status: output::or_dash(v.status.as_ref()),
            groups: v.groups,
            devices: v.devices,
        }
    }
}

pub fn handle(session: &Session, args: OrgsArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        OrgsCommand::List => {
            let views: Vec<OrgView> = session.orgs().iter().map(OrgView::from).collect();
            let out =
                output::render_list(&global.output, &views, |v| OrgRow::from(v), |v| v.id.clone())?;
            output::print_output(&out, global.quiet);
            Ok(())
        }
    }
}
