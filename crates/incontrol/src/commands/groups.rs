//! Group command handlers.

use serde::Serialize;
use tabled::Tabled;

use incontrol_core::Session;

use crate::cli::{GlobalOpts, GroupsArgs, GroupsCommand};
use crate::error::CliError;
use crate::output;

#[derive(Clone, Serialize, Tabled)]
struct GroupRow {
    #[tabled(rename = "Org")]
    org_id: String,
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Devices")]
    devices: usize,
}

pub fn handle(session: &Session, args: GroupsArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        GroupsCommand::List { org } => {
            let rows: Vec<GroupRow> = session
                .orgs()
                .iter()
                .filter(|o| org.as_deref().is_none_or(|wanted| o.id.as_str() == wanted))
                .flat_map(|o| &o.groups)
                .map(|g| GroupRow {
                    org_id: g.org_id.to_string(),
                    id: g.id.to_string(),
                    name: g.display_name().to_owned(),
                    devices: g.devices.len(),
                })
                .collect();

            let out = output::render_list(
                &global.output,
                &rows,
                GroupRow::clone,
                |r| format!("{}/{}", r.org_id, r.id),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }
    }
}
