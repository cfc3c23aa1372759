use std::fs;
use std::path::Path;

use clap::CommandFactory;

// cli.rs only needs clap and clap_complete, both build-dependencies.
#[path = "src/cli.rs"]
mod cli;

fn main() {
    println!("cargo::rerun-if-changed=src/cli.rs");

    let out_dir = std::env::var_os("OUT_DIR").expect("OUT_DIR not set by Cargo");
    let man_dir = Path::new(&out_dir).join("man");
    fs::create_dir_all(&man_dir).expect("failed to create man output directory");

    render_page(&cli::Cli::command(), &man_dir);
}

/// Write `<name>.1` for `cmd`, then one page per visible subcommand,
/// named `incontrol-auth-login.1` and so on.
fn render_page(cmd: &clap::Command, dir: &Path) {
    let name = cmd.get_name().to_owned();

    let mut page = Vec::new();
    clap_mangen::Man::new(cmd.clone())
        .render(&mut page)
        .unwrap_or_else(|e| panic!("failed to render man page for `{name}`: {e}"));

    let target = dir.join(format!("{name}.1"));
    fs::write(&target, page)
        .unwrap_or_else(|e| panic!("failed to write {}: {e}", target.display()));

    cmd.get_subcommands()
        .filter(|sub| !sub.is_hide_set())
        .for_each(|sub| {
            let qualified = sub.clone().name(format!("{name}-{}", sub.get_name()));
            render_page(&qualified, dir);
        });
}
