//! Renders roff manual pages for the CLI into `OUT_DIR`.
//!
//! `marionette.1` covers the top-level command and each subcommand gets its
//! own `marionette-<name>.1` page.

use std::env;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use clap::{Command, CommandFactory};
use clap_mangen::Man;

#[path = "src/cli/mod.rs"]
mod cli;

use cli::Cli;

fn write_page(man: &Man, path: &Path) -> io::Result<()> {
    let mut page = Vec::new();
    man.render(&mut page)?;
    fs::write(path, page)
}

fn subcommand_page(parent: &str, sub: &Command) -> (Man, String) {
    let title = format!("{parent}-{}", sub.get_name());
    let man = Man::new(sub.clone()).title(title.clone());
    (man, format!("{title}.1"))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut stdout = io::stdout();
    writeln!(stdout, "cargo:rerun-if-changed=build.rs")?;
    writeln!(stdout, "cargo:rerun-if-changed=src/cli/mod.rs")?;

    let out_dir = env::var_os("OUT_DIR")
        .map(PathBuf::from)
        .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "OUT_DIR is unset"))?;

    let command = Cli::command();
    let name = command.get_name().to_owned();
    write_page(&Man::new(command.clone()), &out_dir.join(format!("{name}.1")))?;
    for sub in command.get_subcommands() {
        let (man, file_name) = subcommand_page(&name, sub);
        write_page(&man, &out_dir.join(file_name))?;
    }

    Ok(())
}
