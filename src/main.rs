use std::io;

use anyhow::Result;
use clap::Parser;

use weightbook::config::{Args, Config};
use weightbook::report::PdfRenderer;
use weightbook::shell::{self, Shell};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let config = Config::from(Args::parse());
    let shell = Shell::start(config, PdfRenderer, io::stdout())?;
    println!("Type `help` for a list of commands.");

    shell.run(shell::spawn_stdin_reader())?;

    Ok(())
}
