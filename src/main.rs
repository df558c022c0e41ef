use clap::Parser;
use color_eyre::eyre::Result;
use memviz::{config::Config, pidof::Pidof, proc::ProcFs, report::report};
use std::io::{self, Write};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    color_eyre::install()?;

    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let config = Config::parse();

    let mut stdout = io::stdout().lock();
    report(&config, &ProcFs::new(), &Pidof, &mut stdout)?;
    stdout.flush()?;

    Ok(())
}
