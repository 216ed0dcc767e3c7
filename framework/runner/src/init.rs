use clap::Parser;

use crate::cli::GustRunCli;

/// Initialise the CLI and logging for the orchestrator.
pub fn init() -> GustRunCli {
    env_logger::init();

    GustRunCli::parse()
}
