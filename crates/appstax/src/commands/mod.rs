//! Command dispatch: bridges CLI args -> core model -> output formatting.

pub mod config_cmd;
pub mod list;
pub mod watch;

use appstax_core::ClientConfig;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch a backend-bound command to its handler. `Config` and
/// `Completions` never reach here.
pub async fn dispatch(
    cmd: Command,
    config: ClientConfig,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match cmd {
        Command::List(args) => list::handle(&config, &args, global).await,
        Command::Watch(args) => watch::handle(config, &args, global).await,
        Command::Config(_) | Command::Completions(_) => Ok(()),
    }
}
