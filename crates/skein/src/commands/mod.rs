//! Command dispatch: bridges CLI args -> collections/requests -> output.

pub mod call;
pub mod config_cmd;
pub mod fetch;

use std::sync::Arc;

use skein_api::HttpClient;

use crate::cli::{Command, GlobalOpts};
use crate::config::Config;
use crate::error::CliError;

/// Dispatch a network-bound command to the appropriate handler.
pub async fn dispatch(
    cmd: Command,
    cfg: &Config,
    client: Arc<HttpClient>,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match cmd {
        Command::Fetch(args) => fetch::handle(args, cfg, client, global).await,
        Command::Call(args) => call::handle(args, client, global).await,
        // Config and Completions are handled before dispatch
        Command::Config(_) | Command::Completions(_) => unreachable!(),
    }
}
