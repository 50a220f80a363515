//! Config subcommand handlers.

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::config;
use crate::error::CliError;
use crate::output;

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Show => {
            let cfg = config::resolve(global)?;
            let rendered = output::render_single(&global.output, &config::redacted(&cfg))?;
            output::print_output(&rendered, global.quiet);
            if !global.quiet && !config::has_token(&cfg) {
                eprintln!("note: no bearer token configured; requests are unauthenticated");
            }
            Ok(())
        }

        ConfigCommand::Path => {
            println!("{}", config::active_path(global).display());
            Ok(())
        }

        ConfigCommand::Set { key, value } => {
            // Flags are not persisted; edit the file as loaded.
            let mut cfg = config::load(global)?;
            config::set_key(&mut cfg, &key, &value)?;
            let path = config::active_path(global);
            config::save_config_to(&cfg, &path)?;
            if !global.quiet {
                eprintln!("{key} saved to {}", path.display());
            }
            Ok(())
        }
    }
}
