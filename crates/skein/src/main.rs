mod cli;
mod commands;
mod config;
mod error;
mod output;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command, GlobalOpts};
use crate::error::CliError;

/// Overrides the `-v`/`-q` derived filter when set.
const LOG_ENV: &str = "SKEIN_LOG";

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(&cli.global);

    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

/// `-q` silences everything below errors; each `-v` opens one level more.
/// Request logging from the library crates is what `-vv` is for.
fn default_directive(global: &GlobalOpts) -> &'static str {
    if global.quiet {
        return "error";
    }
    match global.verbose {
        0 => "warn",
        1 => "info",
        2 => "skein=debug,skein_core=debug,skein_api=debug,warn",
        _ => "trace",
    }
}

fn init_tracing(global: &GlobalOpts) {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .unwrap_or_else(|_| EnvFilter::new(default_directive(global)));

    // stdout carries command output only.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(global.verbose >= 2)
        .without_time()
        .init();
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let Cli { global, command } = cli;
    match command {
        Command::Config(args) => commands::config_cmd::handle(args, &global),
        Command::Completions(args) => {
            use clap::CommandFactory;

            let mut cmd = Cli::command();
            clap_complete::generate(args.shell, &mut cmd, "skein", &mut std::io::stdout());
            Ok(())
        }
        command => {
            let cfg = config::resolve(&global)?;
            let client = config::build_client(&cfg)?;
            tracing::debug!(?command, base_url = ?cfg.base_url, "dispatching");
            commands::dispatch(command, &cfg, client, &global).await
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    fn global(args: &[&str]) -> GlobalOpts {
        let mut argv = vec!["skein"];
        argv.extend_from_slice(args);
        argv.extend_from_slice(&["config", "path"]);
        Cli::parse_from(argv).global
    }

    #[test]
    fn quiet_wins_over_verbose() {
        assert_eq!(default_directive(&global(&["-q", "-vv"])), "error");
    }

    #[test]
    fn verbosity_levels() {
        assert_eq!(default_directive(&global(&[])), "warn");
        assert_eq!(default_directive(&global(&["-v"])), "info");
        assert!(default_directive(&global(&["-vv"])).contains("skein_core=debug"));
        assert_eq!(default_directive(&global(&["-vvv"])), "trace");
    }
}
