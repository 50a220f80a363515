//! Clap derive structures for the `skein` CLI.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// skein -- fetch paginated JSON collections from the command line
#[derive(Debug, Parser)]
#[command(
    name = "skein",
    version,
    about = "Fetch paginated JSON collections from envelope-style APIs",
    long_about = "Fetches `{data, pagination, summary}` collections and single JSON\n\
        resources relative to a configured base URL, with optional result\n\
        caching, page following, and periodic refresh.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// API base URL (overrides config)
    #[arg(long, short = 'b', env = "SKEIN_BASE_URL", global = true)]
    pub base_url: Option<String>,

    /// Bearer token (overrides config)
    #[arg(long, env = "SKEIN_API_TOKEN", global = true, hide_env_values = true)]
    pub token: Option<String>,

    /// Config file to read instead of the default location
    #[arg(long, env = "SKEIN_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(long, short = 'o', env = "SKEIN_OUTPUT", default_value = "json", global = true)]
    pub output: OutputFormat,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Accept invalid TLS certificates
    #[arg(long, short = 'k', global = true)]
    pub insecure: bool,

    /// Request timeout in seconds (overrides config)
    #[arg(long, global = true)]
    pub timeout: Option<u64>,
}

// ── Output ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// One compact JSON value per line (scripting)
    Plain,
}

// ── Commands ─────────────────────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fetch a paginated collection
    #[command(alias = "f")]
    Fetch(FetchArgs),

    /// Call a single endpoint and print its JSON body
    Call(CallArgs),

    /// Inspect and edit configuration
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Debug, Args)]
pub struct FetchArgs {
    /// Collection path, relative to the base URL
    pub path: String,

    /// Query string appended to the path (without the leading `?`)
    #[arg(long)]
    pub query: Option<String>,

    /// JSON body; makes the fetch a POST
    #[arg(long, short = 'd')]
    pub data: Option<String>,

    /// Serve repeated fetches of the same request from the result cache
    #[arg(long)]
    pub cache: bool,

    /// Cache lifetime in seconds (overrides config)
    #[arg(long, value_name = "SECS")]
    pub cache_ttl: Option<u64>,

    /// Follow pagination until the last page
    #[arg(long)]
    pub all_pages: bool,

    /// Query parameter used for page numbers with --all-pages
    #[arg(long, default_value = "page")]
    pub page_param: String,

    /// Refresh every SECS seconds and print each new result
    #[arg(long, value_name = "SECS")]
    pub watch: Option<u64>,

    /// Stop watching after this many results
    #[arg(long, requires = "watch")]
    pub count: Option<usize>,

    /// Print only the items, without pagination and summary
    #[arg(long)]
    pub items_only: bool,
}

#[derive(Debug, Args)]
pub struct CallArgs {
    /// Endpoint path, relative to the base URL
    pub path: String,

    /// JSON body; makes the call a POST
    #[arg(long, short = 'd')]
    pub data: Option<String>,
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the effective configuration (token redacted)
    Show,

    /// Print the config file path
    Path,

    /// Set a single key and save
    Set {
        /// Key, e.g. `base_url` or `collection.enable_cache`
        key: String,
        /// New value
        value: String,
    },
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
