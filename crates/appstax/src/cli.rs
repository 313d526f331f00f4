//! Clap derive structures for the `appstax` CLI.
//!
//! Defines the command tree, global flags, and shared types.

use clap::{Args, Parser, Subcommand, ValueEnum};

use appstax_core::WatchOptions;

// ── Top-Level CLI ────────────────────────────────────────────────────

/// appstax -- live views over Appstax collections
#[derive(Debug, Parser)]
#[command(
    name = "appstax",
    version,
    about = "Query and watch Appstax collections from the command line",
    long_about = "Loads an Appstax collection through the object API and, in watch mode,\n\
        keeps it current from real-time channels, reprinting the result list\n\
        on every change.",
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
    /// App profile to use
    #[arg(long, short = 'p', env = "APPSTAX_PROFILE", global = true)]
    pub profile: Option<String>,

    /// API root URL (overrides profile)
    #[arg(long, env = "APPSTAX_BASE_URL", global = true)]
    pub base_url: Option<String>,

    /// Application key
    #[arg(long, env = "APPSTAX_APP_KEY", global = true, hide_env = true)]
    pub app_key: Option<String>,

    /// Session id of a signed-in user
    #[arg(long, env = "APPSTAX_SESSION", global = true, hide_env = true)]
    pub session: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "APPSTAX_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Accept self-signed TLS certificates
    #[arg(long, short = 'k', env = "APPSTAX_INSECURE", global = true)]
    pub insecure: bool,

    /// Request timeout in seconds (overrides profile)
    #[arg(long, env = "APPSTAX_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Object ids, one per line (scripting)
    Plain,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fetch a collection once and print it
    #[command(alias = "ls")]
    List(QueryArgs),

    /// Print a collection and reprint it on every live change
    #[command(alias = "w")]
    Watch(WatchArgs),

    /// Manage CLI configuration and profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Query Arguments ──────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct QueryArgs {
    /// Collection to query
    pub collection: String,

    /// Filter expression, e.g. "done = false"
    #[arg(long, short = 'f')]
    pub filter: Option<String>,

    /// Sort property; prefix with '-' for descending (default: -created)
    #[arg(long, allow_hyphen_values = true)]
    pub order: Option<String>,

    /// Expand relations this many levels deep
    #[arg(long, short = 'e', default_value = "0")]
    pub expand: u32,

    /// Properties to show as table columns (comma-separated)
    #[arg(long, short = 'c', value_delimiter = ',')]
    pub columns: Vec<String>,
}

impl QueryArgs {
    pub fn watch_options(&self) -> WatchOptions {
        let mut options = WatchOptions::new()
            .collection(self.collection.clone())
            .expand(self.expand);
        if let Some(ref filter) = self.filter {
            options = options.filter(filter.clone());
        }
        if let Some(ref order) = self.order {
            options = options.order(order.clone());
        }
        options
    }
}

#[derive(Debug, Args)]
pub struct WatchArgs {
    #[command(flatten)]
    pub query: QueryArgs,

    /// Exit after this many result updates
    #[arg(long, short = 'n')]
    pub changes: Option<u64>,

    /// Load once without opening real-time channels
    #[arg(long)]
    pub no_realtime: bool,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  CONFIG
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Create or overwrite a profile
    Init {
        /// API root of the app's backend
        #[arg(long = "url")]
        url: Option<String>,

        /// Name of an environment variable holding the app key
        #[arg(long)]
        key_env: Option<String>,

        /// App key to store
        #[arg(long)]
        key: Option<String>,

        /// Store the key in the system keyring instead of the config file
        #[arg(long, requires = "key")]
        keyring: bool,
    },

    /// Display current resolved configuration
    Show,

    /// List configured profiles
    Profiles,

    /// Set the default profile
    Use {
        /// Profile name to set as default
        name: String,
    },

    /// Read an app key from stdin and store it in the system keyring
    SetKey {
        /// Profile name
        #[arg(long)]
        profile: Option<String>,
    },
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  COMPLETIONS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
