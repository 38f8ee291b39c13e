//! Clap derive structures for the `wsload` CLI.
//!
//! Shared with `build.rs` (man page generation), so this file may only use
//! clap, clap_complete and std.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// wsload -- WebSocket JSON-RPC subscription load tester
#[derive(Debug, Parser)]
#[command(
    name = "wsload",
    version,
    about = "Load test WebSocket JSON-RPC subscription endpoints",
    long_about = "Opens one long-lived WebSocket connection, issues eth_subscribe\n\
        requests for each configured type, and counts every frame the server\n\
        sends back. Reconnects with a fixed backoff and keeps statistics across\n\
        reconnects. Press Ctrl-C to stop and print the session summary.",
    after_help = "Examples:\n  \
        wsload --app-id <APP_ID> --api-key <API_KEY>\n  \
        wsload -a <APP_ID> -k <API_KEY> --subs newHeads,newPendingTransactions --count 10\n  \
        wsload --url ws://127.0.0.1:8546 --subs logs --log",
    propagate_version = true,
    args_conflicts_with_subcommands = true
)]
pub struct Cli {
    #[command(flatten)]
    pub run: RunArgs,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Log file path (defaults to wsload.log in the temp directory)
    #[arg(long, env = "WSLOAD_LOG_FILE", global = true)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

// ── Load test options ────────────────────────────────────────────────

#[derive(Debug, Clone, Args)]
pub struct RunArgs {
    /// Target service id (must be on the supported list)
    #[arg(long, short = 's', env = "WSLOAD_SERVICE")]
    pub service: Option<String>,

    /// Application id used to build the endpoint URL
    #[arg(long, short = 'a', env = "WSLOAD_APP_ID")]
    pub app_id: Option<String>,

    /// API key, sent verbatim as the Authorization header
    #[arg(long, short = 'k', env = "WSLOAD_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Comma-separated subscription types (newHeads,newPendingTransactions,logs)
    #[arg(long = "subs")]
    pub subscriptions: Option<String>,

    /// Number of subscriptions to create for each type
    #[arg(long, short = 'c')]
    pub count: Option<u32>,

    /// Show the latest WebSocket message as formatted JSON
    #[arg(long, short = 'l')]
    pub log: bool,

    /// Connect to this endpoint instead of building one from service + app id
    #[arg(long)]
    pub url: Option<String>,

    /// Final report format
    #[arg(long, short = 'o', default_value = "dashboard")]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto")]
    pub color: ColorMode,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Live dashboard, then a formatted summary
    Dashboard,
    /// No dashboard; the summary as pretty-printed JSON
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Subcommands ──────────────────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
