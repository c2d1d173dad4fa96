//! Clap derive structures for the `deconz-bridge` CLI.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// deconz-bridge -- keep a hub's device model in sync with a deCONZ gateway
#[derive(Debug, Parser)]
#[command(
    name = "deconz-bridge",
    version,
    about = "Bridge a deCONZ Zigbee gateway into a home-automation hub",
    long_about = "Maintains the gateway's event stream, reconciles state by polling,\n\
        and translates lights, sensors and groups into hub capabilities.",
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
    /// Config file (defaults to the platform config directory)
    #[arg(long, env = "DECONZ_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "DECONZ_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,
}

// ── Output Enum ──────────────────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the bridge until interrupted
    Run(RunArgs),

    /// List gateways announced by the discovery service
    Discover,

    /// Obtain an API key and save the gateway settings
    #[command(alias = "auth")]
    Authenticate(AuthenticateArgs),

    /// Poll the gateway once and show every registered device
    Sync,

    /// Show registered devices without contacting the gateway
    #[command(alias = "dev")]
    Devices,

    /// Apply a stream message locally, as if the gateway had pushed it
    Simulate(SimulateArgs),

    /// Re-discover the gateway address and save it if it moved
    Repair,

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Print device events to stdout as they happen
    #[arg(long)]
    pub events: bool,
}

#[derive(Debug, Args)]
pub struct AuthenticateArgs {
    /// Gateway host; discovered when omitted
    #[arg(long)]
    pub host: Option<String>,

    /// Gateway REST port
    #[arg(long, default_value = "80", requires = "host")]
    pub port: u16,

    /// Store the API key in the system keyring instead of the config file
    #[arg(long)]
    pub keyring: bool,
}

#[derive(Debug, Args)]
pub struct SimulateArgs {
    /// JSON message text; read from --file when omitted
    #[arg(conflicts_with = "file", required_unless_present = "file")]
    pub message: Option<String>,

    /// Read the message from a file
    #[arg(long, short = 'f')]
    pub file: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_tree_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["deconz-bridge", "sync", "-o", "json", "-vv"]).unwrap();
        assert!(matches!(cli.command, Command::Sync));
        assert!(matches!(cli.global.output, OutputFormat::Json));
        assert_eq!(cli.global.verbose, 2);
    }

    #[test]
    fn port_requires_host() {
        assert!(Cli::try_parse_from(["deconz-bridge", "authenticate", "--port", "8080"]).is_err());
        let cli = Cli::try_parse_from([
            "deconz-bridge",
            "auth",
            "--host",
            "192.168.1.20",
            "--port",
            "8080",
        ])
        .unwrap();
        let Command::Authenticate(args) = cli.command else {
            panic!("expected authenticate");
        };
        assert_eq!(args.host.as_deref(), Some("192.168.1.20"));
        assert_eq!(args.port, 8080);
    }

    #[test]
    fn simulate_needs_a_message() {
        assert!(Cli::try_parse_from(["deconz-bridge", "simulate"]).is_err());
        assert!(Cli::try_parse_from(["deconz-bridge", "simulate", "{}"]).is_ok());
        assert!(Cli::try_parse_from(["deconz-bridge", "simulate", "-f", "msg.json"]).is_ok());
    }
}
