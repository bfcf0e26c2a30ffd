//! Clap derive structures for the `nestlink` CLI.
//!
//! Defines the command tree, global flags, and shared value types.

use clap::{Args, Parser, Subcommand, ValueEnum};
use nestlink_core::{EcoMode, ThermostatMode};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// nestlink -- Nest thermostats and Protects from the command line
#[derive(Debug, Parser)]
#[command(
    name = "nestlink",
    version,
    about = "Read and control Nest thermostats from the command line",
    long_about = "Talks to the Nest cloud the way the home.nest.com web app does.\n\n\
        Login uses an issue-token URL and cookie captured from a signed-in\n\
        browser session; see `nestlink config init`.",
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
    /// Account profile to use
    #[arg(long, short = 'p', env = "NESTLINK_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Issue-token URL (overrides profile)
    #[arg(long, env = "NEST_ISSUE_TOKEN", global = true, hide_env_values = true)]
    pub issue_token: Option<String>,

    /// Google session cookie (overrides profile)
    #[arg(long, env = "NEST_COOKIE", global = true, hide_env_values = true)]
    pub cookie: Option<String>,

    /// Output format [default: from config, else table]
    #[arg(long, short = 'o', env = "NESTLINK_OUTPUT", global = true)]
    pub output: Option<OutputFormat>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Request timeout in seconds
    #[arg(long, env = "NESTLINK_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

// ── Value Enums ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
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

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Switch {
    On,
    Off,
}

impl Switch {
    pub fn is_on(self) -> bool {
        self == Self::On
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    Heat,
    Off,
    Cool,
    /// Heat-cool between the low and high targets
    Range,
}

impl From<ModeArg> for ThermostatMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Heat => Self::Heat,
            ModeArg::Off => Self::Off,
            ModeArg::Cool => Self::Cool,
            ModeArg::Range => Self::Range,
        }
    }
}

impl From<Switch> for EcoMode {
    fn from(switch: Switch) -> Self {
        match switch {
            Switch::On => Self::ManualEco,
            Switch::Off => Self::Schedule,
        }
    }
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Show thermostats and Protects
    #[command(alias = "st")]
    Status,

    /// Poll and print every new state until interrupted
    Watch(WatchArgs),

    /// Set a thermostat's target temperature
    SetTemp {
        /// Thermostat id or room name
        device: String,
        /// Target temperature in the thermostat's scale
        temperature: f64,
    },

    /// Set the thermostat's structure away or home
    Away {
        /// Thermostat id or room name
        device: String,
        state: Switch,
        /// Do not switch to eco when going away
        #[arg(long)]
        no_eco: bool,
    },

    /// Turn manual eco mode on or off
    Eco {
        /// Thermostat id or room name
        device: String,
        state: Switch,
    },

    /// Change the thermostat's operating mode
    Mode {
        /// Thermostat id or room name
        device: String,
        mode: ModeArg,
    },

    /// Manage CLI configuration and profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Minutes between refreshes (overrides profile)
    #[arg(long, short = 'i', value_parser = clap::value_parser!(u64).range(1..))]
    pub interval: Option<u64>,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Interactive setup wizard
    Init,
    /// Show current configuration (secrets masked)
    Show,
    /// Print the config file path
    Path,
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
