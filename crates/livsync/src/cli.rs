//! Clap derive structures for the `livsync` CLI.
//!
//! Defines the complete command tree, global flags, and shared types.

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// livsync -- monitor and control LIV mosquito-repeller hubs
#[derive(Debug, Parser)]
#[command(
    name = "livsync",
    version,
    about = "Monitor and control LIV hubs from the command line",
    long_about = "Talks to the LIV hub cloud service: lists hubs, shows repeller\n\
        state, and switches power, LED and refill counters.",
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

#[derive(Debug, Clone, Args)]
pub struct GlobalOpts {
    /// Account profile to use
    #[arg(long, short = 'p', env = "LIVSYNC_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Cloud service URL (overrides profile)
    #[arg(long, env = "LIVSYNC_BASE_URL", global = true)]
    pub base_url: Option<String>,

    /// Account e-mail (overrides profile)
    #[arg(long, short = 'u', env = "LIVSYNC_USERNAME", global = true)]
    pub username: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "LIVSYNC_OUTPUT",
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

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Request timeout in seconds (overrides profile)
    #[arg(long, env = "LIVSYNC_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// Plain text, one value per line (scripting)
    Plain,
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

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List hubs with connectivity and freshness
    #[command(alias = "n")]
    Nodes,

    /// Show device state, for one hub or all of them
    #[command(alias = "st")]
    Status(StatusArgs),

    /// Switch the repellers on or off
    Power(SwitchArgs),

    /// Set the LED brightness
    Brightness(BrightnessArgs),

    /// Set the LED color (hue, with the color's value as brightness)
    Color(ColorArgs),

    /// Switch the LED on or off
    Led(SwitchArgs),

    /// Reset the refill counter after a cartridge change
    ResetRefill(DeviceArgs),

    /// Poll one hub now
    Refresh(RefreshArgs),

    /// Stream state changes until interrupted
    Watch(WatchArgs),

    /// Manage CLI configuration and profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Device addressing ────────────────────────────────────────────────

#[derive(Debug, Clone, Args)]
pub struct DeviceArgs {
    /// Hub node ID
    pub node: String,

    /// Device name on the hub (e.g. "LIV Hub")
    pub device: String,
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

#[derive(Debug, Args)]
pub struct SwitchArgs {
    #[command(flatten)]
    pub target: DeviceArgs,

    pub state: Switch,
}

/// Scale of a brightness value given on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BrightnessScale {
    /// 0-100, as stored by the hub
    #[value(name = "100")]
    Percent,
    /// 0-255, converted to 0-100
    #[value(name = "255")]
    Byte,
}

#[derive(Debug, Args)]
pub struct BrightnessArgs {
    #[command(flatten)]
    pub target: DeviceArgs,

    /// Brightness value on the chosen scale
    pub value: u16,

    /// Scale of VALUE
    #[arg(long, default_value = "100")]
    pub scale: BrightnessScale,
}

#[derive(Debug, Args)]
pub struct ColorArgs {
    #[command(flatten)]
    pub target: DeviceArgs,

    /// Color as RRGGBB (leading '#' optional)
    pub color: String,
}

#[derive(Debug, Args)]
pub struct StatusArgs {
    /// Only show devices of this hub
    pub node: Option<String>,
}

#[derive(Debug, Args)]
pub struct RefreshArgs {
    /// Hub node ID
    pub node: String,
}

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Poll interval in seconds (overrides profile)
    #[arg(long, short = 'i')]
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

    /// Show the current configuration (secrets redacted)
    Show,

    /// Print the config file path
    Path,

    /// List configured profiles
    Profiles,

    /// Set the default profile
    Use {
        /// Profile name
        name: String,
    },
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
