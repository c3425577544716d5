use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "ringlog",
    about = "Fixed-size circular text log with crash recovery",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Configuration file (default: ./ringlog.toml if present)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(flatten)]
    pub store: StoreArgs,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

/// Overrides for the configuration file.
#[derive(Args, Clone, Debug, Default)]
pub struct StoreArgs {
    /// Directory holding the store
    #[arg(long, global = true)]
    pub dir: Option<PathBuf>,

    /// Object name of the store inside the directory
    #[arg(long, global = true)]
    pub name: Option<String>,

    /// Number of lines the ring keeps
    #[arg(long, global = true)]
    pub capacity: Option<u32>,

    /// Width of each line in bytes
    #[arg(long, global = true)]
    pub line_width: Option<u32>,

    /// Diagnostic verbosity 0-9, written to stderr
    #[arg(long, global = true)]
    pub debug_level: Option<u8>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Open the store, formatting it if missing or mismatched
    Init(InitArgs),
    /// Append a line (or every stdin line when no message is given)
    Append(AppendArgs),
    /// Append a tagged debug line
    Debug(DebugArgs),
    /// Print a window of lines
    Read(ReadArgs),
    /// Show every slot with its classification
    Dump,
    /// Show capacity, width and the live line range
    Status,
    /// Erase all lines, keeping the configuration
    Erase,
    /// Delete the store
    Remove,
    /// Print the id of the newest line
    LastId,
}

#[derive(Args)]
pub struct InitArgs {
    /// Discard any existing store
    #[arg(long)]
    pub fresh: bool,
}

#[derive(Args)]
pub struct AppendArgs {
    pub message: Vec<String>,
}

#[derive(Args)]
pub struct DebugArgs {
    #[arg(short, long, default_value = "[DEBUG] ")]
    pub tag: String,
    pub message: Vec<String>,
}

#[derive(Args)]
pub struct ReadArgs {
    /// 0: from the oldest line; n > 0: skip n lines; n < 0: count back
    /// from the newest
    #[arg(short, long, default_value_t = 0, allow_negative_numbers = true)]
    pub start: i32,

    /// Maximum lines to print, 0 for all
    #[arg(short = 'n', long, default_value_t = 0)]
    pub count: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn negative_start_parses() {
        let cli = Cli::try_parse_from(["ringlog", "read", "--start", "-3", "-n", "2"]).unwrap();
        match cli.command {
            Command::Read(args) => {
                assert_eq!(args.start, -3);
                assert_eq!(args.count, 2);
            }
            _ => panic!("expected read"),
        }
    }

    #[test]
    fn global_overrides_after_subcommand() {
        let cli = Cli::try_parse_from([
            "ringlog",
            "status",
            "--capacity",
            "40",
            "--format",
            "json",
        ])
        .unwrap();
        assert_eq!(cli.store.capacity, Some(40));
        assert_eq!(cli.format, OutputFormat::Json);
    }
}
