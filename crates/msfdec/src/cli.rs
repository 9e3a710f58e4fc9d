use std::fmt::Display;

use clap::{error::ErrorKind, value_parser, CommandFactory, Parser};

/// Standard input filename
const STDIN_FILE: &str = "-";

const USAGE_SHORT: &str = r#"
This program replays a recorded one-bit MSF carrier tape through the full acquisition pipeline and prints the decoded timestamp.

See --help for more details.
"#;

const USAGE_LONG: &str = r#"
This program replays a recorded one-bit MSF carrier tape through the full acquisition pipeline and prints the decoded timestamp.

The tape is ASCII: '1' for carrier present, '0' for silence, one sample per 1/RATE seconds. Whitespace is ignored. Any logging rig that samples a receiver module's carrier-detect pin can produce one:

    msfdec --rate 1000 --file capture.txt

Replay runs against a virtual clock, so a two-minute acquisition decodes in milliseconds. The tape must cover at least one full minute marker followed by a complete minute of payload (about 130 s at the point the scan locks on); steady carrier is assumed once the tape runs out.

Exits 0 when the frame validates and 2 when the checksum fails.
"#;

const ADVANCED: &str = "Advanced Receiver Options";

/// Top-level program arguments
#[derive(Parser, Clone, Debug)]
#[command(version)]
#[command(about, long_about = None)]
#[command(after_help = USAGE_SHORT, after_long_help = USAGE_LONG)]
#[command(max_term_width = 100)]
pub struct Args {
    /// Verbosity level (-vvv for more)
    #[arg(short, long, default_value_t = 0, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Print NOTHING, not even the decoded timestamp
    #[arg(short, long)]
    pub quiet: bool,

    /// Tape sample rate (samples per second)
    #[arg(short, long, default_value_t = 1000)]
    #[arg(value_parser = value_parser!(u32).range(1..=100_000))]
    pub rate: u32,

    /// Input file (or "-" for stdin)
    ///
    /// ASCII '0'/'1' carrier samples at --rate; whitespace ignored.
    #[arg(long, default_value_t = STDIN_FILE.to_string())]
    pub file: String,

    /// Minute-marker search sample period (ms)
    #[arg(long, default_value_t = 20)]
    #[arg(value_parser = value_parser!(u32).range(1..=100))]
    #[arg(hide_short_help = true)]
    #[arg(help_heading = ADVANCED)]
    pub sample_period: u32,

    /// Bit majority-vote threshold (percent)
    #[arg(long, default_value_t = 60)]
    #[arg(value_parser = value_parser!(u32).range(1..=99))]
    #[arg(hide_short_help = true)]
    #[arg(help_heading = ADVANCED)]
    pub vote_threshold: u32,
}

impl Args {
    /// Return true if the user requests input from stdin
    pub fn input_is_stdin(&self) -> bool {
        self.file == STDIN_FILE
    }
}

/// A program-level error with exit code
#[derive(Debug)]
pub struct CliError {
    error: anyhow::Error,
    exit_code: i32,
}

impl CliError {
    /// Create new error with a custom exit code
    pub fn new(error: anyhow::Error, code: i32) -> CliError {
        CliError {
            error,
            exit_code: code,
        }
    }

    /// Print this error to the terminal
    ///
    /// Errors from clap are printed verbatim. Other types of errors
    /// are printed indirectly via clap's fancy formatter.
    pub fn print(&self) -> std::io::Result<()> {
        if let Some(e) = self.error.downcast_ref::<clap::Error>() {
            e.print()
        } else {
            Args::command()
                .error(ErrorKind::Format, self.to_string())
                .print()
        }
    }

    /// Print this error to the terminal and exit
    pub fn exit(&self) -> ! {
        drop(self.print());
        std::process::exit(self.exit_code);
    }
}

impl Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self.error)
    }
}

impl std::error::Error for CliError {}

impl From<anyhow::Error> for CliError {
    fn from(err: anyhow::Error) -> CliError {
        CliError::new(err, 1)
    }
}

impl From<clap::Error> for CliError {
    fn from(err: clap::Error) -> CliError {
        let code = if err.use_stderr() { 1 } else { 0 };
        CliError::new(err.into(), code)
    }
}
