mod policy;

use crate::expr::Definition;
use clap::{Parser, Subcommand, ValueEnum};
pub use policy::OnInvalidPattern;
use std::path::PathBuf;

/// Select (and fetch) the links of a page with boolean regex expressions
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Match letters exactly as written (matching ignores case by default)
    #[arg(short = 'c', long, global = true, conflicts_with = "ignore_case")]
    pub case_sensitive: bool,

    /// Ignore letter case even when the config asks for exact matching
    #[arg(short = 'i', long, global = true)]
    pub ignore_case: bool,

    /// What to do with a pattern the regex engine rejects
    #[arg(long, value_enum, global = true)]
    pub on_invalid_pattern: Option<OnInvalidPattern>,

    /// Define a named pattern usable as a bare word, e.g. -D pdf='\.pdf$'
    #[arg(short = 'D', long = "define", value_name = "NAME=REGEX", global = true)]
    pub defines: Vec<Definition>,

    /// Path to a TOML config file
    #[arg(long, global = true, env = "DOREPY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(short = 'F', long, value_enum, default_value_t = OutputFormat::Text, global = true)]
    pub format: OutputFormat,

    /// Also write the output to this file
    #[arg(short, long, global = true)]
    pub output: Option<PathBuf>,

    /// When to use colors
    #[arg(long, value_enum, default_value_t = ColorMode::Auto, global = true)]
    pub color: ColorMode,

    /// More log output (repeat for more)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only report errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Validate an expression and print its canonical form
    Check {
        /// Filter expression, e.g. '"\.pdf$" NOT "draft"'
        expression: String,

        /// Also list the tokens the expression was split into
        #[arg(long)]
        tokens: bool,
    },
    /// Test subjects against an expression; exits with 1 when nothing matched
    Match {
        /// Filter expression
        expression: String,

        /// Subjects to test; read line by line from stdin when omitted
        subjects: Vec<String>,

        /// Show every subject with its verdict, not only accepted ones
        #[arg(short, long)]
        all: bool,
    },
    /// List the links of local HTML pages that an expression accepts
    Links {
        /// HTML files to read; links from all of them are listed together
        #[arg(required = true, num_args = 1..)]
        pages: Vec<PathBuf>,

        /// Filter expression (accepts every link when omitted)
        #[arg(short, long, default_value = "\".*\"")]
        expression: String,

        /// URL the pages were served from, used to make links absolute
        #[arg(short, long)]
        base: Option<String>,
    },
    /// Copy the accepted links of mirrored pages (file:// links) into a directory
    Harvest {
        /// HTML files to read; each is harvested in turn
        #[arg(required = true, num_args = 1..)]
        pages: Vec<PathBuf>,

        /// Filter expression (accepts every link when omitted)
        #[arg(short, long, default_value = "\".*\"")]
        expression: String,

        /// URL the pages were served from; defaults to each page's own file:// URL
        #[arg(short, long)]
        base: Option<String>,

        /// Directory to save files into
        #[arg(short = 'd', long, default_value = ".")]
        dest: PathBuf,

        /// Seconds to wait after a rate-limited attempt (0 uses the server's hint)
        #[arg(short, long)]
        wait: Option<u64>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ColorMode {
    Auto,
    Always,
    Never,
}

pub fn cli_parse() -> Cli {
    Cli::parse()
}
