//! tmhcl cli interface

use clap::{Parser, Subcommand, ValueEnum};
use std::fmt::Formatter;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Change the work directory
    ///
    /// Can be specified multiple times. Note that all
    /// paths on the way to the final path must exist.
    ///
    /// The final work directory is the configuration root.
    #[clap(short = 'C', long = "directory", global(true))]
    pub directory: Vec<PathBuf>,

    #[clap(flatten)]
    pub parser: ParserArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Parser, Debug)]
pub struct ParserArgs {
    /// Skip unknown top level blocks and attributes instead of failing
    #[clap(long = "non-strict", global(true))]
    pub non_strict: bool,

    /// Enable an experiment
    ///
    /// Can be specified multiple times. Experiments listed in
    /// `terramate.config.experiments` of the root are always enabled.
    #[clap(long = "experiment", global(true))]
    pub experiments: Vec<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Parse directories and report all errors
    Check(DirsArgs),

    /// Parse directories and print the resulting configuration
    Dump(DumpCommand),
}

#[derive(Parser, Debug)]
pub struct DirsArgs {
    /// Directories to parse, relative to the configuration root
    ///
    /// Defaults to the root itself.
    #[clap(default_value = "/")]
    pub dirs: Vec<String>,
}

#[derive(Parser, Debug)]
pub struct DumpCommand {
    #[clap(flatten)]
    pub dirs: DirsArgs,

    #[arg(short = 'F', long = "output-format", default_value_t)]
    pub format: OutputFormat,
}

#[derive(ValueEnum, Clone, Default, Debug)]
pub enum OutputFormat {
    Json,
    #[default]
    Yaml,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Json => f.write_str("json"),
            OutputFormat::Yaml => f.write_str("yaml"),
        }
    }
}
