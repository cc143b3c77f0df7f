use clap::{Parser, Subcommand, ValueEnum, ValueHint};
use sparguard::{Strategy, DEFAULT_MAX_DEPTH};
use std::path::PathBuf;

#[derive(Parser)]
#[command(about, version, name = "sparguard")]
/// Hides the hypergraph bookkeeping vocabulary from SPARQL queries and compacts constraint clause-groups
pub struct Args {
    /// Format of the logs written to the standard error
    ///
    /// The log level is set with the RUST_LOG environment variable.
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum LogFormat {
    /// Human readable lines
    Text,
    /// One JSON object per line
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Adds the vocabulary guards to a SPARQL query
    ///
    /// The query is read from the standard input if neither --query nor --query-file is set.
    /// If the query cannot be rewritten, it is written back unchanged unless --strict is set.
    Rewrite {
        /// The SPARQL query
        #[arg(short, long, conflicts_with = "query_file")]
        query: Option<String>,
        /// File in which the query is stored
        #[arg(long, value_hint = ValueHint::FilePath)]
        query_file: Option<PathBuf>,
        /// Base IRI of the query
        #[arg(long, value_hint = ValueHint::Url)]
        base: Option<String>,
        /// How deep sub-selects might be nested
        #[arg(long, default_value_t = DEFAULT_MAX_DEPTH)]
        max_depth: usize,
        /// Fails if the query cannot be rewritten instead of writing it back unchanged
        #[arg(long)]
        strict: bool,
    },
    /// Compacts a JSON array of constraint clause-groups
    ///
    /// The output is written to the standard output as JSON.
    Compact {
        /// File containing the clause-groups
        ///
        /// If not present, the standard input is read.
        #[arg(short, long, value_hint = ValueHint::FilePath)]
        file: Option<PathBuf>,
        /// How the clause-groups are merged: bucketed or generalize
        #[arg(long, default_value_t = Strategy::Bucketed)]
        strategy: Strategy,
        /// Indents the JSON output
        #[arg(long)]
        pretty: bool,
    },
}
