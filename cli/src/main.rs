use crate::cli::{Args, Command, LogFormat};
use anyhow::Context;
use clap::Parser;
use sparguard::{ConstraintGroup, ConstraintOptimizer, QueryRewriter};
use std::fs;
use std::io::{self, stdin, stdout, Read, Write};
use std::path::Path;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

mod cli;

pub fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.log_format)?;
    match args.command {
        Command::Rewrite {
            query,
            query_file,
            base,
            max_depth,
            strict,
        } => {
            let query = read_input(query, query_file.as_deref())?;
            let mut rewriter = QueryRewriter::new().with_max_depth(max_depth);
            if let Some(base) = base {
                rewriter = rewriter
                    .with_base_iri(&base)
                    .with_context(|| format!("Invalid base IRI {base}"))?;
            }
            let rewritten = if strict {
                rewriter
                    .try_rewrite(&query)
                    .context("The query could not be rewritten")?
            } else {
                rewriter.rewrite(&query)
            };
            let mut stdout = stdout().lock();
            stdout.write_all(rewritten.as_bytes())?;
            stdout.flush()?;
            Ok(())
        }
        Command::Compact {
            file,
            strategy,
            pretty,
        } => {
            let input = read_input(None, file.as_deref())?;
            let groups: Vec<ConstraintGroup> = serde_json::from_str(&input)
                .context("The input must be a JSON array of clause-groups")?;
            let (optimized, report) = ConstraintOptimizer::new()
                .with_strategy(strategy)
                .optimize_with_report(&groups);
            info!(
                input_groups = report.input_groups,
                output_groups = report.output_groups,
                merges = report.merges,
                passed_through = report.passed_through,
                "clause-groups compacted"
            );
            let mut stdout = stdout().lock();
            if pretty {
                serde_json::to_writer_pretty(&mut stdout, &optimized)?;
            } else {
                serde_json::to_writer(&mut stdout, &optimized)?;
            }
            stdout.write_all(b"\n")?;
            stdout.flush()?;
            Ok(())
        }
    }
}

fn read_input(inline: Option<String>, file: Option<&Path>) -> anyhow::Result<String> {
    if let Some(inline) = inline {
        return Ok(inline);
    }
    if let Some(file) = file {
        return fs::read_to_string(file)
            .with_context(|| format!("Failed to read {}", file.display()));
    }
    let mut input = String::new();
    stdin()
        .lock()
        .read_to_string(&mut input)
        .context("Failed to read the standard input")?;
    Ok(input)
}

/// Logs go to the standard error, the standard output is kept for the results.
fn init_tracing(format: LogFormat) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Text => registry
            .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
            .try_init(),
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(io::stderr),
            )
            .try_init(),
    }
    .context("Failed to initialize the logger")
}
