mod commands;
mod document;
mod logging;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::graph::GraphOptions;
use logging::{init_logging, LogFormat, LoggingConfig};

#[derive(Parser)]
#[command(name = "wiregraph")]
#[command(version, about = "Resolve, validate and render dependency-injection binding graphs")]
struct Cli {
    /// Log level filter, overridden by RUST_LOG
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    /// Log line format: plain, pretty or json
    #[arg(long, global = true, default_value = "plain")]
    log_format: LogFormat,

    /// Debug-level logs with source locations
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve root components and summarize their graphs
    Resolve {
        /// Declaration document (JSON or YAML)
        file: PathBuf,

        /// Resolve only the named root component
        #[arg(long, short)]
        component: Option<String>,

        /// Output format: text or json
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Render resolved graphs
    Graph {
        /// Declaration document (JSON or YAML)
        file: PathBuf,

        /// Output format: dot, mermaid, ascii or json
        #[arg(long, default_value = "dot")]
        format: String,

        /// Render only the named root component
        #[arg(long, short)]
        component: Option<String>,

        /// Label edges with their request strategy
        #[arg(long)]
        strategies: bool,

        /// Show only bindings whose key contains this text (repeatable)
        #[arg(long)]
        filter: Vec<String>,

        /// Maximum depth of the ASCII tree
        #[arg(long)]
        max_depth: Option<usize>,

        /// Include graph statistics
        #[arg(long)]
        stats: bool,

        /// Write to a file instead of stdout
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Validate root components and report findings
    Check {
        /// Declaration document (JSON or YAML)
        file: PathBuf,

        /// Check only the named root component
        #[arg(long, short)]
        component: Option<String>,
    },
}

fn run(cli: Cli) -> Result<usize> {
    match cli.command {
        Commands::Resolve { file, component, format } => {
            commands::resolve::run(&file, component.as_deref(), &format)
        }
        Commands::Graph {
            file,
            format,
            component,
            strategies,
            filter,
            max_depth,
            stats,
            output,
        } => {
            let options = GraphOptions {
                component,
                show_strategies: strategies,
                filter,
                max_depth,
                stats,
                output,
            };
            commands::graph::run(&file, &format, &options)
        }
        Commands::Check { file, component } => commands::check::run(&file, component.as_deref()),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let logging = if cli.verbose {
        LoggingConfig::development().with_format(cli.log_format)
    } else {
        LoggingConfig::default()
            .with_level(cli.log_level.clone())
            .with_format(cli.log_format)
    };
    if let Err(e) = init_logging(&logging) {
        eprintln!("Error: {:#}", e);
        return ExitCode::from(2);
    }

    match run(cli) {
        Ok(0) => ExitCode::SUCCESS,
        Ok(findings) => {
            tracing::info!(findings, "resolution reported findings");
            ExitCode::from(1)
        }
        Err(e) => {
            tracing::error!(error = %e, "command failed");
            eprintln!("Error: {:#}", e);
            ExitCode::from(2)
        }
    }
}
