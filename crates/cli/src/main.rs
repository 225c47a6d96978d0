mod analyze_cmd;
mod export_cmd;
mod timeline_cmd;

use clap::{Parser, Subcommand};
use opentrace_timeline::ExportFormat;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "opentrace", about = "OpenTrace CLI - analyze and export AI agent trace logs")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Summarize a trace file: totals, durations, per-agent activity
    Analyze {
        /// Path to the trace file
        file: PathBuf,

        /// Also write the summary JSON to this path
        #[arg(long)]
        summary: Option<PathBuf>,
    },

    /// Export a trace file to another format
    Export {
        /// Path to the trace file
        file: PathBuf,

        /// Output file path
        #[arg(long)]
        out: PathBuf,

        /// Output format: json, csv, or trace-event
        #[arg(long, default_value = "json")]
        format: ExportFormat,
    },

    /// Reconstruct the timeline from the newest root-session logs
    Timeline {
        /// Trace root directory (defaults to $OPENTRACE_ROOT or ~/.opentrace)
        #[arg(long)]
        root: Option<PathBuf>,

        /// Only scan this project directory
        #[arg(long)]
        project: Option<String>,

        /// Max root-session files to load, newest first
        #[arg(long, default_value_t = 50)]
        limit: usize,

        /// Print the full timeline as JSON instead of a summary view
        #[arg(long)]
        json: bool,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Analyze { file, summary } => analyze_cmd::run_analyze(&file, summary.as_deref()),
        Commands::Export { file, out, format } => export_cmd::run_export(&file, &out, format),
        Commands::Timeline {
            root,
            project,
            limit,
            json,
        } => timeline_cmd::run_timeline(root.as_deref(), project.as_deref(), limit, json),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}
