use anyhow::Result;
use clap::{Parser, Subcommand};

mod tui;

#[derive(Parser)]
#[command(name = "chronoscope")]
#[command(about = "Interactive visualizer for GPU compute-profile traces", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Launch the interactive trace viewer.
    Open {
        /// Path to a trace file. No real backend is linked into this binary
        /// (see the crate's controller module docs) — the bundled demo
        /// controller serves synthetic data and only uses this path as a
        /// session label.
        #[arg(default_value = "demo.trace")]
        trace: String,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Open { trace } => tui::launch(&trace)?,
    }
    Ok(())
}
