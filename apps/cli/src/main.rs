//! TaskFlow CLI: turn a syllabus or lecture notes into a study kit.
//!
//! Runs the study pipeline on a document and prints the extracted tasks,
//! summary, flashcards and day-wise study plan.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
