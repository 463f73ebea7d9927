//! Bench sequencer - script-driven hardware-in-the-loop test runner
//!
//! Runs a test sequence script against power supply, resistance box and
//! oscilloscope control tools, and writes a report of every test case.

use benchseq::{cli, commands::Commands, runner::EXIT_FATAL};
use clap::Parser;

#[derive(Parser)]
#[command(name = "benchseq", about = "Hardware-in-the-loop test sequencer")]
#[command(version, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    match cli::dispatch(cli.command).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(EXIT_FATAL);
        }
    }
}
