//! `koi` command-line tool.
//!
//! ```bash
//! # explore and prepare the data
//! koi explore "KOI Selected Data.csv"
//! koi select "KOI Modified Data.csv" -o "KOI Selected 2000 Signals.csv"
//!
//! # train, compare, predict
//! koi train --config svm.yaml
//! koi compare --data "KOI Selected 2000 Signals.csv" --output artifacts
//! koi predict --model-dir artifacts new_kois.csv
//! ```

use clap::Parser;
use koi_classifier::cli::{run_command, Cli};
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run_command(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
