// src/main.rs

use std::process::ExitCode;

use bdpipe::{cli, logging, run};

/// Exit status 1 covers both configuration/launch errors and a halted or
/// interrupted walk; the reason is printed to stderr.
#[tokio::main]
async fn main() -> ExitCode {
    let args = cli::parse();
    if let Err(err) = logging::init_logging(args.log_level) {
        eprintln!("bdpipe: cannot initialise logging: {err:?}");
        return ExitCode::FAILURE;
    }

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("bdpipe error: {err:?}");
            ExitCode::FAILURE
        }
    }
}
