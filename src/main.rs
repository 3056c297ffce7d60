// src/main.rs

use clap::Parser;

use gatedag::cli::CliArgs;
use gatedag::engine::ExecutionStatus;
use gatedag::logging::init_logging;

#[tokio::main]
async fn main() {
    let args = CliArgs::parse();

    if let Err(err) = init_logging(args.log_level) {
        eprintln!("failed to initialise logging: {err}");
        std::process::exit(2);
    }

    match gatedag::run(args).await {
        Ok(execution) => match execution.status {
            ExecutionStatus::Completed => {}
            ExecutionStatus::Failed => std::process::exit(1),
            ExecutionStatus::Cancelled => std::process::exit(130),
            ExecutionStatus::Running => unreachable!("engine returns settled executions"),
        },
        Err(err) => {
            eprintln!("gatedag: {err}");
            std::process::exit(2);
        }
    }
}
