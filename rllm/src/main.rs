use clap::Parser;
use rllm::errors::display_user_error;
use rllm::{Cli, init_tracing, run, setup_panic_handler};
use std::process::ExitCode;
use tracing::debug;

fn main() -> ExitCode {
    if let Err(err) = init_tracing() {
        eprintln!("rllm: {err}");
        return ExitCode::FAILURE;
    }
    setup_panic_handler();

    let cli = Cli::parse();
    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(err) => {
            eprintln!("rllm: failed to start async runtime: {err}");
            return ExitCode::FAILURE;
        }
    };

    match rt.block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            debug!("command failed: {:?}", err);
            display_user_error(&err);
            ExitCode::FAILURE
        }
    }
}
