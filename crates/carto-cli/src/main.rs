use carto_cli::{CartoCli, CliArgs};
use clap::Parser;
use std::process::ExitCode;

/// Exit status for failures worth retrying (`EX_TEMPFAIL`).
const EXIT_RETRYABLE: u8 = 75;

/// Exit status for bad input (`EX_USAGE`).
const EXIT_USAGE: u8 = 64;

#[tokio::main]
async fn main() -> ExitCode {
    let args = CliArgs::parse();

    let result = match CartoCli::from_args("carto", &args) {
        Ok(cli) => cli.run(args).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            let code = if e.is_retryable() {
                eprintln!("(the operation may succeed if retried)");
                EXIT_RETRYABLE
            } else if e.is_usage_error() {
                EXIT_USAGE
            } else {
                1
            };
            // A timed-out computation may still be running on the blocking
            // pool; exit now rather than wait for the runtime to drain it.
            std::process::exit(i32::from(code))
        }
    }
}
