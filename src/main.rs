use std::process::ExitCode;

use clap::Parser;

use clinical_extract::cli::Cli;

fn main() -> ExitCode {
    let cli = Cli::parse();
    clinical_extract::init_tracing(cli.log_level.as_deref());

    match cli.run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Run could not start");
            eprintln!("error: {e}");
            ExitCode::from(2)
        }
    }
}
