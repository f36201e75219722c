use clap::Parser;
use someimage::cli::Cli;
use someimage::utils;
use std::process::ExitCode;
use tracing::error;

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            // --help output is not a failure; every other parse error exits 1
            let code = if err.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
            let _ = err.print();
            return code;
        }
    };

    // Used until the configured logger takes over
    let bootstrap = utils::logger::bootstrap();

    let logger = match tracing::dispatcher::with_default(&bootstrap, || cli.load_config()) {
        Ok(logger) => logger,
        Err(_) => return ExitCode::FAILURE,
    };

    if let Err(err) = logger.install() {
        tracing::dispatcher::with_default(&bootstrap, || {
            error!(component = "logger", err = %err, "Failed to install logger")
        });
        return ExitCode::FAILURE;
    }

    match cli.execute(&logger) {
        Ok(()) => ExitCode::SUCCESS,
        Err(_) => ExitCode::FAILURE,
    }
}
