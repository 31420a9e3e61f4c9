// Entrypoint for the CLI application. Keeps `main` small: everything,
// including logging setup, happens in `cli::run_cli`.

use papra_share::cli::run_cli;
use std::process::ExitCode;

fn main() -> anyhow::Result<ExitCode> {
    run_cli()
}
