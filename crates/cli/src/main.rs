use std::process::ExitCode;

fn main() -> ExitCode {
    safework_cli::run()
}
