use std::process::ExitCode;

fn main() -> ExitCode {
    helpbot_cli::run()
}
