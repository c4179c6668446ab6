use std::process::ExitCode;

fn main() -> ExitCode {
    smartqueue::app::startup::startup()
}
