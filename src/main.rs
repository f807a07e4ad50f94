use std::process::ExitCode;

fn main() -> ExitCode {
    quasi::cli::run()
}
