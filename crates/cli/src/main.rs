use std::process::ExitCode;

fn main() -> ExitCode {
    sift_cli::run()
}
