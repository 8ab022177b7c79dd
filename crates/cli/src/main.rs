use std::process::ExitCode;

fn main() -> ExitCode {
    textagent_cli::run()
}
