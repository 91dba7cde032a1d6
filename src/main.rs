use std::process::ExitCode;

fn main() -> ExitCode {
    match medichelp_lib::run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e}");
            eprintln!("medichelp: {e}");
            ExitCode::FAILURE
        }
    }
}
