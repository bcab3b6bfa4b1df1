//! preplib - find the container image that shipped a set of libraries

use std::process::ExitCode;

fn main() -> ExitCode {
    if let Err(e) = preplib::cli::run() {
        eprintln!("Error: {:#}", e);
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
