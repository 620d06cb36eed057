//! restorectl entry point
//!
//! Argument parsing, configuration and output all live in the CLI module.

use restorectl::cli;

fn main() {
    if let Err(e) = cli::run() {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}
