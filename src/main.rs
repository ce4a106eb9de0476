//! pbt - install apps on and inspect Pebble watches and emulators
//!
//! This is the binary entry point. All logic lives in the library.

use clap::Parser;
use pebble_tool::cli::failure_message;
use pebble_tool::Cli;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = pebble_tool::run(cli).await {
        let log_file = pbt_core::logging::get_current_log_file();
        eprintln!("{}", failure_message(&e, &log_file));
        std::process::exit(1);
    }
}
