//! Command-line interface and dispatch

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use pbt_core::prelude::*;

use crate::commands::{self, install::InstallOptions, Context, EndpointArgs};

/// pbt - install apps on and inspect Pebble watches and emulators
#[derive(Parser, Debug)]
#[command(name = "pbt", version)]
#[command(about = "Install apps on and inspect Pebble watches and emulators", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Install a .pbw on a watch, phone or emulator
    Install {
        /// Bundle to install [default: build/<project>.pbw]
        #[arg(value_name = "PBW")]
        pbw: Option<PathBuf>,

        /// Follow app logs after installing
        #[arg(long)]
        logs: bool,

        /// Kill running emulators before installing
        #[arg(long)]
        fresh: bool,

        #[command(flatten)]
        endpoint: EndpointArgs,
    },

    /// Show the status of every started emulator
    Status {
        /// Include error details
        #[arg(short = 'V', long)]
        verbose: bool,
    },

    /// Stop every started emulator
    Kill {
        /// Use SIGKILL instead of SIGTERM
        #[arg(long)]
        force: bool,
    },

    /// Delete persisted emulator state
    Wipe {
        /// Delete the whole persist directory, settings included
        #[arg(long)]
        everything: bool,
    },
}

/// Initialise error reporting and logging, then run `cli.command`.
pub async fn run(cli: Cli) -> Result<()> {
    color_eyre::install()
        .map_err(|e| Error::config(format!("cannot install error reporter: {e}")))?;
    pbt_core::logging::init()?;

    let ctx = Context::load()?;
    debug!("Command: {:?}", cli.command);

    let result = dispatch(&ctx, cli.command).await;
    if let Err(ref e) = result {
        if e.is_fatal() {
            error!("Command failed: {:?}", e);
        } else {
            warn!("Command failed: {:?}", e);
        }
    }
    result
}

/// Text printed for a failed command. Errors the user can act on from the
/// message alone are printed bare; the rest point at the log file.
pub fn failure_message(error: &Error, log_file: &Path) -> String {
    if error.is_recoverable() {
        error.to_string()
    } else {
        format!("{error}\nSee {} for details.", log_file.display())
    }
}

async fn dispatch(ctx: &Context, command: Command) -> Result<()> {
    match command {
        Command::Install {
            pbw,
            logs,
            fresh,
            endpoint,
        } => {
            let options = InstallOptions {
                bundle: pbw,
                logs,
                fresh,
            };
            commands::install::run(ctx, &endpoint, options).await
        }
        Command::Status { verbose } => commands::status::run(ctx, verbose).await,
        Command::Kill { force } => {
            commands::kill::run(ctx, force)?;
            Ok(())
        }
        Command::Wipe { everything } => {
            commands::wipe::run(ctx, everything)?;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_message_hints_at_log_file() {
        let log = Path::new("/logs/pbt.log.2026-10-18");

        let usage = Error::usage("You must either run this command from a project directory.");
        assert_eq!(
            failure_message(&usage, log),
            "You must either run this command from a project directory."
        );

        let rejected = Error::InstallRejected { status: 2 };
        assert_eq!(
            failure_message(&rejected, log),
            "App install failed (status 2)\nSee /logs/pbt.log.2026-10-18 for details."
        );

        let probe = Error::process_probe(7, "Operation not permitted");
        assert!(failure_message(&probe, log).ends_with("for details."));
    }

    #[test]
    fn test_install_flags() {
        let cli = Cli::try_parse_from(["pbt", "install", "app.pbw", "--logs", "--emulator", "chalk"])
            .unwrap();
        match cli.command {
            Command::Install {
                pbw,
                logs,
                fresh,
                endpoint,
            } => {
                assert_eq!(pbw, Some(PathBuf::from("app.pbw")));
                assert!(logs);
                assert!(!fresh);
                assert_eq!(endpoint.emulator.as_deref(), Some("chalk"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_endpoint_flags_are_exclusive() {
        let parsed = Cli::try_parse_from([
            "pbt",
            "install",
            "--phone",
            "10.0.0.2",
            "--qemu",
            "localhost:12344",
        ]);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_status_verbose_short_flag() {
        let cli = Cli::try_parse_from(["pbt", "status", "-V"]).unwrap();
        assert!(matches!(cli.command, Command::Status { verbose: true }));
    }

    #[test]
    fn test_kill_and_wipe_flags() {
        let cli = Cli::try_parse_from(["pbt", "kill", "--force"]).unwrap();
        assert!(matches!(cli.command, Command::Kill { force: true }));

        let cli = Cli::try_parse_from(["pbt", "wipe"]).unwrap();
        assert!(matches!(cli.command, Command::Wipe { everything: false }));
    }
}
