//! `pbt install` - install a bundle on a watch, phone or emulator

use std::io::Write;
use std::path::{Path, PathBuf};

use pbt_core::prelude::*;
use pbt_core::default_bundle_path;
use pbt_device::{follow_logs, install, Connection, TransferProgress};
use pbt_emulator::{kill_all, KillSignal, SignalProbe};

use super::{Context, EndpointArgs};

const NO_BUNDLE: &str =
    "You must either run this command from a project directory or specify the pbw to install.";

/// Options of the install command
#[derive(Debug, Clone, Default)]
pub struct InstallOptions {
    /// Bundle to install; defaults to the current project's build output
    pub bundle: Option<PathBuf>,
    /// Follow app logs after installing
    pub logs: bool,
    /// Kill running emulators first
    pub fresh: bool,
}

/// Run the install command.
pub async fn run(ctx: &Context, endpoint: &EndpointArgs, options: InstallOptions) -> Result<()> {
    let bundle = resolve_bundle(&ctx.cwd, options.bundle.as_deref())?;

    if options.fresh {
        let instances = ctx.registry().load()?;
        if kill_all(&instances, KillSignal::Terminate)? > 0 {
            println!("Killed emulator for fresh install.");
        }
    }

    let endpoint = endpoint.resolve(ctx, &SignalProbe)?;
    let mut connection = Connection::open(endpoint).await?;
    let result = install_bundle(&mut connection, &bundle, options.logs).await;
    connection.close().await;
    result
}

/// Bundle to install: `explicit` if given, else `build/<dirname>.pbw` under `cwd`.
///
/// # Errors
///
/// [`Error::Usage`] when no bundle was given and the project has not been built.
pub fn resolve_bundle(cwd: &Path, explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }
    let bundle = default_bundle_path(cwd);
    if !bundle.is_file() {
        debug!("No bundle at {}", bundle.display());
        return Err(Error::usage(NO_BUNDLE));
    }
    Ok(bundle)
}

/// Install `bundle` over an open connection, then optionally follow logs
/// until the peer disconnects or Ctrl-C.
pub async fn install_bundle(connection: &mut Connection, bundle: &Path, logs: bool) -> Result<()> {
    println!("Installing app...");
    let result = install(connection, bundle, |progress| {
        let _ = write_progress(&mut std::io::stderr(), &progress);
    })
    .await;

    result.into_result()?;
    println!("App install succeeded.");

    if logs {
        tokio::select! {
            _ = follow_logs(connection, |line| println!("{line}")) => {
                info!("Peer closed the connection while following logs");
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Stopped following logs");
            }
        }
    }
    Ok(())
}

/// Redraw the progress line in place, ending it once the object is complete.
pub fn write_progress<W: Write>(out: &mut W, progress: &TransferProgress) -> std::io::Result<()> {
    write!(out, "\r{}", progress_line(progress))?;
    if progress.total_sent >= progress.total_size {
        writeln!(out)?;
    }
    out.flush()
}

/// Terminal progress text for one acknowledged chunk
pub fn progress_line(progress: &TransferProgress) -> String {
    format!(
        "[{:>3.0}%] {}/{} bytes",
        progress.fraction() * 100.0,
        progress.total_sent,
        progress.total_size
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pbt_core::AppUuid;
    use pbt_device::test_utils::{message_connection, stream_connection, MockPeer};
    use tempfile::TempDir;

    fn project_with_bundle(temp: &TempDir, size: usize) -> PathBuf {
        let root = temp.path().join("hello-watch");
        std::fs::create_dir_all(root.join("build")).unwrap();
        std::fs::write(root.join("build").join("hello-watch.pbw"), vec![0x5a; size]).unwrap();
        root
    }

    #[test]
    fn test_default_bundle_is_project_build_output() {
        let temp = TempDir::new().unwrap();
        let root = project_with_bundle(&temp, 10);
        assert_eq!(
            resolve_bundle(&root, None).unwrap(),
            root.join("build/hello-watch.pbw")
        );
    }

    #[test]
    fn test_missing_default_bundle_explains_usage() {
        let temp = TempDir::new().unwrap();
        let err = resolve_bundle(temp.path(), None).unwrap_err();
        assert_eq!(err.to_string(), NO_BUNDLE);
    }

    #[test]
    fn test_explicit_bundle_is_not_checked_up_front() {
        let temp = TempDir::new().unwrap();
        let explicit = temp.path().join("elsewhere.pbw");
        assert_eq!(resolve_bundle(temp.path(), Some(&explicit)).unwrap(), explicit);
    }

    #[test]
    fn test_progress_line() {
        let progress = TransferProgress {
            sent: 2000,
            total_sent: 2000,
            total_size: 8000,
        };
        assert_eq!(progress_line(&progress), "[ 25%] 2000/8000 bytes");
    }

    #[test]
    fn test_write_progress_finishes_line_on_last_chunk() {
        let mut out = Vec::new();
        for total_sent in [2000, 4000, 4500] {
            let progress = TransferProgress {
                sent: 2000,
                total_sent,
                total_size: 4500,
            };
            write_progress(&mut out, &progress).unwrap();
        }
        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text,
            "\r[ 44%] 2000/4500 bytes\r[ 89%] 4000/4500 bytes\r[100%] 4500/4500 bytes\n"
        );
    }

    #[tokio::test]
    async fn test_install_bundle_over_message_transport() {
        let temp = TempDir::new().unwrap();
        let root = project_with_bundle(&temp, 64);
        let bundle = resolve_bundle(&root, None).unwrap();

        let (mut connection, peer) =
            message_connection(MockPeer::cooperative(AppUuid::nil()), 9000).await;
        install_bundle(&mut connection, &bundle, false).await.unwrap();
        connection.close().await;

        assert!(peer.await.unwrap().closed);
    }

    #[tokio::test]
    async fn test_install_bundle_over_stream_transport() {
        let temp = TempDir::new().unwrap();
        let root = project_with_bundle(&temp, 4500);
        let bundle = resolve_bundle(&root, None).unwrap();

        let (mut connection, peer) = stream_connection(MockPeer::cooperative(AppUuid::nil()));
        install_bundle(&mut connection, &bundle, false).await.unwrap();
        connection.close().await;

        assert_eq!(peer.await.unwrap().put_bytes().len(), 6);
    }

    #[tokio::test]
    async fn test_rejected_install_is_an_error() {
        let temp = TempDir::new().unwrap();
        let root = project_with_bundle(&temp, 64);
        let bundle = resolve_bundle(&root, None).unwrap();

        let (mut connection, _peer) =
            message_connection(MockPeer::cooperative(AppUuid::nil()).with_install_status(3), 9000)
                .await;
        let err = install_bundle(&mut connection, &bundle, false)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InstallRejected { status: 3 }));
        connection.close().await;
    }
}
