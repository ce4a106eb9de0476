//! Subcommands of `pbt`
//!
//! Each command takes a [`Context`] (settings, persist directory and working
//! directory) so it can run against fixture directories in tests.

pub mod install;
pub mod kill;
pub mod status;
pub mod wipe;

use std::path::PathBuf;

use pbt_core::prelude::*;
use pbt_core::EmulatorInstanceKey;
use pbt_device::Endpoint;
use pbt_emulator::{runtime_endpoint, ProcessProbe, ProcessRegistry};

use crate::config::{load_settings, persist_dir, Settings};

/// Emulator platform used when no endpoint flag is given
pub const DEFAULT_EMULATOR_PLATFORM: &str = "basalt";

/// Everything a command needs from its environment
#[derive(Debug, Clone)]
pub struct Context {
    pub persist_dir: PathBuf,
    pub settings: Settings,
    pub cwd: PathBuf,
}

impl Context {
    pub fn new(persist_dir: PathBuf, settings: Settings, cwd: PathBuf) -> Self {
        Self {
            persist_dir,
            settings,
            cwd,
        }
    }

    /// Context of the current process: resolved persist dir, its settings
    /// and the working directory.
    pub fn load() -> Result<Self> {
        let persist_dir = persist_dir();
        let settings = load_settings(&persist_dir)?;
        let cwd = std::env::current_dir()?;
        debug!("Persist dir: {}", persist_dir.display());
        Ok(Self::new(persist_dir, settings, cwd))
    }

    /// Registry of emulator processes recorded by the launcher
    pub fn registry(&self) -> ProcessRegistry {
        ProcessRegistry::new(self.settings.registry_path())
    }
}

/// Where a device command connects
#[derive(Debug, Clone, Default, PartialEq, Eq, clap::Args)]
#[group(multiple = false)]
pub struct EndpointArgs {
    /// Connect to the developer connection of the phone at HOST
    #[arg(long, value_name = "HOST")]
    pub phone: Option<String>,

    /// Connect to a watch over a serial device
    #[arg(long, value_name = "PATH")]
    pub serial: Option<PathBuf>,

    /// Connect to a QEMU serial socket
    #[arg(long, value_name = "HOST:PORT")]
    pub qemu: Option<String>,

    /// Connect to the running emulator for PLATFORM [default: basalt]
    #[arg(long, value_name = "PLATFORM")]
    pub emulator: Option<String>,
}

impl EndpointArgs {
    /// Turn the flags into an [`Endpoint`].
    ///
    /// # Errors
    ///
    /// [`Error::EmulatorNotRunning`] when targeting an emulator that is not
    /// RUNNING.
    pub fn resolve<P: ProcessProbe>(&self, ctx: &Context, prober: &P) -> Result<Endpoint> {
        if let Some(host) = &self.phone {
            return Ok(Endpoint::phone(host, ctx.settings.phone.port));
        }
        if let Some(path) = &self.serial {
            return Ok(Endpoint::Serial(path.clone()));
        }
        if let Some(addr) = &self.qemu {
            let addr = addr.strip_prefix("tcp://").unwrap_or(addr);
            return Ok(Endpoint::Qemu(addr.to_string()));
        }

        let platform = self
            .emulator
            .as_deref()
            .unwrap_or(DEFAULT_EMULATOR_PLATFORM);
        let key = EmulatorInstanceKey::new(platform, &ctx.settings.sdk.version);
        runtime_endpoint(&ctx.registry(), prober, &key)
    }
}
