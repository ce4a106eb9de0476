//! Reader for the emulator launcher's process registry.
//!
//! The launcher records every emulator it starts in a JSON file keyed by
//! platform, then SDK version, then role:
//!
//! ```json
//! {
//!   "basalt": {
//!     "4.3": {
//!       "qemu": { "pid": 4012, "port": 49301, "vnc": false },
//!       "pypkjs": { "pid": 4020, "port": 49305 },
//!       "websockify": { "pid": 4031 }
//!     }
//!   }
//! }
//! ```
//!
//! This module only reads the file. The nested mapping is flattened once
//! into one [`EmulatorInstance`] per `(platform, version)` pair.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use pbt_core::prelude::*;
use pbt_core::{EmulatorInstanceKey, ProcessRecord, ProcessRole};

type RawRegistry = BTreeMap<String, BTreeMap<String, BTreeMap<String, ProcessRecord>>>;

/// One emulator instance and the processes recorded for it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmulatorInstance {
    pub key: EmulatorInstanceKey,
    pub processes: BTreeMap<ProcessRole, ProcessRecord>,
}

impl EmulatorInstance {
    pub fn new(key: EmulatorInstanceKey) -> Self {
        Self {
            key,
            processes: BTreeMap::new(),
        }
    }

    /// Add a record for `role` (builder pattern)
    pub fn with_process(mut self, role: ProcessRole, record: ProcessRecord) -> Self {
        self.processes.insert(role, record);
        self
    }

    pub fn record(&self, role: ProcessRole) -> Option<&ProcessRecord> {
        self.processes.get(&role)
    }

    /// Recorded pid for `role`, if any
    pub fn pid(&self, role: ProcessRole) -> Option<u32> {
        self.record(role).and_then(|record| record.pid)
    }

    /// Websocket port of the JS runtime, if one was recorded
    pub fn runtime_port(&self) -> Option<u16> {
        self.record(ProcessRole::Runtime).and_then(|record| record.port)
    }

    /// Whether the engine was launched with VNC
    pub fn vnc_enabled(&self) -> bool {
        self.record(ProcessRole::Engine)
            .map(|record| record.vnc)
            .unwrap_or(false)
    }

    /// Every recorded pid, engine first
    pub fn pids(&self) -> Vec<u32> {
        ProcessRole::ALL
            .iter()
            .filter_map(|role| self.pid(*role))
            .collect()
    }
}

/// Handle to the registry file
#[derive(Debug, Clone)]
pub struct ProcessRegistry {
    path: PathBuf,
}

impl ProcessRegistry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every recorded instance, ordered by platform then SDK version.
    ///
    /// A missing or empty file means no emulators have been started.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(&self) -> Result<Vec<EmulatorInstance>> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No emulator registry at {}", self.path.display());
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };
        parse(&contents).with_context(|| format!("reading {}", self.path.display()))
    }

    /// Find the instance recorded for `key`.
    pub fn find(&self, key: &EmulatorInstanceKey) -> Result<Option<EmulatorInstance>> {
        Ok(self.load()?.into_iter().find(|instance| &instance.key == key))
    }
}

/// Parse registry JSON. Role keys other than the known three are ignored.
pub fn parse(contents: &str) -> Result<Vec<EmulatorInstance>> {
    if contents.trim().is_empty() {
        return Ok(Vec::new());
    }

    let raw: RawRegistry = serde_json::from_str(contents)?;
    let mut instances = Vec::new();
    for (platform, versions) in raw {
        for (version, roles) in versions {
            let mut instance = EmulatorInstance::new(EmulatorInstanceKey::new(&platform, version));
            for (role_key, record) in roles {
                match role_from_key(&role_key) {
                    Some(role) => {
                        instance.processes.insert(role, record);
                    }
                    None => trace!("Ignoring registry entry '{}' for {}", role_key, platform),
                }
            }
            instances.push(instance);
        }
    }
    Ok(instances)
}

fn role_from_key(key: &str) -> Option<ProcessRole> {
    ProcessRole::ALL
        .into_iter()
        .find(|role| role.registry_key() == key)
}
