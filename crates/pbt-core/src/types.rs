//! Domain types shared by the device and emulator crates

use serde::{Deserialize, Serialize};

/// Identifier of an installed watch application.
///
/// The all-zero UUID is reserved by the watch to mean "no app" (the
/// watchface or launcher is showing).
pub type AppUuid = uuid::Uuid;

/// One of the cooperating processes that together make up an emulator instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ProcessRole {
    /// The QEMU process emulating the watch hardware
    Engine,
    /// The pypkjs process running the phone-side JS runtime
    Runtime,
    /// The websockify process bridging VNC to the browser (optional)
    DisplayBridge,
}

impl ProcessRole {
    pub const ALL: [ProcessRole; 3] = [
        ProcessRole::Engine,
        ProcessRole::Runtime,
        ProcessRole::DisplayBridge,
    ];

    /// Key this role is stored under in the emulator registry file
    pub fn registry_key(&self) -> &'static str {
        match self {
            ProcessRole::Engine => "qemu",
            ProcessRole::Runtime => "pypkjs",
            ProcessRole::DisplayBridge => "websockify",
        }
    }

    /// Short label used when reporting per-role status
    pub fn label(&self) -> &'static str {
        match self {
            ProcessRole::Engine => "QEMU",
            ProcessRole::Runtime => "pypkjs",
            ProcessRole::DisplayBridge => "websockify",
        }
    }
}

impl std::fmt::Display for ProcessRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Identifies one emulator instance's recorded process set
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EmulatorInstanceKey {
    /// Watch platform (e.g., "basalt", "chalk")
    pub platform: String,
    /// SDK version the instance was launched with (e.g., "4.3")
    pub sdk_version: String,
}

impl EmulatorInstanceKey {
    pub fn new(platform: impl Into<String>, sdk_version: impl Into<String>) -> Self {
        Self {
            platform: platform.into(),
            sdk_version: sdk_version.into(),
        }
    }
}

impl std::fmt::Display for EmulatorInstanceKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (SDK {})", self.platform, self.sdk_version)
    }
}

/// A recorded process for one role of an emulator instance.
///
/// Written by the emulator launcher; read-only here. Unknown fields in the
/// registry file are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct ProcessRecord {
    /// Process ID at launch time
    #[serde(default)]
    pub pid: Option<u32>,

    /// Port the process listens on, if any
    #[serde(default)]
    pub port: Option<u16>,

    /// Whether the engine was launched with VNC enabled
    #[serde(default)]
    pub vnc: bool,
}

impl ProcessRecord {
    pub fn new(pid: u32) -> Self {
        Self {
            pid: Some(pid),
            ..Default::default()
        }
    }

    /// Set the recorded port (builder pattern)
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Set the VNC capability flag (builder pattern)
    pub fn with_vnc(mut self, vnc: bool) -> Self {
        self.vnc = vnc;
        self
    }
}
