//! Correlated status of every recorded emulator instance.

use pbt_core::prelude::*;
use pbt_core::{EmulatorInstanceKey, ProcessRole};
use pbt_device::Endpoint;

use crate::app_state::{query_app_state, AppState, Connector, ProjectResolver};
use crate::liveness::ProcessProbe;
use crate::registry::{EmulatorInstance, ProcessRegistry};

/// Which of the two required processes is down
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DegradedReason {
    EngineDown,
    RuntimeDown,
}

/// Overall state of an instance, from engine and runtime liveness alone
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompositeState {
    Running,
    Degraded(DegradedReason),
    Stopped,
}

impl CompositeState {
    pub fn from_liveness(engine_alive: bool, runtime_alive: bool) -> Self {
        match (engine_alive, runtime_alive) {
            (true, true) => CompositeState::Running,
            (true, false) => CompositeState::Degraded(DegradedReason::RuntimeDown),
            (false, true) => CompositeState::Degraded(DegradedReason::EngineDown),
            (false, false) => CompositeState::Stopped,
        }
    }
}

impl std::fmt::Display for CompositeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CompositeState::Running => write!(f, "RUNNING"),
            CompositeState::Degraded(DegradedReason::EngineDown) => {
                write!(f, "DEGRADED ({} not running)", ProcessRole::Engine.label())
            }
            CompositeState::Degraded(DegradedReason::RuntimeDown) => {
                write!(f, "DEGRADED ({} not running)", ProcessRole::Runtime.label())
            }
            CompositeState::Stopped => write!(f, "STOPPED"),
        }
    }
}

/// Liveness of one recorded role
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleStatus {
    pub pid: Option<u32>,
    pub alive: bool,
}

/// State of the VNC display bridge.
///
/// Only an engine launched with VNC has a bridge. A VNC engine whose bridge
/// was never recorded is reported the same as one whose bridge died, with
/// `pid: None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayBridge {
    NotApplicable,
    Alive { pid: u32 },
    NotRunning { pid: Option<u32> },
}

/// Outcome of the app-state step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppQuery {
    /// The instance is not fully running
    Skipped,
    /// Running, but no runtime port was recorded
    NoPort,
    Queried(AppState),
}

/// Derived status of one instance. Recomputed on every call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmulatorStatus {
    pub key: EmulatorInstanceKey,
    pub engine: RoleStatus,
    pub runtime: RoleStatus,
    pub state: CompositeState,
    pub display_bridge: DisplayBridge,
    pub app: AppQuery,
}

/// Fans out over the registry, probing processes and querying live
/// instances.
pub struct StatusAggregator<P, C, R> {
    registry: ProcessRegistry,
    prober: P,
    connector: C,
    project: R,
}

impl<P, C, R> StatusAggregator<P, C, R>
where
    P: ProcessProbe,
    C: Connector,
    R: ProjectResolver,
{
    pub fn new(registry: ProcessRegistry, prober: P, connector: C, project: R) -> Self {
        Self {
            registry,
            prober,
            connector,
            project,
        }
    }

    /// Status of every recorded instance, in registry order.
    ///
    /// # Errors
    ///
    /// Fails only if the registry cannot be read or a liveness probe is
    /// broken. App-state failures are folded into [`AppQuery::Queried`].
    pub async fn compute_status(&self) -> Result<Vec<EmulatorStatus>> {
        let instances = self.registry.load()?;
        debug!("Computing status for {} emulator instance(s)", instances.len());

        let mut statuses = Vec::with_capacity(instances.len());
        for instance in &instances {
            statuses.push(self.instance_status(instance).await?);
        }
        Ok(statuses)
    }

    pub async fn instance_status(&self, instance: &EmulatorInstance) -> Result<EmulatorStatus> {
        let engine = role_status(&self.prober, instance, ProcessRole::Engine)?;
        let runtime = role_status(&self.prober, instance, ProcessRole::Runtime)?;
        let state = CompositeState::from_liveness(engine.alive, runtime.alive);
        let display_bridge = display_bridge(&self.prober, instance)?;

        let app = match (state, instance.runtime_port()) {
            (CompositeState::Running, Some(port)) => {
                AppQuery::Queried(query_app_state(&self.connector, port, &self.project).await)
            }
            (CompositeState::Running, None) => AppQuery::NoPort,
            _ => AppQuery::Skipped,
        };

        debug!("{}: {}", instance.key, state);
        Ok(EmulatorStatus {
            key: instance.key.clone(),
            engine,
            runtime,
            state,
            display_bridge,
            app,
        })
    }
}

fn role_status<P: ProcessProbe>(
    prober: &P,
    instance: &EmulatorInstance,
    role: ProcessRole,
) -> Result<RoleStatus> {
    let pid = instance.pid(role);
    let alive = match pid {
        Some(pid) => prober.is_alive(pid)?,
        None => false,
    };
    Ok(RoleStatus { pid, alive })
}

fn display_bridge<P: ProcessProbe>(prober: &P, instance: &EmulatorInstance) -> Result<DisplayBridge> {
    if !instance.vnc_enabled() {
        return Ok(DisplayBridge::NotApplicable);
    }
    let bridge = role_status(prober, instance, ProcessRole::DisplayBridge)?;
    Ok(match bridge {
        RoleStatus {
            pid: Some(pid),
            alive: true,
        } => DisplayBridge::Alive { pid },
        RoleStatus { pid, .. } => DisplayBridge::NotRunning { pid },
    })
}

/// Websocket endpoint of the running instance for `key`.
///
/// # Errors
///
/// [`Error::EmulatorNotRunning`] unless both engine and runtime are alive
/// and a runtime port was recorded.
pub fn runtime_endpoint<P: ProcessProbe>(
    registry: &ProcessRegistry,
    prober: &P,
    key: &EmulatorInstanceKey,
) -> Result<Endpoint> {
    let not_running = |why: &str| {
        Error::emulator_not_running(
            &key.platform,
            format!("{why} (start the {} emulator first)", key.platform),
        )
    };

    let instance = registry
        .find(key)?
        .ok_or_else(|| not_running("no emulator has been started"))?;
    let engine = role_status(prober, &instance, ProcessRole::Engine)?;
    let runtime = role_status(prober, &instance, ProcessRole::Runtime)?;
    if CompositeState::from_liveness(engine.alive, runtime.alive) != CompositeState::Running {
        return Err(not_running("the emulator is not running"));
    }
    let port = instance
        .runtime_port()
        .ok_or_else(|| not_running("no pypkjs port was recorded"))?;
    Ok(Endpoint::localhost(port))
}
