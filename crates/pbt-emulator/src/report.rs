//! Plain-text rendering of emulator statuses for the `status` command.

use pbt_core::ProcessRole;

use crate::app_state::AppState;
use crate::status::{AppQuery, CompositeState, DisplayBridge, EmulatorStatus, RoleStatus};

/// Printed when the registry has no instances
pub const NO_EMULATORS: &str = "No emulators have been started.";

const DETAIL_INDENT: &str = "          ";

/// Render every status, each preceded by a blank line.
pub fn render_report(statuses: &[EmulatorStatus], verbose: bool) -> String {
    if statuses.is_empty() {
        return NO_EMULATORS.to_string();
    }
    statuses
        .iter()
        .map(|status| format!("\n{}", render_status(status, verbose).join("\n")))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Lines describing one instance.
pub fn render_status(status: &EmulatorStatus, verbose: bool) -> Vec<String> {
    let mut lines = vec![
        format!("=== Emulator: {} ===", status.key),
        format!("Status: {}", status.state),
    ];

    let running = status.state != CompositeState::Stopped;
    lines.push(role_line(ProcessRole::Engine, &status.engine, running));
    lines.push(role_line(ProcessRole::Runtime, &status.runtime, running));
    if !running {
        return lines;
    }

    match status.display_bridge {
        DisplayBridge::NotApplicable => {}
        DisplayBridge::Alive { pid } => {
            lines.push(format!("  VNC:    enabled (websockify pid {pid})"));
        }
        DisplayBridge::NotRunning { .. } => {
            lines.push("  VNC:    enabled but websockify not running".to_string());
        }
    }

    match &status.app {
        AppQuery::Skipped => {}
        AppQuery::NoPort => lines.push("  App:    unable to query (no pypkjs port)".to_string()),
        AppQuery::Queried(state) => app_lines(state, verbose, &mut lines),
    }
    lines
}

fn role_line(role: ProcessRole, status: &RoleStatus, instance_running: bool) -> String {
    let label = format!("{}:", role.label());
    let pid = status
        .pid
        .map(|pid| pid.to_string())
        .unwrap_or_else(|| "unknown".to_string());
    let state = match (status.alive, instance_running) {
        (true, _) => format!("running (pid {pid})"),
        (false, true) => format!("NOT RUNNING (was pid {pid})"),
        (false, false) => format!("not running (was pid {pid})"),
    };
    format!("  {label:<7} {state}")
}

fn app_lines(state: &AppState, verbose: bool, lines: &mut Vec<String>) {
    match state {
        AppState::Running {
            uuid,
            current_project: true,
        } => lines.push(format!("  App:    RUNNING ({uuid} - current project)")),
        AppState::Running { uuid, .. } => {
            lines.push(format!("  App:    RUNNING ({uuid})"));
            if verbose {
                lines.push(format!("{DETAIL_INDENT}(not the current project)"));
            }
        }
        AppState::Idle => lines.push("  App:    no app running (showing watchface)".to_string()),
        AppState::Unresponsive => {
            lines.push("  App:    UNRESPONSIVE (timed out querying app state)".to_string());
            if verbose {
                lines.push(format!(
                    "{DETAIL_INDENT}The app may be stuck in an infinite loop or crashed"
                ));
            }
        }
        AppState::Disconnected { detail } => {
            lines.push("  App:    DISCONNECTED (could not connect to emulator)".to_string());
            if verbose {
                lines.push(format!("{DETAIL_INDENT}Error: {detail}"));
            }
        }
        AppState::Unknown { detail } => {
            lines.push("  App:    UNKNOWN (error querying status)".to_string());
            if verbose {
                lines.push(format!("{DETAIL_INDENT}Error: {detail}"));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::DegradedReason;
    use pbt_core::{AppUuid, EmulatorInstanceKey};

    fn status(state: CompositeState, app: AppQuery) -> EmulatorStatus {
        let (engine_alive, runtime_alive) = match state {
            CompositeState::Running => (true, true),
            CompositeState::Degraded(DegradedReason::RuntimeDown) => (true, false),
            CompositeState::Degraded(DegradedReason::EngineDown) => (false, true),
            CompositeState::Stopped => (false, false),
        };
        EmulatorStatus {
            key: EmulatorInstanceKey::new("basalt", "4.3"),
            engine: RoleStatus {
                pid: Some(100),
                alive: engine_alive,
            },
            runtime: RoleStatus {
                pid: Some(101),
                alive: runtime_alive,
            },
            state,
            display_bridge: DisplayBridge::NotApplicable,
            app,
        }
    }

    #[test]
    fn test_empty_report() {
        assert_eq!(render_report(&[], false), NO_EMULATORS);
    }

    #[test]
    fn test_running_current_project() {
        let uuid = AppUuid::from_u128(0xabc);
        let lines = render_status(
            &status(
                CompositeState::Running,
                AppQuery::Queried(AppState::Running {
                    uuid,
                    current_project: true,
                }),
            ),
            false,
        );
        assert_eq!(
            lines,
            vec![
                "=== Emulator: basalt (SDK 4.3) ===".to_string(),
                "Status: RUNNING".to_string(),
                "  QEMU:   running (pid 100)".to_string(),
                "  pypkjs: running (pid 101)".to_string(),
                format!("  App:    RUNNING ({uuid} - current project)"),
            ]
        );
    }

    #[test]
    fn test_degraded_marks_dead_role() {
        let lines = render_status(
            &status(
                CompositeState::Degraded(DegradedReason::RuntimeDown),
                AppQuery::Skipped,
            ),
            false,
        );
        assert_eq!(lines[1], "Status: DEGRADED (pypkjs not running)");
        assert_eq!(lines[3], "  pypkjs: NOT RUNNING (was pid 101)");
        assert_eq!(lines.len(), 4);
    }

    #[test]
    fn test_stopped_omits_vnc_and_app() {
        let mut stopped = status(CompositeState::Stopped, AppQuery::Skipped);
        stopped.display_bridge = DisplayBridge::NotRunning { pid: Some(5) };
        let lines = render_status(&stopped, true);
        assert_eq!(lines[2], "  QEMU:   not running (was pid 100)");
        assert_eq!(lines.len(), 4);
    }

    #[test]
    fn test_vnc_lines() {
        let mut running = status(CompositeState::Running, AppQuery::NoPort);
        running.display_bridge = DisplayBridge::Alive { pid: 7 };
        let lines = render_status(&running, false);
        assert!(lines.contains(&"  VNC:    enabled (websockify pid 7)".to_string()));
        assert_eq!(
            lines.last().unwrap(),
            "  App:    unable to query (no pypkjs port)"
        );

        running.display_bridge = DisplayBridge::NotRunning { pid: None };
        let lines = render_status(&running, false);
        assert!(lines.contains(&"  VNC:    enabled but websockify not running".to_string()));
    }

    #[test]
    fn test_verbose_details() {
        let unknown = status(
            CompositeState::Running,
            AppQuery::Queried(AppState::Unknown {
                detail: "boom".into(),
            }),
        );
        assert!(!render_status(&unknown, false).iter().any(|l| l.contains("boom")));
        assert_eq!(
            render_status(&unknown, true).last().unwrap(),
            "          Error: boom"
        );

        let other_app = status(
            CompositeState::Running,
            AppQuery::Queried(AppState::Running {
                uuid: AppUuid::from_u128(1),
                current_project: false,
            }),
        );
        assert_eq!(
            render_status(&other_app, true).last().unwrap(),
            "          (not the current project)"
        );
    }

    #[test]
    fn test_report_separates_instances() {
        let report = render_report(
            &[
                status(CompositeState::Stopped, AppQuery::Skipped),
                status(CompositeState::Stopped, AppQuery::Skipped),
            ],
            false,
        );
        assert_eq!(report.matches("=== Emulator").count(), 2);
        assert_eq!(report.matches("\n\n=== Emulator").count(), 1);
        assert!(report.starts_with("\n=== Emulator"));
    }
}
