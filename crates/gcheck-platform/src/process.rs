//! Fooling program process and service control
//!
//! On Windows processes are killed with `taskkill` and services are stopped
//! and deleted with `sc`. Elsewhere processes are killed with `pkill` and
//! there are no services to manage.

use crate::error::{PlatformError, Result};
use async_trait::async_trait;
use gcheck_core::config::{ProgramKind, Settings};
use gcheck_core::lifecycle::LifecycleController;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x08000000;

/// `taskkill` exit code when no process matched
#[cfg(windows)]
const TASKKILL_NOT_FOUND: i32 = 128;

/// `pkill` exit code when no process matched
#[cfg(not(windows))]
const PKILL_NOT_FOUND: i32 = 1;

/// How long a killed program may take to exit
const EXIT_TIMEOUT: Duration = Duration::from_secs(5);

/// A launched program instance
#[derive(Debug)]
pub struct RunningProgram {
    child: Child,
    program: String,
}

impl RunningProgram {
    /// Process id, `None` once the process has been reaped
    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }
}

/// Lifecycle controller backed by real processes and services
#[derive(Debug, Clone)]
pub struct ProcessController {
    known_executables: Vec<String>,
    known_services: Vec<String>,
    interception_services: Vec<String>,
    selected_executable: String,
    skip_task_kill: bool,
    skip_service_kill: bool,
}

impl ProcessController {
    /// Build a controller for the selected program
    pub fn new(settings: &Settings, selected: ProgramKind) -> Self {
        Self {
            known_executables: settings.programs.executables(),
            known_services: settings.programs.service_names(),
            interception_services: settings.lifecycle.interception_service_names.clone(),
            selected_executable: settings.programs.get(selected).executable.clone(),
            skip_task_kill: settings.lifecycle.skip_task_kill,
            skip_service_kill: settings.lifecycle.skip_service_kill,
        }
    }

    /// Override the skip flags from the command line
    pub fn with_skips(mut self, skip_task_kill: bool, skip_service_kill: bool) -> Self {
        self.skip_task_kill |= skip_task_kill;
        self.skip_service_kill |= skip_service_kill;
        self
    }

    async fn kill_all(&self, executables: &[String]) {
        if self.skip_task_kill {
            info!("Skipping process termination");
            return;
        }
        for exe in executables {
            match kill_by_name(exe).await {
                Ok(true) => info!(process = %exe, "Process was terminated"),
                Ok(false) => debug!(process = %exe, "Process not found"),
                Err(e) => warn!(process = %exe, error = %e, "Can't terminate process, skipping"),
            }
        }
    }

    async fn remove_services<'a>(&self, services: impl Iterator<Item = &'a String>) {
        if self.skip_service_kill {
            info!("Skipping service removal");
            return;
        }
        for service in services {
            if let Err(e) = stop_and_delete_service(service).await {
                debug!(service = %service, error = %e, "Service not removed, skipping");
            }
        }
    }
}

#[async_trait]
impl LifecycleController for ProcessController {
    type Handle = RunningProgram;

    async fn launch(&self, executable: &Path, tokens: &[String]) -> gcheck_core::Result<RunningProgram> {
        let program = executable.display().to_string();
        let mut cmd = Command::new(executable);
        push_tokens(&mut cmd, tokens);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        #[cfg(windows)]
        {
            cmd.creation_flags(CREATE_NO_WINDOW);
        }

        let child = cmd
            .spawn()
            .map_err(|e| gcheck_core::Error::launch(&program, e.to_string()))?;
        debug!(program = %program, pid = ?child.id(), "Program started");

        Ok(RunningProgram { child, program })
    }

    async fn terminate(&self, mut handle: RunningProgram) -> gcheck_core::Result<()> {
        // Kill the whole tree, zapret and GoodbyeDPI may fork helpers
        #[cfg(windows)]
        {
            if let Some(pid) = handle.child.id() {
                let pid = pid.to_string();
                if let Err(e) = run_quiet("taskkill", &["/PID", &pid, "/T", "/F"]).await {
                    debug!(error = %e, "taskkill by PID failed");
                }
            }
        }

        if let Err(e) = handle.child.start_kill() {
            debug!(program = %handle.program, error = %e, "Kill signal not delivered");
        }

        match tokio::time::timeout(EXIT_TIMEOUT, handle.child.wait()).await {
            Ok(Ok(status)) => {
                debug!(program = %handle.program, %status, "Program exited");
                Ok(())
            }
            Ok(Err(e)) => Err(gcheck_core::Error::teardown(format!(
                "can't wait for '{}': {e}",
                handle.program
            ))),
            Err(_) => Err(gcheck_core::Error::teardown(format!(
                "'{}' did not exit within {:?}",
                handle.program, EXIT_TIMEOUT
            ))),
        }
    }

    async fn stop_competitors(&self) {
        self.kill_all(&self.known_executables).await;
        self.remove_services(self.known_services.iter().chain(&self.interception_services))
            .await;
    }

    async fn final_cleanup(&self) {
        info!("Cleaning up after the run...");
        self.kill_all(std::slice::from_ref(&self.selected_executable))
            .await;
        self.remove_services(self.interception_services.iter()).await;
    }
}

/// Pass strategy tokens to the program.
///
/// On Windows the tokens form the raw command line so that quoting inside
/// strategy lists reaches the program untouched.
fn push_tokens(cmd: &mut Command, tokens: &[String]) {
    #[cfg(windows)]
    {
        if !tokens.is_empty() {
            cmd.raw_arg(tokens.join(" "));
        }
    }
    #[cfg(not(windows))]
    {
        cmd.args(tokens);
    }
}

async fn run_quiet(program: &str, args: &[&str]) -> Result<ExitStatus> {
    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());

    #[cfg(windows)]
    {
        cmd.creation_flags(CREATE_NO_WINDOW);
    }

    cmd.status().await.map_err(|e| PlatformError::Spawn {
        program: program.to_string(),
        message: e.to_string(),
    })
}

/// Kill every process with this executable name. `Ok(false)` if none ran.
pub async fn kill_by_name(executable: &str) -> Result<bool> {
    #[cfg(windows)]
    let (status, not_found) = (
        run_quiet("taskkill", &["/IM", executable, "/T", "/F"]).await?,
        TASKKILL_NOT_FOUND,
    );
    #[cfg(not(windows))]
    let (status, not_found) = (run_quiet("pkill", &["-x", executable]).await?, PKILL_NOT_FOUND);

    match status.code() {
        Some(0) => Ok(true),
        Some(code) if code == not_found => Ok(false),
        _ => Err(PlatformError::Kill(executable.to_string())),
    }
}

/// Stop a service and mark it for deletion
#[cfg(windows)]
pub async fn stop_and_delete_service(service: &str) -> Result<()> {
    // Stopping fails for services that are not running, deletion still applies
    if !run_quiet("sc", &["stop", service]).await?.success() {
        debug!(service, "Service was not running");
    }
    if run_quiet("sc", &["delete", service]).await?.success() {
        info!(service, "Service was deleted");
        Ok(())
    } else {
        Err(PlatformError::ServiceControl {
            action: "delete",
            service: service.to_string(),
        })
    }
}

/// Stop a service and mark it for deletion
#[cfg(not(windows))]
pub async fn stop_and_delete_service(service: &str) -> Result<()> {
    debug!(service, "No service manager on this platform");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_controller_from_settings() {
        let settings = Settings::default();
        let controller = ProcessController::new(&settings, ProgramKind::Zapret).with_skips(true, false);

        assert_eq!(controller.selected_executable, "winws.exe");
        assert_eq!(controller.known_executables.len(), 3);
        assert!(controller.known_services.contains(&"GoodbyeDPI".to_string()));
        assert_eq!(controller.interception_services, vec!["WinDivert", "WinDivert14"]);
        assert!(controller.skip_task_kill);
        assert!(!controller.skip_service_kill);
    }

    #[tokio::test]
    async fn test_launch_missing_executable() {
        let controller = ProcessController::new(&Settings::default(), ProgramKind::GoodbyeDpi);
        let err = controller
            .launch(Path::new("/definitely/not/here.exe"), &["-5".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, gcheck_core::Error::Launch { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_launch_and_terminate() {
        let controller = ProcessController::new(&Settings::default(), ProgramKind::GoodbyeDpi);
        let handle = controller
            .launch(Path::new("sleep"), &["30".to_string()])
            .await
            .unwrap();
        assert!(handle.id().is_some());
        controller.terminate(handle).await.unwrap();
    }
}
