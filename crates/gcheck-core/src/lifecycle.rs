//! External program lifecycle capability
//!
//! The fooling program owns the host's interception path, so exactly one
//! instance may run at a time. The engine starts one instance per strategy
//! and relies on the controller to stop it again and to clear any
//! competing programs or services before the run.

use crate::error::Result;
use async_trait::async_trait;
use std::path::Path;

/// Starts and stops the external traffic-shaping program
#[async_trait]
pub trait LifecycleController: Send + Sync {
    /// Handle to one running instance
    type Handle: Send;

    /// Start the program with the given arguments.
    ///
    /// Fails with [`Error::Launch`](crate::Error::Launch) if the process
    /// can't be started.
    async fn launch(&self, executable: &Path, tokens: &[String]) -> Result<Self::Handle>;

    /// Stop an instance and wait until it is gone.
    ///
    /// Fails with [`Error::Teardown`](crate::Error::Teardown) if the exit
    /// can't be confirmed.
    async fn terminate(&self, handle: Self::Handle) -> Result<()>;

    /// Stop every known competing program and service. Per-item failures
    /// are logged and skipped.
    async fn stop_competitors(&self);

    /// Stop whatever is left of the evaluated program and the interception
    /// driver once the run is over.
    async fn final_cleanup(&self);
}
