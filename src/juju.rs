//! Remote control-plane collaborator.
//!
//! Everything the planner and executor do against the deployment goes
//! through the [`ControlPlane`] trait. The production implementation drives
//! the `juju` CLI; tests use an in-memory fake.

pub mod cli;
#[cfg(test)]
pub mod fake;
pub mod status;

use std::collections::BTreeMap;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tracing::debug;

use crate::error::CouError;
pub use status::{ApplicationStatus, ModelStatus};

/// Output of a command run on a unit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Parameters of a wait for the deployment (or some applications) to settle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdleWait {
    pub timeout: Duration,
    /// Applications to wait for; `None` waits for the whole model.
    pub apps: Option<Vec<String>>,
    /// How long the deployment must stay idle before the wait succeeds.
    pub idle_period: Option<Duration>,
    /// Fail immediately if any application reports a blocked status.
    pub raise_on_blocked: bool,
}

impl IdleWait {
    /// Wait for the whole model.
    pub fn model(timeout: Duration) -> Self {
        Self {
            timeout,
            apps: None,
            idle_period: None,
            raise_on_blocked: false,
        }
    }

    /// Wait for the listed applications only.
    pub fn apps(timeout: Duration, apps: Vec<String>) -> Self {
        Self {
            timeout,
            apps: Some(apps),
            idle_period: None,
            raise_on_blocked: false,
        }
    }
}

/// Operations the upgrade engine needs from the deployment's control plane.
///
/// Implementations must tolerate concurrent calls that target different units.
#[async_trait]
pub trait ControlPlane: Send + Sync {
    /// Name of the model being upgraded.
    fn model_name(&self) -> &str;

    /// Run a shell command on a unit.
    async fn run_on_unit(
        &self,
        unit: &str,
        command: &str,
        timeout: Duration,
    ) -> Result<CommandOutput>;

    /// Refresh an application's charm from `channel`, optionally switching
    /// to another charm.
    async fn upgrade_charm(
        &self,
        application: &str,
        channel: &str,
        switch: Option<&str>,
    ) -> Result<()>;

    /// Set configuration options on an application.
    async fn set_application_config(
        &self,
        application: &str,
        config: &BTreeMap<String, String>,
    ) -> Result<()>;

    /// Wait for the model or a set of applications to become idle.
    async fn wait_for_idle(&self, wait: &IdleWait) -> Result<()>;

    /// Status snapshot of one application.
    async fn application_status(&self, application: &str) -> Result<ApplicationStatus>;

    /// Status snapshot of every application in the model.
    async fn model_status(&self) -> Result<ModelStatus>;

    /// Back up the deployment's databases, returning where the dump was saved.
    async fn backup(&self) -> Result<String>;
}

/// Run a command on a unit and fail with `RemoteCommandFailed` on a non-zero exit.
pub async fn run_checked(
    client: &dyn ControlPlane,
    unit: &str,
    command: &str,
    timeout: Duration,
) -> Result<CommandOutput> {
    debug!("Running on {}: {}", unit, command);
    let output = client.run_on_unit(unit, command, timeout).await?;
    if !output.success() {
        return Err(CouError::remote(unit, command, output.exit_code, &output.stderr).into());
    }
    Ok(output)
}
