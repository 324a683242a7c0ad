//! In-memory `ControlPlane` that records every call, for tests.

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

use super::{ApplicationStatus, CommandOutput, ControlPlane, IdleWait, ModelStatus};
use crate::error::CouError;

#[derive(Default)]
pub struct FakeControlPlane {
    model: String,
    applications: BTreeMap<String, ApplicationStatus>,
    outputs: BTreeMap<String, CommandOutput>,
    failing: Vec<String>,
    delays: BTreeMap<String, Duration>,
    calls: Mutex<Vec<String>>,
}

impl FakeControlPlane {
    pub fn new(model: &str) -> Self {
        Self {
            model: model.to_string(),
            ..Default::default()
        }
    }

    /// Register an application returned by the status calls.
    pub fn with_application(mut self, name: &str, status: ApplicationStatus) -> Self {
        self.applications.insert(name.to_string(), status);
        self
    }

    /// Output returned when `command` is run on any unit. Unregistered
    /// commands succeed with empty output.
    pub fn with_output(mut self, command: &str, stdout: &str, exit_code: i32) -> Self {
        self.outputs.insert(
            command.to_string(),
            CommandOutput {
                stdout: stdout.to_string(),
                stderr: if exit_code == 0 {
                    String::new()
                } else {
                    format!("{command} failed")
                },
                exit_code,
            },
        );
        self
    }

    /// Fail every call whose recorded form starts with `prefix`.
    pub fn failing(mut self, prefix: &str) -> Self {
        self.failing.push(prefix.to_string());
        self
    }

    /// Delay calls whose recorded form starts with `prefix`.
    pub fn delayed(mut self, prefix: &str, delay: Duration) -> Self {
        self.delays.insert(prefix.to_string(), delay);
        self
    }

    /// Calls recorded so far, in completion order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    async fn record(&self, call: String) -> Result<()> {
        if let Some(delay) = self
            .delays
            .iter()
            .find(|(prefix, _)| call.starts_with(prefix.as_str()))
            .map(|(_, d)| *d)
        {
            tokio::time::sleep(delay).await;
        }

        self.calls.lock().unwrap().push(call.clone());

        if self.failing.iter().any(|p| call.starts_with(p.as_str())) {
            return Err(CouError::remote(self.model.as_str(), call, 1, "injected failure").into());
        }
        Ok(())
    }
}

#[async_trait]
impl ControlPlane for FakeControlPlane {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn run_on_unit(
        &self,
        unit: &str,
        command: &str,
        _timeout: Duration,
    ) -> Result<CommandOutput> {
        self.record(format!("run {unit}: {command}")).await?;
        Ok(self.outputs.get(command).cloned().unwrap_or_default())
    }

    async fn upgrade_charm(
        &self,
        application: &str,
        channel: &str,
        switch: Option<&str>,
    ) -> Result<()> {
        let call = match switch {
            Some(s) => format!("refresh {application} {channel} switch={s}"),
            None => format!("refresh {application} {channel}"),
        };
        self.record(call).await
    }

    async fn set_application_config(
        &self,
        application: &str,
        config: &BTreeMap<String, String>,
    ) -> Result<()> {
        let pairs: Vec<String> = config.iter().map(|(k, v)| format!("{k}={v}")).collect();
        self.record(format!("config {application} {}", pairs.join(" ")))
            .await
    }

    async fn wait_for_idle(&self, wait: &IdleWait) -> Result<()> {
        let target = match &wait.apps {
            Some(apps) => apps.join(","),
            None => "model".to_string(),
        };
        self.record(format!("wait {}s {target}", wait.timeout.as_secs()))
            .await
    }

    async fn application_status(&self, application: &str) -> Result<ApplicationStatus> {
        self.record(format!("status {application}")).await?;
        self.applications.get(application).cloned().ok_or_else(|| {
            CouError::Parse {
                what: "application status".to_string(),
                details: format!("application {application} not found"),
            }
            .into()
        })
    }

    async fn model_status(&self) -> Result<ModelStatus> {
        self.record("status".to_string()).await?;
        Ok(ModelStatus {
            name: self.model.clone(),
            applications: self.applications.clone(),
        })
    }

    async fn backup(&self) -> Result<String> {
        self.record("backup".to_string()).await?;
        Ok("mysqldump.gz".to_string())
    }
}
