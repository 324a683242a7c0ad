//! `ControlPlane` implementation backed by the `juju` command line client.

use std::collections::BTreeMap;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

use super::status::{self, ApplicationStatus, ModelStatus};
use super::{CommandOutput, ControlPlane, IdleWait};
use crate::error::CouError;

/// Charm whose leader unit produces the database dump.
const BACKUP_CHARM: &str = "mysql-innodb-cluster";

/// `wait-for model` query: every unit active and idle.
/// Application statuses of a deployment that is still settling.
const BUSY_STATUSES: [&str; 3] = ["maintenance", "waiting", "error"];

const MODEL_IDLE_QUERY: &str =
    r#"forEach(units, unit => unit.workload-status == "active" && unit.agent-status == "idle")"#;

/// Timeout for the backup action.
const BACKUP_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Client for a single model, driving the `juju` binary.
#[derive(Debug, Clone)]
pub struct JujuCli {
    binary: String,
    model: String,
}

impl JujuCli {
    /// Connect to a model, or to the current model when `model` is `None`.
    pub async fn connect(model: Option<&str>) -> Result<Self> {
        let binary = std::env::var("JUJU_BINARY").unwrap_or_else(|_| "juju".to_string());
        let mut args = vec!["show-model", "--format", "json"];
        if let Some(model) = model {
            args.insert(1, model);
        }

        let output = run(&binary, &args).await?;
        let parsed: serde_json::Value =
            serde_json::from_str(&output.stdout).map_err(|e| CouError::Parse {
                what: "model description".to_string(),
                details: e.to_string(),
            })?;

        // `show-model` prints `{"<name>": {...}}`; the key is the short model name.
        let name = parsed
            .as_object()
            .and_then(|o| o.keys().next().cloned())
            .ok_or_else(|| CouError::Parse {
                what: "model description".to_string(),
                details: "no model returned".to_string(),
            })?;

        debug!("Connected to model: {}", name);
        Ok(Self {
            binary,
            model: name,
        })
    }

    /// Run a juju subcommand against this model, failing on a non-zero exit.
    async fn juju(&self, args: &[&str]) -> Result<CommandOutput> {
        // `wait-for` takes the entity kind as a nested subcommand.
        let split = if args.first() == Some(&"wait-for") { 2 } else { 1 };
        let split = split.min(args.len());
        let mut full: Vec<&str> = Vec::with_capacity(args.len() + 2);
        full.extend(&args[..split]);
        full.extend(["-m", self.model.as_str()]);
        full.extend(&args[split..]);
        run(&self.binary, &full).await
    }

    /// Status snapshot without application config.
    async fn status_only(&self) -> Result<ModelStatus> {
        let output = self.juju(&["status", "--format", "json"]).await?;
        status::parse_model_status(&output.stdout)
    }

    /// Name of the first unit of the backup charm.
    async fn backup_unit(&self) -> Result<String> {
        let status = self.status_only().await?;
        status
            .applications
            .values()
            .filter(|app| app.charm.contains(BACKUP_CHARM))
            .flat_map(|app| app.units.keys())
            .next()
            .cloned()
            .ok_or_else(|| {
                CouError::remote(
                    BACKUP_CHARM,
                    "backup",
                    1,
                    &format!("no {BACKUP_CHARM} unit found in model {}", self.model),
                )
                .into()
            })
    }
}

/// Run a command and turn a non-zero exit into `RemoteCommandFailed`.
async fn run(binary: &str, args: &[&str]) -> Result<CommandOutput> {
    let output = run_unchecked(binary, args).await?;
    if !output.success() {
        return Err(
            CouError::remote(binary, args.join(" "), output.exit_code, &output.stderr).into(),
        );
    }
    Ok(output)
}

async fn run_unchecked(binary: &str, args: &[&str]) -> Result<CommandOutput> {
    debug!("Running: {} {}", binary, args.join(" "));
    let output = Command::new(binary)
        .args(args)
        .output()
        .await
        .with_context(|| format!("Failed to execute '{binary}'. Is the juju client installed?"))?;

    Ok(CommandOutput {
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        exit_code: output.status.code().unwrap_or(-1),
    })
}

/// Fail when the listed applications (all when `None`) are busy again, or
/// when any application is blocked and `raise_on_blocked` is set.
fn check_settled(
    model: &str,
    status: &ModelStatus,
    apps: Option<&[String]>,
    raise_on_blocked: bool,
) -> Result<()> {
    if raise_on_blocked {
        let blocked: Vec<&str> = status
            .applications
            .iter()
            .filter(|(_, app)| app.status == "blocked")
            .map(|(name, _)| name.as_str())
            .collect();
        if !blocked.is_empty() {
            let details = format!("applications in blocked state: {}", blocked.join(", "));
            return Err(CouError::remote(model, "wait-for", 1, &details).into());
        }
    }

    let busy: Vec<&str> = status
        .applications
        .iter()
        .filter(|(name, _)| apps.is_none_or(|apps| apps.contains(*name)))
        .filter(|(_, app)| BUSY_STATUSES.contains(&app.status.as_str()))
        .map(|(name, _)| name.as_str())
        .collect();
    if !busy.is_empty() {
        let details = format!("applications did not stay idle: {}", busy.join(", "));
        return Err(CouError::remote(model, "wait-for", 1, &details).into());
    }

    Ok(())
}

fn format_timeout(timeout: Duration) -> String {
    format!("{}s", timeout.as_secs())
}

#[async_trait]
impl ControlPlane for JujuCli {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn run_on_unit(
        &self,
        unit: &str,
        command: &str,
        timeout: Duration,
    ) -> Result<CommandOutput> {
        let timeout = format_timeout(timeout);
        let mut args = vec!["exec", "-m", self.model.as_str()];
        args.extend(["--unit", unit, "--timeout", timeout.as_str(), "--", command]);
        run_unchecked(&self.binary, &args).await
    }

    async fn upgrade_charm(
        &self,
        application: &str,
        channel: &str,
        switch: Option<&str>,
    ) -> Result<()> {
        info!("Refreshing {} from channel {}", application, channel);
        let mut args = vec!["refresh", application, "--channel", channel];
        if let Some(switch) = switch {
            args.extend(["--switch", switch]);
        }
        self.juju(&args).await?;
        Ok(())
    }

    async fn set_application_config(
        &self,
        application: &str,
        config: &BTreeMap<String, String>,
    ) -> Result<()> {
        let pairs: Vec<String> = config.iter().map(|(k, v)| format!("{k}={v}")).collect();
        info!("Setting config on {}: {}", application, pairs.join(" "));
        let mut args = vec!["config", application];
        args.extend(pairs.iter().map(String::as_str));
        self.juju(&args).await?;
        Ok(())
    }

    async fn wait_for_idle(&self, wait: &IdleWait) -> Result<()> {
        if wait.raise_on_blocked {
            check_settled(&self.model, &self.status_only().await?, None, true)?;
        }

        let timeout = format_timeout(wait.timeout);
        match &wait.apps {
            Some(apps) => {
                for app in apps {
                    self.juju(&[
                        "wait-for",
                        "application",
                        app.as_str(),
                        "--query",
                        r#"status=="active""#,
                        "--timeout",
                        timeout.as_str(),
                    ])
                    .await?;
                }
            }
            None => {
                // The model is positional here; `wait-for model` takes no `-m`.
                run(
                    &self.binary,
                    &[
                        "wait-for",
                        "model",
                        self.model.as_str(),
                        "--query",
                        MODEL_IDLE_QUERY,
                        "--timeout",
                        timeout.as_str(),
                    ],
                )
                .await?;
            }
        }

        if let Some(period) = wait.idle_period {
            debug!("Deployment idle, confirming for {}s", period.as_secs());
            tokio::time::sleep(period).await;
            let status = self.status_only().await?;
            check_settled(&self.model, &status, wait.apps.as_deref(), wait.raise_on_blocked)?;
        }

        Ok(())
    }

    async fn application_status(&self, application: &str) -> Result<ApplicationStatus> {
        let output = self
            .juju(&["status", application, "--format", "json"])
            .await?;
        let mut model = status::parse_model_status(&output.stdout)?;
        let mut app = model.applications.remove(application).ok_or_else(|| {
            CouError::Parse {
                what: "application status".to_string(),
                details: format!("application {application} not found"),
            }
        })?;

        let config = self
            .juju(&["config", application, "--format", "json"])
            .await?;
        app.config = status::parse_config(&config.stdout)?;
        Ok(app)
    }

    async fn model_status(&self) -> Result<ModelStatus> {
        let mut model = self.status_only().await?;

        for (name, app) in model.applications.iter_mut() {
            let config = self
                .juju(&["config", name.as_str(), "--format", "json"])
                .await?;
            app.config = status::parse_config(&config.stdout)?;
        }

        Ok(model)
    }

    async fn backup(&self) -> Result<String> {
        let unit = self.backup_unit().await?;
        info!("Running mysqldump on {}", unit);
        let wait = format!("--wait={}", format_timeout(BACKUP_TIMEOUT));
        let output = self.juju(&["run", unit.as_str(), "mysqldump", wait.as_str()]).await?;

        let remote_path = output
            .stdout
            .lines()
            .find_map(|line| line.trim().strip_prefix("mysqldump-file:"))
            .map(|path| path.trim().to_string())
            .ok_or_else(|| {
                CouError::remote(&unit, "mysqldump", 1, "action did not report a dump file")
            })?;

        let local_name = remote_path
            .rsplit('/')
            .next()
            .unwrap_or("mysqldump.gz")
            .to_string();
        let source = format!("{unit}:{remote_path}");
        self.juju(&["scp", source.as_str(), local_name.as_str()]).await?;

        info!("Database backup saved to {}", local_name);
        Ok(local_name)
    }
}
