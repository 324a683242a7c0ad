//! Deferred remote actions attached to upgrade steps.
//!
//! Actions are plain descriptors built during planning; nothing touches the
//! deployment until [`Action::run`] is called by the executor.

use std::collections::BTreeMap;
use std::time::Duration;

use anyhow::Result;
use tracing::{info, warn};

use crate::ceph;
use crate::juju::{self, IdleWait};
use crate::openstack::Release;
use crate::steps::RunContext;

/// Timeout for the package upgrade on a single unit.
pub const PACKAGE_UPGRADE_TIMEOUT: Duration = Duration::from_secs(600);

/// A remote operation bound at planning time and run later.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Upgrade the software packages of a unit from its current APT sources.
    UpgradePackages { unit: String },
    /// Refresh a charm from a channel.
    RefreshCharm {
        application: String,
        channel: String,
        switch: Option<String>,
    },
    /// Set charm configuration options.
    SetConfig {
        application: String,
        config: BTreeMap<String, String>,
    },
    /// Wait for the model or some applications to settle.
    WaitForIdle(IdleWait),
    /// Check that every unit reports a workload compatible with `target`.
    VerifyWorkload {
        application: String,
        charm: String,
        target: Release,
    },
    /// Back up the deployment's databases.
    Backup,
    /// Align the storage cluster's `require-osd-release` with the running OSDs.
    RequireOsdRelease { unit: String },
}

/// Shell command upgrading all packages non-interactively.
pub fn package_upgrade_command() -> String {
    let dpkg_opts = "-o Dpkg::Options::=--force-confnew -o Dpkg::Options::=--force-confdef";
    format!("apt-get update && apt-get dist-upgrade {dpkg_opts} -y && apt-get autoremove -y")
}

impl Action {
    pub async fn run(&self, ctx: &RunContext<'_>) -> Result<()> {
        match self {
            Self::UpgradePackages { unit } => {
                juju::run_checked(
                    ctx.client,
                    unit,
                    &package_upgrade_command(),
                    PACKAGE_UPGRADE_TIMEOUT,
                )
                .await?;
            }
            Self::RefreshCharm {
                application,
                channel,
                switch,
            } => {
                ctx.client
                    .upgrade_charm(application, channel, switch.as_deref())
                    .await?;
            }
            Self::SetConfig {
                application,
                config,
            } => {
                ctx.client.set_application_config(application, config).await?;
            }
            Self::WaitForIdle(wait) => {
                ctx.client.wait_for_idle(wait).await?;
            }
            Self::VerifyWorkload {
                application,
                charm,
                target,
            } => {
                verify_workload(ctx, application, charm, target).await?;
            }
            Self::Backup => {
                let location = ctx.client.backup().await?;
                info!("Backup saved to {}", location);
            }
            Self::RequireOsdRelease { unit } => {
                ceph::set_require_osd_release(ctx.client, ctx.catalog, unit).await?;
            }
        }
        Ok(())
    }
}

/// Warn about units whose workload version does not map to `target`.
///
/// Returns the units that are not on the target release.
async fn verify_workload(
    ctx: &RunContext<'_>,
    application: &str,
    charm: &str,
    target: &Release,
) -> Result<Vec<String>> {
    let status = ctx.client.application_status(application).await?;

    let lagging: Vec<String> = status
        .units
        .iter()
        .filter(|(_, unit)| {
            !ctx.catalog
                .compatibility
                .lookup(charm, &unit.workload_version)
                .contains(target)
        })
        .map(|(name, unit)| format!("{} ({})", name, unit.workload_version))
        .collect();

    if lagging.is_empty() {
        info!("Workload of '{}' upgraded to {}", application, target);
    } else {
        warn!(
            "Workload of '{}' is not on {} for units: {}",
            application,
            target,
            lagging.join(", ")
        );
    }
    Ok(lagging)
}
