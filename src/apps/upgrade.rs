//! Per-application upgrade plans.

use std::collections::BTreeMap;
use std::time::Duration;

use anyhow::Result;
use tracing::{debug, warn};

use super::Application;
use crate::actions::Action;
use crate::error::CouError;
use crate::juju::IdleWait;
use crate::openstack::{Catalog, Release};
use crate::steps::Step;

/// Charms whose upgrade must wait for the whole model to settle.
pub const COORDINATOR_CHARMS: [&str; 3] = ["rabbitmq-server", "ceph-mon", "keystone"];

/// Config option gating the upgrade behind a manual action.
const ACTION_MANAGED_UPGRADE: &str = "action-managed-upgrade";

const MODEL_IDLE_TIMEOUT: Duration = Duration::from_secs(1800);
const APP_IDLE_TIMEOUT: Duration = Duration::from_secs(300);

/// Outcome of planning one application.
#[derive(Debug, Clone, PartialEq)]
pub enum Generation {
    Plan(Step),
    /// Leave the application out of the plan, with the reason.
    Halt(String),
}

impl Application {
    /// Build this application's upgrade plan to `target`.
    pub fn generate_upgrade_plan(
        &self,
        target: &Release,
        catalog: &Catalog,
    ) -> Result<Generation> {
        let current = self.current_release()?;

        match &current {
            Some(current) if current >= target => {
                return Ok(Generation::Halt(format!(
                    "Application '{}' already running {} which is newer or equal to the target {}",
                    self.name, current, target
                )));
            }
            None if !self.subordinate => {
                return Ok(Generation::Halt(format!(
                    "Cannot determine the current release of '{}'",
                    self.name
                )));
            }
            _ => {}
        }

        let previous = catalog.releases.previous(target).ok_or_else(|| {
            CouError::NoTarget(format!("Release {target} has no predecessor to refresh from"))
        })?;

        let mut plan = Step::plan(format!("Upgrade plan for '{}' to {}", self.name, target));
        if self.subordinate {
            plan.add_step(self.refresh_step(&previous));
            plan.add_step(self.switch_channel_step(target));
        } else {
            plan.add_step(self.package_upgrade_step());
            if self.charm == "ceph-mon"
                && let Some(step) = self.require_osd_release_step()
            {
                plan.add_step(step);
            }
            plan.add_step(self.refresh_step(&previous));
            if let Some(step) = self.disable_action_managed_step() {
                plan.add_step(step);
            }
            plan.add_step(self.switch_channel_step(target));
            if let Some(step) = self.workload_upgrade_step(target) {
                plan.add_step(step);
            }
            plan.add_step(self.wait_step());
            plan.add_step(self.verify_step(target));
        }

        debug!("Generated upgrade plan for {}", self.name);
        Ok(Generation::Plan(plan))
    }

    fn package_upgrade_step(&self) -> Step {
        let mut group = Step::pre_upgrade(format!(
            "Upgrade software packages of '{}' from the current APT repositories",
            self.name
        ))
        .in_parallel();
        group.add_steps(self.units.keys().map(|unit| {
            Step::unit(format!("Upgrade software packages on unit {unit}"))
                .with_action(Action::UpgradePackages { unit: unit.clone() })
        }));
        group
    }

    fn require_osd_release_step(&self) -> Option<Step> {
        let unit = self.units.keys().next()?;
        Some(
            Step::pre_upgrade(format!(
                "Ensure that the 'require-osd-release' option on '{}' matches the \
                 'ceph-osd' version",
                self.name
            ))
            .with_action(Action::RequireOsdRelease { unit: unit.clone() }),
        )
    }

    fn refresh_step(&self, previous: &Release) -> Step {
        let channel = previous.channel();
        Step::pre_upgrade(format!(
            "Refresh '{}' to the latest revision of '{}'",
            self.name, channel
        ))
        .with_action(Action::RefreshCharm {
            application: self.name.clone(),
            channel,
            switch: None,
        })
    }

    fn disable_action_managed_step(&self) -> Option<Step> {
        if !self.config.contains_key(ACTION_MANAGED_UPGRADE) {
            debug!("{} has no {} option", self.name, ACTION_MANAGED_UPGRADE);
            return None;
        }
        let mut config = BTreeMap::new();
        config.insert(ACTION_MANAGED_UPGRADE.to_string(), "false".to_string());
        Some(
            Step::upgrade(format!(
                "Change charm config of '{}' '{}' to False.",
                self.name, ACTION_MANAGED_UPGRADE
            ))
            .with_action(Action::SetConfig {
                application: self.name.clone(),
                config,
            }),
        )
    }

    fn switch_channel_step(&self, target: &Release) -> Step {
        let channel = target.channel();
        Step::upgrade(format!(
            "Upgrade '{}' to the new channel: '{}'",
            self.name, channel
        ))
        .with_action(Action::RefreshCharm {
            application: self.name.clone(),
            channel,
            switch: None,
        })
    }

    fn workload_upgrade_step(&self, target: &Release) -> Option<Step> {
        let Some(setting) = &self.origin_setting else {
            warn!(
                "Skipping origin change for {}: no origin setting found",
                self.name
            );
            return None;
        };
        let origin = target.origin(&self.series);
        let mut config = BTreeMap::new();
        config.insert(setting.clone(), origin.clone());
        Some(
            Step::upgrade(format!(
                "Change charm config of '{}' '{}' to '{}'",
                self.name, setting, origin
            ))
            .with_action(Action::SetConfig {
                application: self.name.clone(),
                config,
            }),
        )
    }

    fn wait_step(&self) -> Step {
        if COORDINATOR_CHARMS.contains(&self.charm.as_str()) {
            Step::post_upgrade(format!(
                "Wait {}s for model {} to reach the idle state.",
                MODEL_IDLE_TIMEOUT.as_secs(),
                self.model_name
            ))
            .with_action(Action::WaitForIdle(IdleWait::model(MODEL_IDLE_TIMEOUT)))
        } else {
            Step::post_upgrade(format!(
                "Wait {}s for app {} to reach the idle state.",
                APP_IDLE_TIMEOUT.as_secs(),
                self.name
            ))
            .with_action(Action::WaitForIdle(IdleWait::apps(
                APP_IDLE_TIMEOUT,
                vec![self.name.clone()],
            )))
        }
    }

    fn verify_step(&self, target: &Release) -> Step {
        Step::post_upgrade(format!(
            "Check if the workload of '{}' has been upgraded",
            self.name
        ))
        .with_action(Action::VerifyWorkload {
            application: self.name.clone(),
            charm: self.charm.clone(),
            target: target.clone(),
        })
    }
}
