//! Application and unit entities built from a status snapshot.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::hash::{Hash, Hasher};

use anyhow::Result;
use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::error::CouError;
use crate::juju::ApplicationStatus;
use crate::openstack::{Catalog, Release};

/// Config keys holding the package origin, in lookup order.
pub const ORIGIN_SETTINGS: [&str; 2] = ["openstack-origin", "source"];

/// One running instance of an application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unit {
    pub name: String,
    pub workload_version: String,
    /// Release derived from the workload version; `None` when unresolved.
    pub release: Option<Release>,
}

/// A deployed application. Identity is the (name, charm) pair.
#[derive(Debug, Clone)]
pub struct Application {
    pub name: String,
    pub charm: String,
    /// URL scheme of the charm: `ch`, `cs` or `local`.
    pub charm_origin: String,
    pub channel: String,
    pub series: String,
    pub model_name: String,
    pub subordinate: bool,
    /// First origin key present in the config.
    pub origin_setting: Option<String>,
    pub os_origin: String,
    pub config: BTreeMap<String, Value>,
    pub units: BTreeMap<String, Unit>,
}

/// Charm name from a charm URL.
///
/// `ch:amd64/focal/keystone-638`, `cs:keystone-123` and `local:focal/keystone-0`
/// all yield `keystone`.
pub fn extract_charm_name(url: &str) -> String {
    let path = url.split_once(':').map_or(url, |(_, rest)| rest);
    let name = path.rsplit('/').next().unwrap_or(path);
    match name.rsplit_once('-') {
        Some((charm, revision))
            if !revision.is_empty() && revision.chars().all(|c| c.is_ascii_digit()) =>
        {
            charm.to_string()
        }
        _ => name.to_string(),
    }
}

fn config_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl Application {
    pub fn from_status(
        name: &str,
        status: &ApplicationStatus,
        model_name: &str,
        catalog: &Catalog,
    ) -> Self {
        let charm = extract_charm_name(&status.charm);
        let charm_origin = status
            .charm
            .split_once(':')
            .map(|(scheme, _)| scheme.to_string())
            .unwrap_or_default();

        let origin_setting = ORIGIN_SETTINGS
            .iter()
            .find(|key| status.config.contains_key(**key))
            .map(|key| key.to_string());
        let os_origin = match &origin_setting {
            Some(key) => status.config.get(key).map(config_value).unwrap_or_default(),
            None => {
                warn!("Failed to get origin for {}, no origin config found", name);
                String::new()
            }
        };

        let units = status
            .units
            .iter()
            .map(|(unit_name, unit)| {
                let release = catalog
                    .compatibility
                    .lookup(&charm, &unit.workload_version)
                    .pop();
                if release.is_none() {
                    warn!(
                        "Cannot determine the release of unit {} from workload version '{}'",
                        unit_name, unit.workload_version
                    );
                }
                (
                    unit_name.clone(),
                    Unit {
                        name: unit_name.clone(),
                        workload_version: unit.workload_version.clone(),
                        release,
                    },
                )
            })
            .collect();

        Self {
            name: name.to_string(),
            subordinate: !status.subordinate_to.is_empty() || catalog.is_subordinate_charm(&charm),
            charm,
            charm_origin,
            channel: status.charm_channel.clone(),
            series: status.series.clone(),
            model_name: model_name.to_string(),
            origin_setting,
            os_origin,
            config: status.config.clone(),
            units,
        }
    }

    /// The release every resolved unit agrees on.
    ///
    /// `None` when there are no units or none could be resolved. Fails with
    /// `MismatchedReleases` when resolved units disagree.
    pub fn current_release(&self) -> Result<Option<Release>> {
        let releases: BTreeSet<&Release> = self
            .units
            .values()
            .filter_map(|unit| unit.release.as_ref())
            .collect();

        match releases.len() {
            0 => Ok(None),
            1 => Ok(releases.into_iter().next().cloned()),
            _ => Err(CouError::MismatchedReleases {
                application: self.name.clone(),
                releases: releases
                    .iter()
                    .map(|r| r.codename())
                    .collect::<Vec<_>>()
                    .join(", "),
            }
            .into()),
        }
    }
}

impl PartialEq for Application {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.charm == other.charm
    }
}

impl Eq for Application {}

impl Hash for Application {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
        self.charm.hash(state);
    }
}

#[derive(Serialize)]
struct Summary<'a> {
    model_name: &'a str,
    charm: &'a str,
    charm_origin: &'a str,
    os_origin: &'a str,
    channel: &'a str,
    series: &'a str,
    subordinate: bool,
    units: BTreeMap<&'a str, Option<&'a str>>,
}

impl fmt::Display for Application {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let summary = Summary {
            model_name: &self.model_name,
            charm: &self.charm,
            charm_origin: &self.charm_origin,
            os_origin: &self.os_origin,
            channel: &self.channel,
            series: &self.series,
            subordinate: self.subordinate,
            units: self
                .units
                .values()
                .map(|u| (u.name.as_str(), u.release.as_ref().map(Release::codename)))
                .collect(),
        };
        let mut document = BTreeMap::new();
        document.insert(self.name.as_str(), summary);
        let yaml = serde_yaml::to_string(&document).map_err(|_| fmt::Error)?;
        f.write_str(&yaml)
    }
}
