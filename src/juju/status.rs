//! Point-in-time status snapshots of a model and its applications.

use std::collections::BTreeMap;

use anyhow::Result;
use serde::Deserialize;
use serde_json::Value;

use crate::error::CouError;

/// Status of a single unit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnitStatus {
    pub workload_version: String,
}

/// Status of an application as reported by the control plane.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApplicationStatus {
    /// Charm URL, e.g. `ch:amd64/focal/keystone-638`.
    pub charm: String,
    pub charm_channel: String,
    pub series: String,
    /// Application status, e.g. `active` or `blocked`.
    pub status: String,
    /// Principals this application is attached to; non-empty for subordinates.
    pub subordinate_to: Vec<String>,
    pub units: BTreeMap<String, UnitStatus>,
    /// Charm configuration values, keyed by option name.
    pub config: BTreeMap<String, Value>,
}

/// Status of every application in a model.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelStatus {
    pub name: String,
    pub applications: BTreeMap<String, ApplicationStatus>,
}

// Raw `juju status --format json` layout.

#[derive(Debug, Deserialize)]
struct RawStatus {
    model: RawModel,
    #[serde(default)]
    applications: BTreeMap<String, RawApplication>,
}

#[derive(Debug, Deserialize)]
struct RawModel {
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct RawApplication {
    #[serde(default)]
    charm: String,
    #[serde(default)]
    charm_origin: Option<String>,
    #[serde(default)]
    charm_name: Option<String>,
    #[serde(default)]
    charm_rev: Option<i64>,
    #[serde(default)]
    charm_channel: Option<String>,
    #[serde(default)]
    series: Option<String>,
    #[serde(default)]
    base: Option<RawBase>,
    #[serde(default)]
    application_status: Option<RawStatusInfo>,
    #[serde(default)]
    subordinate_to: Vec<String>,
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    units: BTreeMap<String, RawUnit>,
}

#[derive(Debug, Deserialize)]
struct RawBase {
    #[serde(default)]
    channel: String,
}

#[derive(Debug, Deserialize)]
struct RawStatusInfo {
    #[serde(default)]
    current: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct RawUnit {
    #[serde(default)]
    workload_version: Option<String>,
}

/// Raw `juju config <app> --format json` layout.
#[derive(Debug, Deserialize)]
struct RawConfig {
    #[serde(default)]
    settings: BTreeMap<String, RawSetting>,
}

#[derive(Debug, Deserialize)]
struct RawSetting {
    #[serde(default)]
    value: Option<Value>,
}

/// Map an Ubuntu base channel to its series name.
fn series_from_base(channel: &str) -> Option<&'static str> {
    let version = channel.split('/').next().unwrap_or(channel);
    match version {
        "18.04" => Some("bionic"),
        "20.04" => Some("focal"),
        "22.04" => Some("jammy"),
        "24.04" => Some("noble"),
        _ => None,
    }
}

fn charm_scheme(origin: Option<&str>) -> &'static str {
    match origin {
        Some("local") => "local",
        Some("charmstore") => "cs",
        _ => "ch",
    }
}

impl RawApplication {
    fn into_status(self) -> ApplicationStatus {
        let series = self
            .series
            .or_else(|| {
                self.base
                    .as_ref()
                    .and_then(|b| series_from_base(&b.channel))
                    .map(str::to_string)
            })
            .unwrap_or_default();

        let name = self.charm_name.unwrap_or_else(|| self.charm.clone());
        let charm = if name.contains(':') {
            name
        } else {
            let scheme = charm_scheme(self.charm_origin.as_deref());
            match self.charm_rev {
                Some(rev) => format!("{scheme}:{name}-{rev}"),
                None => format!("{scheme}:{name}"),
            }
        };

        let app_version = self.version.unwrap_or_default();
        let units = self
            .units
            .into_iter()
            .map(|(unit, raw)| {
                let workload_version = raw
                    .workload_version
                    .filter(|v| !v.is_empty())
                    .unwrap_or_else(|| app_version.clone());
                (unit, UnitStatus { workload_version })
            })
            .collect();

        ApplicationStatus {
            charm,
            charm_channel: self.charm_channel.unwrap_or_default(),
            series,
            status: self
                .application_status
                .map(|s| s.current)
                .unwrap_or_default(),
            subordinate_to: self.subordinate_to,
            units,
            config: BTreeMap::new(),
        }
    }
}

/// Parse the output of `juju status --format json`.
pub fn parse_model_status(json: &str) -> Result<ModelStatus> {
    let raw: RawStatus = serde_json::from_str(json).map_err(|e| CouError::Parse {
        what: "model status".to_string(),
        details: e.to_string(),
    })?;

    Ok(ModelStatus {
        name: raw.model.name,
        applications: raw
            .applications
            .into_iter()
            .map(|(name, app)| (name, app.into_status()))
            .collect(),
    })
}

/// Parse the output of `juju config <app> --format json` into option values.
/// Options without a value are left out.
pub fn parse_config(json: &str) -> Result<BTreeMap<String, Value>> {
    let raw: RawConfig = serde_json::from_str(json).map_err(|e| CouError::Parse {
        what: "application config".to_string(),
        details: e.to_string(),
    })?;

    Ok(raw
        .settings
        .into_iter()
        .filter_map(|(key, setting)| setting.value.map(|v| (key, v)))
        .collect())
}
