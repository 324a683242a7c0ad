//! Storage cluster release consensus.
//!
//! OSDs report the release they run; the monitors keep a
//! `require-osd-release` floor. After an upgrade the floor must follow the
//! OSDs, but only when every OSD agrees on one release.

use std::collections::BTreeMap;
use std::time::Duration;

use anyhow::Result;
use serde::Deserialize;
use tracing::{debug, info};

use crate::error::CouError;
use crate::juju::{self, ControlPlane};
use crate::openstack::Catalog;

const CEPH_COMMAND_TIMEOUT: Duration = Duration::from_secs(600);
const OSD_DUMP_COMMAND: &str = "ceph osd dump -f json";
const VERSIONS_COMMAND: &str = "ceph versions -f json";

#[derive(Debug, Deserialize)]
struct OsdDump {
    #[serde(default)]
    require_osd_release: String,
}

#[derive(Debug, Deserialize)]
struct CephVersions {
    #[serde(default)]
    osd: BTreeMap<String, u64>,
}

/// Decide whether the configured floor needs correcting.
///
/// Returns the value to set, or `None` when the configuration already matches.
/// Fails when the fleet disagrees or reports nothing.
pub fn reconcile(observed: &BTreeMap<String, u64>, configured: &str) -> Result<Option<String>> {
    let releases: Vec<&String> = observed.keys().collect();
    match releases.as_slice() {
        [] => Err(CouError::Parse {
            what: "OSD releases".to_string(),
            details: "Cannot get OSD release information".to_string(),
        }
        .into()),
        [release] if release.as_str() == configured => Ok(None),
        [release] => Ok(Some((*release).clone())),
        _ => {
            let summary = observed
                .iter()
                .map(|(release, count)| format!("{release}: {count}"))
                .collect::<Vec<_>>()
                .join(", ");
            Err(CouError::InconsistentFleetRelease(format!("OSDs report {summary}")).into())
        }
    }
}

/// Parse `require_osd_release` from `ceph osd dump -f json`.
pub fn parse_required_osd_release(json: &str) -> Result<String> {
    let dump: OsdDump = serde_json::from_str(json).map_err(|e| CouError::Parse {
        what: "ceph osd dump".to_string(),
        details: e.to_string(),
    })?;
    Ok(dump.require_osd_release)
}

/// Parse `ceph versions -f json` into OSD counts per release name.
///
/// Keys look like `ceph version 15.2.17 (8a82819d84cf884bd39c17e3236e0632) octopus (stable)`;
/// the release name is the fifth token.
pub fn parse_osd_releases(json: &str, known: &[String]) -> Result<BTreeMap<String, u64>> {
    let versions: CephVersions = serde_json::from_str(json).map_err(|e| CouError::Parse {
        what: "ceph versions".to_string(),
        details: e.to_string(),
    })?;

    let mut releases = BTreeMap::new();
    for (version, count) in versions.osd {
        let release = version
            .split_whitespace()
            .nth(4)
            .ok_or_else(|| CouError::Parse {
                what: "ceph versions".to_string(),
                details: format!("unexpected version string '{version}'"),
            })?;
        if !known.iter().any(|k| k == release) {
            return Err(CouError::UnknownRelease(format!(
                "Ceph release '{release}' (known: {})",
                known.join(", ")
            ))
            .into());
        }
        *releases.entry(release.to_string()).or_insert(0) += count;
    }
    Ok(releases)
}

/// Check and correct `require-osd-release` from a monitor unit.
pub async fn set_require_osd_release(
    client: &dyn ControlPlane,
    catalog: &Catalog,
    unit: &str,
) -> Result<()> {
    let dump = juju::run_checked(client, unit, OSD_DUMP_COMMAND, CEPH_COMMAND_TIMEOUT).await?;
    let configured = parse_required_osd_release(&dump.stdout)?;
    debug!("Current require-osd-release is set to: {}", configured);

    let versions = juju::run_checked(client, unit, VERSIONS_COMMAND, CEPH_COMMAND_TIMEOUT).await?;
    let observed = parse_osd_releases(&versions.stdout, catalog.ceph_releases())?;
    debug!("OSD releases reported on {}: {:?}", unit, observed);

    match reconcile(&observed, &configured)? {
        Some(release) => {
            info!(
                "Setting require-osd-release from '{}' to '{}'",
                configured, release
            );
            let command = format!("ceph osd require-osd-release {release}");
            juju::run_checked(client, unit, &command, CEPH_COMMAND_TIMEOUT).await?;
        }
        None => debug!("require-osd-release already matches OSD release"),
    }
    Ok(())
}
