//! Static compatibility data: release sequence, series windows and the
//! workload-version to release lookup table.
//!
//! The catalog is loaded once (embedded default or a YAML file passed on the
//! command line) and handed explicitly to every component that needs it.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::debug;

use super::release::{Release, ReleaseCatalog};
use crate::error::CouError;

const EMBEDDED_CATALOG: &str = include_str!("catalog.yaml");

/// On-disk layout of a catalog file.
#[derive(Debug, Deserialize)]
struct CatalogFile {
    releases: Vec<String>,
    #[serde(default)]
    series: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    workloads: BTreeMap<String, BTreeMap<String, Vec<String>>>,
    #[serde(default)]
    data_plane_charms: Vec<String>,
    #[serde(default)]
    subordinate_charms: Vec<String>,
    #[serde(default)]
    ceph_releases: Vec<String>,
}

/// Maps a charm's reported workload version to the releases it is compatible with.
#[derive(Debug, Clone, Default)]
pub struct CompatibilityTable {
    entries: BTreeMap<String, Vec<(Release, Vec<String>)>>,
}

impl CompatibilityTable {
    /// Returns true if the table has an entry for the charm.
    pub fn knows(&self, charm: &str) -> bool {
        self.entries.contains_key(charm)
    }

    /// All releases compatible with the workload version, in ascending order.
    /// Empty when the charm or version is unknown.
    pub fn lookup(&self, charm: &str, workload_version: &str) -> Vec<Release> {
        let Some(entries) = self.entries.get(charm) else {
            return Vec::new();
        };

        let version = version_components(workload_version);
        if version.is_empty() {
            return Vec::new();
        }

        let mut releases: Vec<Release> = entries
            .iter()
            .filter(|(_, prefixes)| {
                prefixes
                    .iter()
                    .any(|prefix| matches_prefix(&version, &version_components(prefix)))
            })
            .map(|(release, _)| release.clone())
            .collect();
        releases.sort();
        releases
    }
}

/// Split a workload version into dotted components, dropping a Debian epoch.
fn version_components(version: &str) -> Vec<&str> {
    let version = version.trim();
    let version = version.split_once(':').map_or(version, |(_, rest)| rest);
    version.split('.').filter(|c| !c.is_empty()).collect()
}

fn matches_prefix(version: &[&str], prefix: &[&str]) -> bool {
    !prefix.is_empty() && version.len() >= prefix.len() && version[..prefix.len()] == *prefix
}

/// Immutable compatibility data shared by the planner.
#[derive(Debug, Clone)]
pub struct Catalog {
    pub releases: ReleaseCatalog,
    pub compatibility: CompatibilityTable,
    data_plane_charms: BTreeSet<String>,
    subordinate_charms: BTreeSet<String>,
    ceph_releases: Vec<String>,
}

impl Catalog {
    /// The catalog compiled into the binary.
    pub fn embedded() -> Result<Self> {
        Self::from_yaml(EMBEDDED_CATALOG).context("Failed to load embedded release catalog")
    }

    /// Load a catalog from a YAML file.
    pub fn load(path: &Path) -> Result<Self> {
        debug!("Loading release catalog from {}", path.display());
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read release catalog {}", path.display()))?;
        Self::from_yaml(&content)
            .with_context(|| format!("Failed to load release catalog {}", path.display()))
    }

    /// Parse and validate a catalog from YAML text.
    pub fn from_yaml(content: &str) -> Result<Self> {
        let file: CatalogFile = serde_yaml::from_str(content).map_err(|e| CouError::Parse {
            what: "release catalog".to_string(),
            details: e.to_string(),
        })?;

        if file.releases.is_empty() {
            return Err(CouError::Catalog("no releases defined".to_string()).into());
        }

        let releases = ReleaseCatalog::new(&file.releases, &file.series)?;

        let mut entries = BTreeMap::new();
        for (charm, per_release) in &file.workloads {
            let mut charm_entries = Vec::with_capacity(per_release.len());
            for (codename, prefixes) in per_release {
                let release = releases.release(codename).with_context(|| {
                    format!("workload entry for charm '{charm}' refers to an unknown release")
                })?;
                charm_entries.push((release, prefixes.clone()));
            }
            charm_entries.sort_by(|a, b| a.0.cmp(&b.0));
            entries.insert(charm.clone(), charm_entries);
        }

        debug!(
            "Loaded release catalog: {} releases, {} series, {} charms",
            file.releases.len(),
            file.series.len(),
            entries.len()
        );

        Ok(Self {
            releases,
            compatibility: CompatibilityTable { entries },
            data_plane_charms: file.data_plane_charms.into_iter().collect(),
            subordinate_charms: file.subordinate_charms.into_iter().collect(),
            ceph_releases: file.ceph_releases,
        })
    }

    /// Returns true if the charm runs on the data plane.
    pub fn is_data_plane(&self, charm: &str) -> bool {
        self.data_plane_charms.contains(charm)
    }

    /// Returns true if the charm is a known subordinate charm.
    pub fn is_subordinate_charm(&self, charm: &str) -> bool {
        self.subordinate_charms.contains(charm)
    }

    /// Returns true if the charm is managed by this tool.
    pub fn is_known_charm(&self, charm: &str) -> bool {
        self.compatibility.knows(charm) || self.is_subordinate_charm(charm)
    }

    /// Known Ceph release names, oldest first.
    pub fn ceph_releases(&self) -> &[String] {
        &self.ceph_releases
    }
}
