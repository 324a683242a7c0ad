//! Ordered release identifiers and upgrade target resolution.

use std::collections::BTreeMap;
use std::fmt;

use anyhow::Result;
use tracing::debug;

use crate::error::CouError;

/// A release of the cloud platform, ordered by its rank in the release sequence.
///
/// The codename is only the human-facing label; ordering uses the rank.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Release {
    rank: u32,
    codename: String,
}

impl Release {
    pub fn new(codename: impl Into<String>, rank: u32) -> Self {
        Self {
            rank,
            codename: codename.into(),
        }
    }

    pub fn codename(&self) -> &str {
        &self.codename
    }

    /// Charm channel tracking this release, e.g. `victoria/stable`.
    pub fn channel(&self) -> String {
        format!("{}/stable", self.codename)
    }

    /// Package origin for this release on the given series, e.g. `cloud:focal-victoria`.
    pub fn origin(&self, series: &str) -> String {
        format!("cloud:{}-{}", series, self.codename)
    }
}

impl fmt::Display for Release {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.codename)
    }
}

/// The canonical release sequence plus the supported window of each series.
#[derive(Debug, Clone)]
pub struct ReleaseCatalog {
    releases: Vec<Release>,
    supported: BTreeMap<String, Vec<Release>>,
}

impl ReleaseCatalog {
    /// Build a catalog from an ordered list of codenames and the supported
    /// codenames per series.
    pub fn new(
        codenames: &[String],
        supported: &BTreeMap<String, Vec<String>>,
    ) -> Result<Self> {
        let mut releases: Vec<Release> = Vec::with_capacity(codenames.len());
        for (rank, codename) in codenames.iter().enumerate() {
            if releases.iter().any(|r| r.codename == *codename) {
                return Err(CouError::Catalog(format!("duplicate release '{codename}'")).into());
            }
            releases.push(Release::new(codename.clone(), rank as u32));
        }

        let mut catalog = Self {
            releases,
            supported: BTreeMap::new(),
        };

        for (series, names) in supported {
            let mut window = names
                .iter()
                .map(|name| catalog.release(name))
                .collect::<Result<Vec<_>>>()?;
            window.sort();
            window.dedup();
            catalog.supported.insert(series.clone(), window);
        }

        Ok(catalog)
    }

    /// Look up a release by codename.
    pub fn release(&self, codename: &str) -> Result<Release> {
        self.releases
            .iter()
            .find(|r| r.codename == codename)
            .cloned()
            .ok_or_else(|| CouError::UnknownRelease(codename.to_string()).into())
    }

    /// The release following `release` in the sequence.
    pub fn next(&self, release: &Release) -> Option<Release> {
        self.releases.get(release.rank as usize + 1).cloned()
    }

    /// The release preceding `release` in the sequence.
    pub fn previous(&self, release: &Release) -> Option<Release> {
        release
            .rank
            .checked_sub(1)
            .and_then(|rank| self.releases.get(rank as usize))
            .cloned()
    }

    /// Releases supported on a series, in ascending order.
    pub fn supported_on(&self, series: &str) -> &[Release] {
        self.supported.get(series).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Determine the release the deployment should be upgraded to next.
    pub fn resolve_target(
        &self,
        current: Option<&Release>,
        series: Option<&str>,
    ) -> Result<Release> {
        let current = current.ok_or_else(|| {
            CouError::NoTarget(
                "Cannot determine the current OS release in the cloud. \
                 Is this a valid OpenStack cloud?"
                    .to_string(),
            )
        })?;
        let series = series.filter(|s| !s.is_empty()).ok_or_else(|| {
            CouError::NoTarget(
                "Cannot determine the current Ubuntu series in the cloud. \
                 Is this a valid OpenStack cloud?"
                    .to_string(),
            )
        })?;

        let window = self.supported_on(series);
        if !window.contains(current) {
            let supported = window
                .iter()
                .map(Release::codename)
                .collect::<Vec<_>>()
                .join(", ");
            return Err(CouError::OutOfSupportRange {
                release: current.to_string(),
                series: series.to_string(),
                supported: if supported.is_empty() {
                    "none".to_string()
                } else {
                    supported
                },
            }
            .into());
        }

        if window.last() == Some(current) {
            return Err(CouError::HighestReleaseAchieved {
                release: current.to_string(),
                series: series.to_string(),
            }
            .into());
        }

        let target = self.next(current).ok_or_else(|| {
            CouError::NoTarget(format!(
                "Cannot find target to upgrade. Current minimum OS release is '{current}'. \
                 Current Ubuntu series is '{series}'."
            ))
        })?;

        debug!("Resolved upgrade target: {} -> {}", current, target);
        Ok(target)
    }
}
