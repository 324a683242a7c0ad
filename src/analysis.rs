//! Deployment analysis: which applications are upgraded and from where.

use anyhow::Result;
use tracing::debug;

use crate::apps::Application;
use crate::juju::ModelStatus;
use crate::openstack::{Catalog, Release};

/// Known applications of a model, split by tier.
#[derive(Debug, Clone)]
pub struct Analysis {
    pub model_name: String,
    pub control_plane: Vec<Application>,
    pub data_plane: Vec<Application>,
}

impl Analysis {
    /// Build the analysis from a status snapshot.
    ///
    /// Charms unknown to the catalog are ignored.
    pub fn from_status(status: &ModelStatus, catalog: &Catalog) -> Self {
        let mut control_plane = Vec::new();
        let mut data_plane = Vec::new();

        for (name, app_status) in &status.applications {
            let app = Application::from_status(name, app_status, &status.name, catalog);
            if !catalog.is_known_charm(&app.charm) {
                debug!("Ignoring application {} with charm {}", app.name, app.charm);
                continue;
            }
            debug!("Analyzed application:\n{}", app);
            if catalog.is_data_plane(&app.charm) {
                data_plane.push(app);
            } else {
                control_plane.push(app);
            }
        }

        debug!(
            "Analysis of model {}: {} control plane, {} data plane applications",
            status.name,
            control_plane.len(),
            data_plane.len()
        );

        Self {
            model_name: status.name.clone(),
            control_plane,
            data_plane,
        }
    }

    /// Oldest release among control plane applications.
    pub fn current_release(&self) -> Result<Option<Release>> {
        min_release(&self.control_plane)
    }

    /// Oldest release among data plane applications.
    pub fn data_plane_release(&self) -> Result<Option<Release>> {
        min_release(&self.data_plane)
    }

    /// Series of the deployment, taken from the first application.
    pub fn series(&self) -> Option<&str> {
        self.control_plane
            .iter()
            .chain(&self.data_plane)
            .map(|app| app.series.as_str())
            .find(|series| !series.is_empty())
    }
}

fn min_release(apps: &[Application]) -> Result<Option<Release>> {
    let mut releases = Vec::new();
    for app in apps {
        if let Some(release) = app.current_release()? {
            releases.push(release);
        }
    }
    Ok(releases.into_iter().min())
}
