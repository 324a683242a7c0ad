//! Deployment-wide upgrade plan.

use std::time::Duration;

use anyhow::Result;
use tracing::{info, warn};

use super::Step;
use crate::actions::Action;
use crate::analysis::Analysis;
use crate::apps::{Application, Generation};
use crate::juju::IdleWait;
use crate::openstack::{Catalog, Release};

const IDLE_CHECK_TIMEOUT: Duration = Duration::from_secs(11);
const IDLE_CHECK_PERIOD: Duration = Duration::from_secs(10);

/// Operator choices that shape the plan.
#[derive(Debug, Clone, Copy)]
pub struct PlanOptions {
    pub backup: bool,
}

impl Default for PlanOptions {
    fn default() -> Self {
        Self { backup: true }
    }
}

/// Build the full upgrade plan for the analysed deployment.
///
/// Fails when no target can be resolved or an application plan fails.
pub fn generate_plan(
    analysis: &Analysis,
    catalog: &Catalog,
    options: &PlanOptions,
) -> Result<Step> {
    let current = analysis.current_release()?;
    let target = catalog
        .releases
        .resolve_target(current.as_ref(), analysis.series())?;
    // resolve_target only succeeds with a known current release.
    let current = current.map(|r| r.to_string()).unwrap_or_default();
    info!("Planning upgrade from {} to {}", current, target);

    let mut plan = Step::plan(format!("Upgrade cloud from '{current}' to '{target}'"));
    plan.add_step(
        Step::pre_upgrade("Verify that all OpenStack applications are in idle state").with_action(
            Action::WaitForIdle(IdleWait {
                timeout: IDLE_CHECK_TIMEOUT,
                apps: None,
                idle_period: Some(IDLE_CHECK_PERIOD),
                raise_on_blocked: true,
            }),
        ),
    );
    if options.backup {
        plan.add_step(Step::pre_upgrade("Backup mysql databases").with_action(Action::Backup));
    } else {
        info!("Skipping database backup");
    }

    let groups = [
        create_upgrade_group(
            &analysis.control_plane,
            &target,
            catalog,
            "Control Plane principal(s) upgrade plan",
            |app| !app.subordinate,
        )?,
        create_upgrade_group(
            &analysis.control_plane,
            &target,
            catalog,
            "Control Plane subordinate(s) upgrade plan",
            |app| app.subordinate,
        )?,
    ];
    plan.add_steps(groups.into_iter().filter(|group| !group.is_empty()));

    Ok(plan)
}

/// Group the plans of every application passing `filter`.
///
/// Halted applications are left out; any planning error aborts the group.
pub fn create_upgrade_group<F>(
    apps: &[Application],
    target: &Release,
    catalog: &Catalog,
    description: &str,
    filter: F,
) -> Result<Step>
where
    F: Fn(&Application) -> bool,
{
    let mut group = Step::plan(description);
    for app in apps.iter().filter(|app| filter(app)) {
        match app.generate_upgrade_plan(target, catalog)? {
            Generation::Plan(step) => group.add_step(step),
            Generation::Halt(reason) => warn!("{}", reason),
        }
    }
    Ok(group)
}

/// Warning shown when the control plane is ahead of the data plane.
pub fn data_plane_warning(analysis: &Analysis) -> Result<Option<String>> {
    let (Some(control), Some(data)) = (
        analysis.current_release()?,
        analysis.data_plane_release()?,
    ) else {
        return Ok(None);
    };
    if control <= data {
        return Ok(None);
    }

    let mut names: Vec<&str> = analysis
        .data_plane
        .iter()
        .map(|a| a.name.as_str())
        .collect();
    names.sort_unstable();
    Ok(Some(format!(
        "WARNING: Please upgrade manually the data plane apps: {}",
        names.join(", ")
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apps::fixtures::{self, MODEL};
    use crate::error::CouError;

    fn catalog() -> Catalog {
        Catalog::embedded().unwrap()
    }

    fn app(name: &str, status: crate::juju::ApplicationStatus, catalog: &Catalog) -> Application {
        Application::from_status(name, &status, MODEL, catalog)
    }

    fn expected_principal(app: &Application, target: &str, previous: &str) -> Step {
        let name = &app.name;
        let mut packages = Step::pre_upgrade(format!(
            "Upgrade software packages of '{name}' from the current APT repositories"
        ))
        .in_parallel();
        packages.add_steps(
            app.units
                .keys()
                .map(|unit| Step::unit(format!("Upgrade software packages on unit {unit}"))),
        );

        let wait = if ["rabbitmq-server", "ceph-mon", "keystone"].contains(&app.charm.as_str()) {
            Step::post_upgrade(format!(
                "Wait 1800s for model {MODEL} to reach the idle state."
            ))
        } else {
            Step::post_upgrade(format!("Wait 300s for app {name} to reach the idle state."))
        };

        let mut plan = Step::plan(format!("Upgrade plan for '{name}' to {target}"));
        plan.add_steps(vec![
            packages,
            Step::pre_upgrade(format!(
                "Refresh '{name}' to the latest revision of '{previous}/stable'"
            )),
            Step::upgrade(format!(
                "Change charm config of '{name}' 'action-managed-upgrade' to False."
            )),
            Step::upgrade(format!(
                "Upgrade '{name}' to the new channel: '{target}/stable'"
            )),
            Step::upgrade(format!(
                "Change charm config of '{name}' 'openstack-origin' to 'cloud:focal-{target}'"
            )),
            wait,
            Step::post_upgrade(format!("Check if the workload of '{name}' has been upgraded")),
        ]);
        plan
    }

    fn expected_subordinate(app: &Application, target: &str, previous: &str) -> Step {
        let name = &app.name;
        let mut plan = Step::plan(format!("Upgrade plan for '{name}' to {target}"));
        plan.add_steps(vec![
            Step::pre_upgrade(format!(
                "Refresh '{name}' to the latest revision of '{previous}/stable'"
            )),
            Step::upgrade(format!(
                "Upgrade '{name}' to the new channel: '{target}/stable'"
            )),
        ]);
        plan
    }

    #[test]
    fn test_generate_plan() {
        let catalog = catalog();
        let keystone = app("keystone", fixtures::keystone_ussuri(), &catalog);
        let cinder = app("cinder", fixtures::cinder_ussuri(), &catalog);
        let keystone_ldap = app("keystone-ldap", fixtures::keystone_ldap_ussuri(), &catalog);
        let analysis = Analysis {
            model_name: MODEL.to_string(),
            control_plane: vec![keystone.clone(), cinder.clone(), keystone_ldap.clone()],
            data_plane: vec![],
        };

        let plan = generate_plan(&analysis, &catalog, &PlanOptions::default()).unwrap();

        let mut expected = Step::plan("Upgrade cloud from 'ussuri' to 'victoria'");
        expected.add_step(Step::pre_upgrade(
            "Verify that all OpenStack applications are in idle state",
        ));
        expected.add_step(Step::pre_upgrade("Backup mysql databases"));
        let mut principals = Step::plan("Control Plane principal(s) upgrade plan");
        principals.add_step(expected_principal(&keystone, "victoria", "ussuri"));
        principals.add_step(expected_principal(&cinder, "victoria", "ussuri"));
        let mut subordinates = Step::plan("Control Plane subordinate(s) upgrade plan");
        subordinates.add_step(expected_subordinate(&keystone_ldap, "victoria", "ussuri"));
        expected.add_step(principals);
        expected.add_step(subordinates);

        assert_eq!(plan, expected);
        assert_eq!(
            plan.sub_steps()[0].action(),
            Some(&Action::WaitForIdle(IdleWait {
                timeout: Duration::from_secs(11),
                apps: None,
                idle_period: Some(Duration::from_secs(10)),
                raise_on_blocked: true,
            }))
        );
        assert_eq!(plan.sub_steps()[1].action(), Some(&Action::Backup));
    }

    #[test]
    fn test_identity_service_plan_shape() {
        let catalog = catalog();
        let keystone = app("keystone", fixtures::keystone_ussuri(), &catalog);
        let analysis = Analysis {
            model_name: MODEL.to_string(),
            control_plane: vec![keystone],
            data_plane: vec![],
        };

        let plan = generate_plan(&analysis, &catalog, &PlanOptions::default()).unwrap();
        let keystone_plan = &plan.sub_steps()[2].sub_steps()[0];

        assert_eq!(keystone_plan.sub_steps().len(), 7);
        let packages = &keystone_plan.sub_steps()[0];
        assert!(packages.parallel());
        assert_eq!(packages.sub_steps().len(), 3);
        assert_eq!(
            keystone_plan.sub_steps()[5].description(),
            "Wait 1800s for model openstack to reach the idle state."
        );
        // No subordinates: the group is left out.
        assert_eq!(plan.sub_steps().len(), 3);
    }

    #[test]
    fn test_generate_plan_without_backup() {
        let catalog = catalog();
        let analysis = Analysis {
            model_name: MODEL.to_string(),
            control_plane: vec![app("cinder", fixtures::cinder_ussuri(), &catalog)],
            data_plane: vec![],
        };

        let plan = generate_plan(&analysis, &catalog, &PlanOptions { backup: false }).unwrap();
        assert!(
            !plan
                .sub_steps()
                .iter()
                .any(|s| s.description() == "Backup mysql databases")
        );
    }

    #[test]
    fn test_generate_plan_no_current_release() {
        let catalog = catalog();
        let analysis = Analysis {
            model_name: MODEL.to_string(),
            control_plane: vec![],
            data_plane: vec![],
        };

        let err = generate_plan(&analysis, &catalog, &PlanOptions::default()).unwrap_err();
        assert!(matches!(
            err.downcast::<CouError>().unwrap(),
            CouError::NoTarget(_)
        ));
    }

    #[test]
    fn test_generate_plan_highest_release() {
        let catalog = catalog();
        let keystone_yoga = fixtures::principal(
            "keystone",
            638,
            "yoga/stable",
            &[("keystone/0", "21.0.0")],
        );
        let analysis = Analysis {
            model_name: MODEL.to_string(),
            control_plane: vec![app("keystone", keystone_yoga, &catalog)],
            data_plane: vec![],
        };

        let err = generate_plan(&analysis, &catalog, &PlanOptions::default()).unwrap_err();
        assert!(matches!(
            err.downcast::<CouError>().unwrap(),
            CouError::HighestReleaseAchieved { .. }
        ));
    }

    #[test]
    fn test_upgrade_group_omits_halted_apps() {
        let catalog = catalog();
        let keystone_victoria = fixtures::principal(
            "keystone",
            638,
            "victoria/stable",
            &[("keystone/0", "18.1.0")],
        );
        let apps = vec![
            app("keystone", keystone_victoria, &catalog),
            app("cinder", fixtures::cinder_ussuri(), &catalog),
        ];
        let victoria = catalog.releases.release("victoria").unwrap();

        let group =
            create_upgrade_group(&apps, &victoria, &catalog, "principals", |_| true).unwrap();
        let names: Vec<&str> = group.sub_steps().iter().map(Step::description).collect();
        assert_eq!(names, vec!["Upgrade plan for 'cinder' to victoria"]);
    }

    #[test]
    fn test_upgrade_group_propagates_errors() {
        let catalog = catalog();
        let mismatched = fixtures::principal(
            "keystone",
            638,
            "ussuri/stable",
            &[("keystone/0", "17.0.1"), ("keystone/1", "18.1.0")],
        );
        let apps = vec![
            app("cinder", fixtures::cinder_ussuri(), &catalog),
            app("keystone", mismatched, &catalog),
        ];
        let victoria = catalog.releases.release("victoria").unwrap();

        let err = create_upgrade_group(&apps, &victoria, &catalog, "principals", |_| true)
            .unwrap_err();
        assert!(matches!(
            err.downcast::<CouError>().unwrap(),
            CouError::MismatchedReleases { .. }
        ));
    }

    #[test]
    fn test_upgrade_group_filter() {
        let catalog = catalog();
        let apps = vec![
            app("cinder", fixtures::cinder_ussuri(), &catalog),
            app("keystone-ldap", fixtures::keystone_ldap_ussuri(), &catalog),
        ];
        let victoria = catalog.releases.release("victoria").unwrap();

        let group =
            create_upgrade_group(&apps, &victoria, &catalog, "subordinates", |a| a.subordinate)
                .unwrap();
        assert_eq!(group.sub_steps().len(), 1);
        assert_eq!(
            group.sub_steps()[0].description(),
            "Upgrade plan for 'keystone-ldap' to victoria"
        );
    }

    #[test]
    fn test_data_plane_warning() {
        let catalog = catalog();
        let keystone_victoria = fixtures::principal(
            "keystone",
            638,
            "victoria/stable",
            &[("keystone/0", "18.1.0")],
        );
        let mut analysis = Analysis {
            model_name: MODEL.to_string(),
            control_plane: vec![app("keystone", keystone_victoria, &catalog)],
            data_plane: vec![
                app("nova-compute", fixtures::nova_compute_ussuri(), &catalog),
                app(
                    "ceph-osd",
                    fixtures::principal(
                        "ceph-osd",
                        564,
                        "octopus/stable",
                        &[("ceph-osd/0", "15.2.17")],
                    ),
                    &catalog,
                ),
            ],
        };

        assert_eq!(
            data_plane_warning(&analysis).unwrap().as_deref(),
            Some("WARNING: Please upgrade manually the data plane apps: ceph-osd, nova-compute")
        );

        analysis.control_plane = vec![app("cinder", fixtures::cinder_ussuri(), &catalog)];
        assert!(data_plane_warning(&analysis).unwrap().is_none());
    }

    #[test]
    fn test_plan_render() {
        let catalog = catalog();
        let analysis = Analysis {
            model_name: MODEL.to_string(),
            control_plane: vec![app("keystone-ldap", fixtures::keystone_ldap_ussuri(), &catalog)],
            data_plane: vec![],
        };
        let plan = generate_plan(&analysis, &catalog, &PlanOptions { backup: false });
        // Only a subordinate: the current release is unknown.
        assert!(plan.is_err());

        let analysis = Analysis {
            model_name: MODEL.to_string(),
            control_plane: vec![app("cinder", fixtures::cinder_ussuri(), &catalog)],
            data_plane: vec![],
        };
        let rendered = generate_plan(&analysis, &catalog, &PlanOptions { backup: false })
            .unwrap()
            .to_string();
        assert!(rendered.starts_with("Upgrade cloud from 'ussuri' to 'victoria'\n"));
        assert!(rendered.contains("\n    Control Plane principal(s) upgrade plan\n"));
        assert!(rendered.contains("\n        Upgrade plan for 'cinder' to victoria\n"));
        assert!(
            rendered.contains("\n                Upgrade software packages on unit cinder/0\n")
        );
    }
}
