//! Status snapshots shared by planning tests.

use serde_json::Value;

use crate::juju::status::UnitStatus;
use crate::juju::{ApplicationStatus, ModelStatus};

pub const MODEL: &str = "openstack";

/// Principal on focal with `openstack-origin` set to distro and
/// `action-managed-upgrade` enabled.
pub fn principal(
    charm: &str,
    revision: u32,
    channel: &str,
    units: &[(&str, &str)],
) -> ApplicationStatus {
    let mut status = ApplicationStatus {
        charm: format!("ch:amd64/focal/{charm}-{revision}"),
        charm_channel: channel.to_string(),
        series: "focal".to_string(),
        status: "active".to_string(),
        units: units
            .iter()
            .map(|(name, version)| {
                (
                    name.to_string(),
                    UnitStatus {
                        workload_version: version.to_string(),
                    },
                )
            })
            .collect(),
        ..Default::default()
    };
    status.config.insert(
        "openstack-origin".to_string(),
        Value::String("distro".to_string()),
    );
    status
        .config
        .insert("action-managed-upgrade".to_string(), Value::Bool(true));
    status
}

pub fn keystone_ussuri() -> ApplicationStatus {
    principal(
        "keystone",
        638,
        "ussuri/stable",
        &[
            ("keystone/0", "17.0.1"),
            ("keystone/1", "17.0.1"),
            ("keystone/2", "17.0.1"),
        ],
    )
}

pub fn cinder_ussuri() -> ApplicationStatus {
    principal(
        "cinder",
        554,
        "ussuri/stable",
        &[
            ("cinder/0", "16.4.2"),
            ("cinder/1", "16.4.2"),
            ("cinder/2", "16.4.2"),
        ],
    )
}

pub fn keystone_ldap_ussuri() -> ApplicationStatus {
    ApplicationStatus {
        charm: "ch:amd64/focal/keystone-ldap-437".to_string(),
        charm_channel: "ussuri/stable".to_string(),
        series: "focal".to_string(),
        status: "active".to_string(),
        subordinate_to: vec!["keystone".to_string()],
        ..Default::default()
    }
}

pub fn ceph_mon_octopus() -> ApplicationStatus {
    let mut status = principal(
        "ceph-mon",
        178,
        "octopus/stable",
        &[("ceph-mon/0", "15.2.17"), ("ceph-mon/1", "15.2.17")],
    );
    status.config.clear();
    status
        .config
        .insert("source".to_string(), Value::String("distro".to_string()));
    status
}

pub fn nova_compute_ussuri() -> ApplicationStatus {
    principal(
        "nova-compute",
        669,
        "ussuri/stable",
        &[("nova-compute/0", "21.2.4"), ("nova-compute/1", "21.2.4")],
    )
}

pub fn model(applications: Vec<(&str, ApplicationStatus)>) -> ModelStatus {
    ModelStatus {
        name: MODEL.to_string(),
        applications: applications
            .into_iter()
            .map(|(name, status)| (name.to_string(), status))
            .collect(),
    }
}
