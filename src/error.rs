//! Custom error types for cou.

use thiserror::Error;

/// Errors that can occur while planning or executing a cloud upgrade.
#[derive(Error, Debug)]
pub enum CouError {
    #[error("{0}")]
    NoTarget(String),

    #[error("Highest supported release '{release}' for series '{series}' already achieved")]
    HighestReleaseAchieved { release: String, series: String },

    #[error(
        "Release '{release}' on series '{series}' is outside the supported range \
         (supported on {series}: {supported})"
    )]
    OutOfSupportRange {
        release: String,
        series: String,
        supported: String,
    },

    #[error("Units of application {application} are running mismatched releases: {releases}")]
    MismatchedReleases {
        application: String,
        releases: String,
    },

    #[error("[{target}] command '{command}' failed (exit code {exit_code}): {stderr}")]
    RemoteCommandFailed {
        target: String,
        command: String,
        exit_code: i32,
        stderr: String,
    },

    #[error("Inconsistent release across fleet: {0}. Manual intervention is required.")]
    InconsistentFleetRelease(String),

    #[error("Unknown release: {0}")]
    UnknownRelease(String),

    #[error("Invalid release catalog: {0}")]
    Catalog(String),

    #[error("Failed to parse {what}: {details}")]
    Parse { what: String, details: String },
}

impl CouError {
    /// Create a remote command error from a failed invocation.
    pub fn remote(
        target: impl Into<String>,
        command: impl Into<String>,
        exit_code: i32,
        stderr: &str,
    ) -> Self {
        let stderr = stderr.trim();
        Self::RemoteCommandFailed {
            target: target.into(),
            command: command.into(),
            exit_code,
            stderr: if stderr.is_empty() {
                "no error output".to_string()
            } else {
                stderr.lines().last().unwrap_or(stderr).to_string()
            },
        }
    }
}

/// Why a run ended unsuccessfully. Each case maps to a process exit code.
#[derive(Error, Debug)]
pub enum Failure {
    #[error("Failed to generate upgrade plan: {0:#}")]
    Planning(anyhow::Error),

    #[error("Upgrade failed: {0:#}")]
    Execution(anyhow::Error),

    #[error("Operation cancelled by user")]
    Cancelled,
}

impl Failure {
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Planning(_) => 1,
            Self::Execution(_) => 2,
            Self::Cancelled => 3,
        }
    }
}
