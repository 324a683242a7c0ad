//! Depth-first execution of a step tree.

use anyhow::{Context, Result};
use futures::FutureExt;
use futures::future::{BoxFuture, join_all};
use tracing::{debug, info, warn};

use super::Step;
use crate::juju::ControlPlane;
use crate::openstack::Catalog;

/// Everything a running action may need.
pub struct RunContext<'a> {
    pub client: &'a dyn ControlPlane,
    pub catalog: &'a Catalog,
}

impl<'a> RunContext<'a> {
    pub fn new(client: &'a dyn ControlPlane, catalog: &'a Catalog) -> Self {
        Self { client, catalog }
    }
}

impl Step {
    /// Run this step's action, then its children.
    ///
    /// Sequential children stop at the first failure. Parallel children are
    /// all awaited, even when some fail, and the first failure is returned.
    pub fn execute<'a>(&'a self, ctx: &'a RunContext<'a>) -> BoxFuture<'a, Result<()>> {
        async move {
            match self.action() {
                Some(action) => {
                    info!("{}", self.description);
                    action
                        .run(ctx)
                        .await
                        .with_context(|| format!("Step failed: {}", self.description))?;
                }
                None => debug!("[{}] {}", self.kind, self.description),
            }

            if self.parallel {
                run_parallel(&self.sub_steps, ctx).await
            } else {
                for step in &self.sub_steps {
                    step.execute(ctx).await?;
                }
                Ok(())
            }
        }
        .boxed()
    }
}

async fn run_parallel(steps: &[Step], ctx: &RunContext<'_>) -> Result<()> {
    let results = join_all(steps.iter().map(|step| step.execute(ctx))).await;
    let total = results.len();

    let mut failures = results.into_iter().filter_map(Result::err);
    let Some(first) = failures.next() else {
        return Ok(());
    };

    let mut failed = 1;
    for other in failures {
        failed += 1;
        warn!("Concurrent step failed: {:#}", other);
    }
    warn!("{}/{} concurrent steps failed", failed, total);
    Err(first)
}
