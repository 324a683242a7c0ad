//! Upgrade step tree.
//!
//! A [`Step`] is a node with a description, an optional deferred [`Action`]
//! and ordered children. Children of a parallel step run concurrently;
//! children of any other step run in order.

pub mod execute;
pub mod plan;

use std::fmt;

use crate::actions::Action;
pub use execute::RunContext;

/// Phase a step belongs to. Only affects how the step is described.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    Plan,
    PreUpgrade,
    Upgrade,
    PostUpgrade,
    Unit,
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Plan => "plan",
            Self::PreUpgrade => "pre-upgrade",
            Self::Upgrade => "upgrade",
            Self::PostUpgrade => "post-upgrade",
            Self::Unit => "unit",
        };
        f.write_str(name)
    }
}

/// A node of the upgrade tree.
#[derive(Debug, Clone)]
pub struct Step {
    kind: StepKind,
    description: String,
    parallel: bool,
    action: Option<Action>,
    sub_steps: Vec<Step>,
}

impl Step {
    pub fn new(kind: StepKind, description: impl Into<String>) -> Self {
        Self {
            kind,
            description: description.into(),
            parallel: false,
            action: None,
            sub_steps: Vec::new(),
        }
    }

    /// A grouping step without an action.
    pub fn plan(description: impl Into<String>) -> Self {
        Self::new(StepKind::Plan, description)
    }

    pub fn pre_upgrade(description: impl Into<String>) -> Self {
        Self::new(StepKind::PreUpgrade, description)
    }

    pub fn upgrade(description: impl Into<String>) -> Self {
        Self::new(StepKind::Upgrade, description)
    }

    pub fn post_upgrade(description: impl Into<String>) -> Self {
        Self::new(StepKind::PostUpgrade, description)
    }

    pub fn unit(description: impl Into<String>) -> Self {
        Self::new(StepKind::Unit, description)
    }

    /// Attach the action this step runs.
    pub fn with_action(mut self, action: Action) -> Self {
        self.action = Some(action);
        self
    }

    /// Run the children of this step concurrently.
    pub fn in_parallel(mut self) -> Self {
        self.parallel = true;
        self
    }

    pub fn add_step(&mut self, step: Step) {
        self.sub_steps.push(step);
    }

    pub fn add_steps(&mut self, steps: impl IntoIterator<Item = Step>) {
        self.sub_steps.extend(steps);
    }

    pub fn kind(&self) -> StepKind {
        self.kind
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn parallel(&self) -> bool {
        self.parallel
    }

    pub fn action(&self) -> Option<&Action> {
        self.action.as_ref()
    }

    pub fn sub_steps(&self) -> &[Step] {
        &self.sub_steps
    }

    /// True when the step would do nothing: no action and no children.
    pub fn is_empty(&self) -> bool {
        self.action.is_none() && self.sub_steps.is_empty()
    }

    fn render(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        writeln!(f, "{}{}", "    ".repeat(depth), self.description)?;
        for step in &self.sub_steps {
            step.render(f, depth + 1)?;
        }
        Ok(())
    }
}

/// Structural equality: description, parallel flag and children.
/// The attached action and the kind are not compared.
impl PartialEq for Step {
    fn eq(&self, other: &Self) -> bool {
        self.description == other.description
            && self.parallel == other.parallel
            && self.sub_steps == other.sub_steps
    }
}

impl Eq for Step {}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.render(f, 0)
    }
}
