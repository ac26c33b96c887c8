//! Before/after containers that run around a set of test cases.

use std::fmt;

use crate::actions::{ActionState, TestAction};
use crate::container::run_actions;
use crate::error::{CourierError, Result};
use crate::runtime::TestContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuitePhase {
    Before,
    After,
}

impl fmt::Display for SuitePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SuitePhase::Before => write!(f, "before-suite"),
            SuitePhase::After => write!(f, "after-suite"),
        }
    }
}

/// Suite-level container.
///
/// Runs outside any test case, so it reports its own failure: the first
/// failing child aborts the rest and the error is wrapped once with the
/// container's name.
pub struct SuiteContainer {
    name: String,
    phase: SuitePhase,
    actions: Vec<Box<dyn TestAction>>,
}

impl SuiteContainer {
    pub fn before(name: impl Into<String>) -> Self {
        Self::new(name, SuitePhase::Before)
    }

    pub fn after(name: impl Into<String>) -> Self {
        Self::new(name, SuitePhase::After)
    }

    fn new(name: impl Into<String>, phase: SuitePhase) -> Self {
        Self {
            name: name.into(),
            phase,
            actions: Vec::new(),
        }
    }

    pub fn phase(&self) -> SuitePhase {
        self.phase
    }

    pub fn action(mut self, action: impl TestAction + 'static) -> Self {
        self.actions.push(Box::new(action));
        self
    }

    pub fn add(&mut self, action: Box<dyn TestAction>) {
        self.actions.push(action);
    }

    /// Execute all children against `context`.
    pub fn run(&self, context: &mut TestContext) -> Result<Vec<ActionState>> {
        tracing::info!("Running {} container '{}'", self.phase, self.name);
        run_actions(&self.actions, context).map_err(|e| {
            tracing::error!("{} container '{}' failed: {}", self.phase, self.name, e);
            CourierError::execution(self.name.clone(), e)
        })
    }
}
