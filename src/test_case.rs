//! Test cases: declared variables plus an ordered list of top-level actions.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;

use crate::actions::{ActionState, TestAction};
use crate::error::{CourierError, Result};
use crate::runtime::TestContext;

/// Variable seeded with the running test case's name.
pub const TEST_NAME_VARIABLE: &str = "courier.test.name";

/// Terminal status of a test case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TestResult {
    Pending,
    Success,
    Failed {
        /// Innermost failing action, `None` when variable seeding failed.
        action: Option<String>,
        cause: String,
    },
}

impl TestResult {
    fn from_error(error: &CourierError) -> Self {
        TestResult::Failed {
            action: error.failed_action().map(str::to_string),
            cause: error.root_cause().to_string(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, TestResult::Success)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, TestResult::Failed { .. })
    }
}

pub struct TestCase {
    name: String,
    variables: IndexMap<String, String>,
    actions: Vec<Box<dyn TestAction>>,
    states: Vec<ActionState>,
    result: TestResult,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
}

impl TestCase {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            variables: IndexMap::new(),
            actions: Vec::new(),
            states: Vec::new(),
            result: TestResult::Pending,
            started_at: None,
            finished_at: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declare a variable. Declarations are evaluated in order and may
    /// reference earlier ones.
    pub fn variable(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_variable(name, value);
        self
    }

    /// Declare or override a variable, keeping its original position.
    pub fn set_variable(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.variables.insert(name.into(), value.into());
    }

    pub fn action(mut self, action: impl TestAction + 'static) -> Self {
        self.actions.push(Box::new(action));
        self
    }

    pub fn add_action(&mut self, action: Box<dyn TestAction>) {
        self.actions.push(action);
    }

    pub fn actions(&self) -> &[Box<dyn TestAction>] {
        &self.actions
    }

    /// State of each top-level action that has run so far.
    pub fn states(&self) -> &[ActionState] {
        &self.states
    }

    pub fn result(&self) -> &TestResult {
        &self.result
    }

    pub fn duration(&self) -> Option<chrono::Duration> {
        Some(self.finished_at? - self.started_at?)
    }

    fn seed_variables(&self, context: &mut TestContext) -> Result<()> {
        context.set_variable(TEST_NAME_VARIABLE, self.name.clone());
        for (name, template) in &self.variables {
            let value = context.resolve(template)?;
            context.set_variable(name.clone(), value);
        }
        Ok(())
    }

    fn complete(&mut self, result: TestResult) {
        self.result = result;
        self.finished_at = Some(Utc::now());
    }

    /// Seed the context and run every top-level action in order.
    ///
    /// The first failure marks the case `Failed` with the failing action's
    /// name and the original cause, and stops execution.
    ///
    /// # Returns
    /// The first failure, or `Ok` once the case completed successfully
    pub fn run(&mut self, context: &mut TestContext) -> Result<()> {
        if self.result != TestResult::Pending {
            return Err(CourierError::Config(format!(
                "test case '{}' has already been executed",
                self.name
            )));
        }

        tracing::info!("Running test case '{}'", self.name);
        self.started_at = Some(Utc::now());

        if let Err(e) = self.seed_variables(context) {
            tracing::error!("Test case '{}' failed while declaring variables: {}", self.name, e);
            self.complete(TestResult::from_error(&e));
            return Err(e);
        }

        let mut failure = None;
        for action in &self.actions {
            match action.execute(context) {
                Ok(state) => self.states.push(state),
                Err(e) => {
                    self.states.push(ActionState::Failed);
                    failure = Some(e);
                    break;
                }
            }
        }

        match failure {
            Some(e) => {
                tracing::error!("Test case '{}' FAILED: {}", self.name, e);
                self.complete(TestResult::from_error(&e));
                Err(e)
            }
            None => {
                tracing::info!("Test case '{}' SUCCESS", self.name);
                self.complete(TestResult::Success);
                Ok(())
            }
        }
    }
}

/// Runs actions immediately as they are added, recording them on the
/// underlying test case.
pub struct TestCaseRunner {
    test_case: TestCase,
    context: TestContext,
}

impl TestCaseRunner {
    pub fn start(mut test_case: TestCase, mut context: TestContext) -> Result<Self> {
        test_case.started_at = Some(Utc::now());
        if let Err(e) = test_case.seed_variables(&mut context) {
            test_case.complete(TestResult::from_error(&e));
            return Err(e);
        }
        Ok(Self { test_case, context })
    }

    pub fn context(&self) -> &TestContext {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut TestContext {
        &mut self.context
    }

    pub fn test_case(&self) -> &TestCase {
        &self.test_case
    }

    /// Execute `action` now. Refuses to run once an earlier action failed.
    pub fn run(&mut self, action: impl TestAction + 'static) -> Result<ActionState> {
        if self.test_case.result.is_failed() {
            return Err(CourierError::Aborted(self.test_case.name.clone()));
        }

        self.test_case.actions.push(Box::new(action));
        let Some(action) = self.test_case.actions.last() else {
            return Err(CourierError::Aborted(self.test_case.name.clone()));
        };

        match action.execute(&mut self.context) {
            Ok(state) => {
                self.test_case.states.push(state);
                Ok(state)
            }
            Err(e) => {
                self.test_case.states.push(ActionState::Failed);
                self.test_case.complete(TestResult::from_error(&e));
                Err(e)
            }
        }
    }

    /// Close the run, marking it successful unless an action failed.
    pub fn finish(mut self) -> (TestCase, TestContext) {
        if self.test_case.result == TestResult::Pending {
            self.test_case.complete(TestResult::Success);
        }
        (self.test_case, self.context)
    }
}
