//! Action containers.
//!
//! Containers run their children in order and stop at the first failure. The
//! child's error (already wrapped with the child's name) is returned from the
//! container body and wrapped once more with the container's own name by
//! [`TestAction::execute`].

pub mod suite;

use crate::actions::{ActionState, TestAction};
use crate::actor::TestActor;
use crate::error::{CourierError, Result};
use crate::runtime::TestContext;

pub use suite::{SuiteContainer, SuitePhase};

/// Run actions in order, aborting on the first failure.
pub fn run_actions(actions: &[Box<dyn TestAction>], context: &mut TestContext) -> Result<Vec<ActionState>> {
    actions
        .iter()
        .map(|action| action.execute(context))
        .collect()
}

/// Ordered group of actions.
pub struct Sequence {
    name: String,
    actor: Option<TestActor>,
    actions: Vec<Box<dyn TestAction>>,
}

impl Sequence {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            actor: None,
            actions: Vec::new(),
        }
    }

    pub fn with_actor(mut self, actor: TestActor) -> Self {
        self.actor = Some(actor);
        self
    }

    pub fn action(mut self, action: impl TestAction + 'static) -> Self {
        self.actions.push(Box::new(action));
        self
    }

    pub fn add(&mut self, action: Box<dyn TestAction>) {
        self.actions.push(action);
    }

    pub fn actions(&self) -> &[Box<dyn TestAction>] {
        &self.actions
    }
}

impl TestAction for Sequence {
    fn name(&self) -> &str {
        &self.name
    }

    fn actor(&self) -> Option<&TestActor> {
        self.actor.as_ref()
    }

    fn do_execute(&self, context: &mut TestContext) -> Result<()> {
        run_actions(&self.actions, context).map(|_| ())
    }
}

/// Runs its children only when the resolved condition holds.
pub struct Conditional {
    name: String,
    actor: Option<TestActor>,
    condition: String,
    actions: Vec<Box<dyn TestAction>>,
}

impl Conditional {
    pub fn new(condition: impl Into<String>) -> Self {
        Self {
            name: "conditional".to_string(),
            actor: None,
            condition: condition.into(),
            actions: Vec::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_actor(mut self, actor: TestActor) -> Self {
        self.actor = Some(actor);
        self
    }

    pub fn action(mut self, action: impl TestAction + 'static) -> Self {
        self.actions.push(Box::new(action));
        self
    }

    pub fn add(&mut self, action: Box<dyn TestAction>) {
        self.actions.push(action);
    }
}

impl TestAction for Conditional {
    fn name(&self) -> &str {
        &self.name
    }

    fn actor(&self) -> Option<&TestActor> {
        self.actor.as_ref()
    }

    fn do_execute(&self, context: &mut TestContext) -> Result<()> {
        if evaluate_condition(&self.condition, context)? {
            run_actions(&self.actions, context)?;
        } else {
            tracing::info!("Condition '{}' not satisfied, skipping container '{}'", self.condition, self.name);
        }
        Ok(())
    }
}

const OPERATORS: [&str; 7] = ["==", "!=", "<=", ">=", "=", "<", ">"];

/// First operator occurrence; two-character operators win at the same position.
fn leftmost_operator(expression: &str) -> Option<(usize, &'static str)> {
    expression.char_indices().find_map(|(idx, _)| {
        OPERATORS
            .iter()
            .find(|op| expression[idx..].starts_with(*op))
            .map(|op| (idx, *op))
    })
}

/// Evaluate `true`, `false` or `lhs op rhs` after resolving placeholders.
///
/// The expression splits at its leftmost operator. Operands are compared
/// numerically when both parse as numbers, otherwise as trimmed text.
pub fn evaluate_condition(expression: &str, context: &TestContext) -> Result<bool> {
    let resolved = context.resolve(expression)?;
    let trimmed = resolved.trim();

    if trimmed.eq_ignore_ascii_case("true") {
        return Ok(true);
    }
    if trimmed.eq_ignore_ascii_case("false") {
        return Ok(false);
    }

    let (idx, op) = leftmost_operator(trimmed)
        .ok_or_else(|| CourierError::InvalidExpression(format!("cannot evaluate condition '{}'", trimmed)))?;

    let lhs = trimmed[..idx].trim();
    let rhs = trimmed[idx + op.len()..].trim();

    let ordering = match (lhs.parse::<f64>(), rhs.parse::<f64>()) {
        (Ok(l), Ok(r)) => l.partial_cmp(&r),
        _ => Some(lhs.cmp(rhs)),
    };
    let Some(ordering) = ordering else {
        return Ok(op == "!=");
    };

    Ok(match op {
        "==" | "=" => ordering.is_eq(),
        "!=" => ordering.is_ne(),
        "<" => ordering.is_lt(),
        "<=" => ordering.is_le(),
        ">" => ordering.is_gt(),
        _ => ordering.is_ge(),
    })
}
