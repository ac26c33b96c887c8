//! Test actions.
//!
//! Every action runs through [`TestAction::execute`], which performs the
//! actor-based skip check, logs failures with the action name and wraps them
//! exactly once in [`CourierError::Execution`].

pub mod echo;
pub mod fail;
pub mod receive;
pub mod send;
pub mod sleep;
pub mod variables;

use std::sync::Arc;

use crate::actor::TestActor;
use crate::endpoint::Endpoint;
use crate::error::{CourierError, Result};
use crate::reference::Reference;
use crate::runtime::TestContext;

pub use echo::EchoAction;
pub use fail::FailAction;
pub use receive::{receive, ReceiveMessageAction, ReceiveMessageActionBuilder};
pub use send::{send, SendMessageAction, SendMessageActionBuilder};
pub use sleep::SleepAction;
pub use variables::CreateVariablesAction;

/// Outcome of a single action execution. Actions that have not run yet have
/// no recorded state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionState {
    Skipped,
    Done,
    Failed,
}

pub trait TestAction: Send + Sync {
    fn name(&self) -> &str;

    fn actor(&self) -> Option<&TestActor> {
        None
    }

    /// Whether the action is switched off for this execution.
    fn is_disabled(&self, _context: &TestContext) -> Result<bool> {
        Ok(self.actor().is_some_and(TestActor::is_disabled))
    }

    /// Action body. Errors are wrapped by [`TestAction::execute`].
    fn do_execute(&self, context: &mut TestContext) -> Result<()>;

    /// Run the action.
    ///
    /// # Returns
    /// `Skipped` when disabled, `Done` on success, or the failure wrapped
    /// in `Execution` naming this action
    fn execute(&self, context: &mut TestContext) -> Result<ActionState> {
        let disabled = self
            .is_disabled(context)
            .map_err(|e| CourierError::execution(self.name(), e))?;

        if disabled {
            tracing::info!("Skipping action '{}' - actor is disabled", self.name());
            return Ok(ActionState::Skipped);
        }

        tracing::debug!("Executing action '{}'", self.name());
        match self.do_execute(context) {
            Ok(()) => Ok(ActionState::Done),
            Err(e) => {
                tracing::error!("Action '{}' failed: {}", self.name(), e);
                Err(CourierError::execution(self.name(), e))
            }
        }
    }
}

/// Skip check shared by send and receive: the action's own actor takes
/// precedence over the actor inherited from the endpoint.
pub(crate) fn endpoint_action_disabled(
    actor: Option<&TestActor>,
    endpoint: &Reference<Arc<dyn Endpoint>>,
    context: &TestContext,
) -> Result<bool> {
    match actor {
        Some(actor) => Ok(actor.is_disabled()),
        None => {
            let endpoint = endpoint.resolve(context)?;
            Ok(endpoint.actor().is_some_and(TestActor::is_disabled))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Failing;

    impl TestAction for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        fn do_execute(&self, _context: &mut TestContext) -> Result<()> {
            Err(CourierError::Validation("boom".to_string()))
        }
    }

    struct Disabled(TestActor);

    impl TestAction for Disabled {
        fn name(&self) -> &str {
            "disabled"
        }

        fn actor(&self) -> Option<&TestActor> {
            Some(&self.0)
        }

        fn do_execute(&self, _context: &mut TestContext) -> Result<()> {
            panic!("disabled action must not run");
        }
    }

    #[test]
    fn test_failure_is_wrapped_once() {
        let mut context = TestContext::new();
        let err = Failing.execute(&mut context).unwrap_err();
        assert_eq!(err.wrap_depth(), 1);
        assert_eq!(err.failed_action(), Some("failing"));
        assert!(matches!(err.root_cause(), CourierError::Validation(_)));
    }

    #[test]
    fn test_disabled_actor_skips() {
        let mut context = TestContext::new();
        let action = Disabled(TestActor::disabled("client"));
        assert_eq!(action.execute(&mut context).unwrap(), ActionState::Skipped);
        assert_eq!(action.execute(&mut context).unwrap(), ActionState::Skipped);
    }
}
