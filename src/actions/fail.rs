use crate::actions::TestAction;
use crate::error::{CourierError, Result};
use crate::runtime::TestContext;

/// Always fails with a resolved message.
#[derive(Debug, Clone)]
pub struct FailAction {
    message: String,
}

impl FailAction {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl TestAction for FailAction {
    fn name(&self) -> &str {
        "fail"
    }

    fn do_execute(&self, context: &mut TestContext) -> Result<()> {
        Err(CourierError::Validation(context.resolve(&self.message)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fail_action() {
        let mut context = TestContext::new();
        context.set_variable("reason", "not ready");
        let err = FailAction::new("Stopped: ${reason}").execute(&mut context).unwrap_err();
        assert_eq!(err.failed_action(), Some("fail"));
        assert_eq!(err.root_cause().to_string(), "Validation failed: Stopped: not ready");
    }
}
