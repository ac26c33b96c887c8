use crate::actions::TestAction;
use crate::error::Result;
use crate::runtime::TestContext;

/// Logs a resolved message.
#[derive(Debug, Clone)]
pub struct EchoAction {
    message: String,
}

impl EchoAction {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl TestAction for EchoAction {
    fn name(&self) -> &str {
        "echo"
    }

    fn do_execute(&self, context: &mut TestContext) -> Result<()> {
        let message = context.resolve(&self.message)?;
        tracing::info!("{}", message);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::ActionState;
    use crate::error::CourierError;

    #[test]
    fn test_echo_resolves_placeholders() {
        let mut context = TestContext::new();
        context.set_variable("name", "courier");
        assert_eq!(
            EchoAction::new("Hello ${name}").execute(&mut context).unwrap(),
            ActionState::Done
        );

        let err = EchoAction::new("${missing}").execute(&mut context).unwrap_err();
        assert!(matches!(err.root_cause(), CourierError::UnknownVariable(_)));
    }
}
