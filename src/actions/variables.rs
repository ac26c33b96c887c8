use indexmap::IndexMap;

use crate::actions::TestAction;
use crate::error::Result;
use crate::runtime::TestContext;

/// Declares variables in order; each value may reference earlier ones.
#[derive(Debug, Clone, Default)]
pub struct CreateVariablesAction {
    variables: IndexMap<String, String>,
}

impl CreateVariablesAction {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn variable(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.variables.insert(name.into(), value.into());
        self
    }

    pub fn with_variables(variables: IndexMap<String, String>) -> Self {
        Self { variables }
    }
}

impl TestAction for CreateVariablesAction {
    fn name(&self) -> &str {
        "create-variables"
    }

    fn do_execute(&self, context: &mut TestContext) -> Result<()> {
        for (name, template) in &self.variables {
            let value = context.resolve(template)?;
            tracing::debug!("Setting variable '{}' to '{}'", name, value);
            context.set_variable(name.clone(), value);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variables_reference_earlier_ones() {
        let mut context = TestContext::new();
        CreateVariablesAction::new()
            .variable("first", "Hello")
            .variable("greeting", "${first} World")
            .variable("upper", "${courier:upperCase(${greeting})}")
            .execute(&mut context)
            .unwrap();

        assert_eq!(context.get_variable_string("greeting").unwrap(), "Hello World");
        assert_eq!(context.get_variable_string("upper").unwrap(), "HELLO WORLD");
    }
}
