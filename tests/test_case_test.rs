//! Integration tests for test case execution, containers and receive validation

use std::sync::Arc;
use std::time::Duration;

use courier::actions::{receive, send, ActionState, CreateVariablesAction, EchoAction, FailAction, TestAction};
use courier::container::{Conditional, Sequence, SuiteContainer};
use courier::endpoint::ChannelEndpoint;
use courier::error::CourierError;
use courier::extractors::JsonPathVariableExtractor;
use courier::message::MessageType;
use courier::runtime::{TestContext, TestContextFactory};
use courier::test_case::{TestCase, TestCaseRunner, TestResult};

fn channel(name: &str) -> Arc<ChannelEndpoint> {
    Arc::new(ChannelEndpoint::new(name).with_timeout(Duration::from_millis(100)))
}

#[test]
fn test_send_then_receive_json() {
    let endpoint = channel("orders");
    let mut test_case = TestCase::new("json-round-trip")
        .variable("orderId", "${courier:randomNumber(5)}")
        .action(
            send(endpoint.clone())
                .payload(r#"{"order": {"id": ${orderId}, "item": "book", "tags": ["a", "b"]}}"#)
                .message_type(MessageType::Json)
                .header("operation", "create")
                .build()
                .unwrap(),
        )
        .action(
            receive(endpoint.clone())
                .payload(r#"{"order": {"id": "@isNumber()@", "item": "book", "tags": ["a", "@ignore@"]}}"#)
                .message_type(MessageType::Json)
                .header("operation", "@equalsIgnoreCase('CREATE')@")
                .process(JsonPathVariableExtractor::new().with_mapping("$.order.id", "receivedId"))
                .build()
                .unwrap(),
        );

    let mut context = TestContext::new();
    test_case.run(&mut context).unwrap();

    assert!(test_case.result().is_success());
    assert_eq!(
        context.get_variable_string("receivedId").unwrap(),
        context.get_variable_string("orderId").unwrap()
    );
    assert!(context.message_store().get("receive(orders)").is_some());
}

#[test]
fn test_receive_rejects_unexpected_json_field() {
    let endpoint = channel("orders");
    let mut test_case = TestCase::new("strict-json")
        .action(
            send(endpoint.clone())
                .payload(r#"{"id": 1, "extra": true}"#)
                .build()
                .unwrap(),
        )
        .action(
            receive(endpoint)
                .name("receive-order")
                .payload(r#"{"id": 1}"#)
                .message_type(MessageType::Json)
                .build()
                .unwrap(),
        );

    let mut context = TestContext::new();
    assert!(test_case.run(&mut context).is_err());

    match test_case.result() {
        TestResult::Failed { action, cause } => {
            assert_eq!(action.as_deref(), Some("receive-order"));
            assert!(cause.contains("extra"));
        }
        other => panic!("unexpected result {other:?}"),
    }
}

#[test]
fn test_receive_timeout_fails_the_action() {
    let endpoint = channel("silent");
    let action = receive(endpoint)
        .timeout(Duration::from_millis(20))
        .build()
        .unwrap();

    let mut context = TestContext::new();
    let err = action.execute(&mut context).unwrap_err();
    assert!(matches!(err.root_cause(), CourierError::Timeout { .. }));
}

#[test]
fn test_nested_container_failure_reports_innermost_action() {
    let mut test_case = TestCase::new("nested")
        .action(EchoAction::new("start"))
        .action(
            Sequence::new("outer").action(
                Sequence::new("inner")
                    .action(CreateVariablesAction::new().variable("reached", "inner"))
                    .action(FailAction::new("inner failure for ${reached}"))
                    .action(CreateVariablesAction::new().variable("after", "never")),
            ),
        )
        .action(CreateVariablesAction::new().variable("top", "never"));

    let mut context = TestContext::new();
    let err = test_case.run(&mut context).unwrap_err();

    assert_eq!(err.wrap_depth(), 3);
    assert_eq!(
        test_case.result(),
        &TestResult::Failed {
            action: Some("fail".to_string()),
            cause: "Validation failed: inner failure for inner".to_string(),
        }
    );
    assert_eq!(test_case.states(), &[ActionState::Done, ActionState::Failed]);
    assert!(context.get_variable("after").is_err());
    assert!(context.get_variable("top").is_err());
}

#[test]
fn test_conditional_runs_only_when_true() {
    let mut test_case = TestCase::new("conditional")
        .variable("retries", "3")
        .action(
            Conditional::new("${retries} >= 3")
                .action(CreateVariablesAction::new().variable("exhausted", "true")),
        )
        .action(Conditional::new("${retries} < 3").action(FailAction::new("not reached")));

    let mut context = TestContext::new();
    test_case.run(&mut context).unwrap();
    assert_eq!(context.get_variable_string("exhausted").unwrap(), "true");
}

#[test]
fn test_suite_containers_share_factory_setup() {
    let factory = TestContextFactory::new();
    let mut suite_context = factory.create_context();

    SuiteContainer::before("prepare")
        .action(EchoAction::new("preparing"))
        .run(&mut suite_context)
        .unwrap();

    let err = SuiteContainer::after("cleanup")
        .action(FailAction::new("cleanup failed"))
        .run(&mut suite_context)
        .unwrap_err();
    assert!(matches!(&err, CourierError::Execution { action, .. } if action == "cleanup"));
    assert_eq!(err.failed_action(), Some("fail"));
}

#[test]
fn test_runner_executes_immediately() {
    let endpoint = channel("dsl");
    let mut runner = TestCaseRunner::start(
        TestCase::new("dsl").variable("user", "courier"),
        TestContext::new(),
    )
    .unwrap();

    runner
        .run(send(endpoint.clone()).payload("Hi ${user}").build().unwrap())
        .unwrap();
    assert_eq!(endpoint.pending(), 1);

    runner
        .run(receive(endpoint.clone()).payload("Hi courier").message_type(MessageType::Plaintext).build().unwrap())
        .unwrap();
    assert_eq!(endpoint.pending(), 0);

    let (test_case, context) = runner.finish();
    assert_eq!(test_case.result(), &TestResult::Success);
    assert_eq!(context.message_store().len(), 2);
}
