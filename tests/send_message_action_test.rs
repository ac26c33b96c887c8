//! Integration tests for the send action pipeline

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use courier::actions::{send, ActionState, TestAction};
use courier::actor::TestActor;
use courier::dictionary::{DataDictionary, SimpleMappingDictionary};
use courier::endpoint::{ChannelEndpoint, Consumer, Endpoint, Producer};
use courier::error::{CourierError, Result};
use courier::extractors::{JsonPathVariableExtractor, MessageHeaderVariableExtractor};
use courier::message::{Message, MessageDirection, MessageType, MESSAGE_ID_HEADER};
use courier::resource::InMemoryResourceLoader;
use courier::runtime::TestContext;
use courier::test_case::{TestCase, TestResult};

/// Endpoint counting producer calls without storing messages.
struct CountingEndpoint {
    actor: Option<TestActor>,
    sent: Arc<AtomicUsize>,
}

struct CountingProducer(Arc<AtomicUsize>);

impl Producer for CountingProducer {
    fn send(&self, _message: &Message, _context: &TestContext) -> Result<()> {
        self.0.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl Endpoint for CountingEndpoint {
    fn name(&self) -> &str {
        "counting"
    }

    fn actor(&self) -> Option<&TestActor> {
        self.actor.as_ref()
    }

    fn create_producer(&self) -> Result<Arc<dyn Producer>> {
        Ok(Arc::new(CountingProducer(self.sent.clone())))
    }

    fn create_consumer(&self) -> Result<Arc<dyn Consumer>> {
        Err(CourierError::Endpoint {
            endpoint: "counting".to_string(),
            reason: "send only".to_string(),
        })
    }
}

#[test]
fn test_payload_variables_are_resolved() {
    let endpoint = Arc::new(ChannelEndpoint::new("out"));
    let mut context = TestContext::new();
    context.set_variable("myText", "Hello World!");

    let state = send(endpoint.clone())
        .payload("<TestRequest><Message>${myText}</Message></TestRequest>")
        .header("operation", "sayHello")
        .build()
        .unwrap()
        .execute(&mut context)
        .unwrap();

    assert_eq!(state, ActionState::Done);
    let sent = endpoint.drain();
    assert_eq!(sent.len(), 1);
    assert_eq!(
        sent[0].payload_text(),
        "<TestRequest><Message>Hello World!</Message></TestRequest>"
    );
    assert_eq!(sent[0].header("operation"), Some(serde_json::json!("sayHello")));
}

#[test]
fn test_unknown_payload_variable_fails_without_sending() {
    let endpoint = Arc::new(ChannelEndpoint::new("out"));
    let mut context = TestContext::new();

    let err = send(endpoint.clone())
        .payload("<TestRequest><Message>${myText}</Message></TestRequest>")
        .build()
        .unwrap()
        .execute(&mut context)
        .unwrap_err();

    assert_eq!(err.failed_action(), Some("send"));
    assert_eq!(err.root_cause().to_string(), "Unknown variable 'myText'");
    assert_eq!(endpoint.pending(), 0);
}

#[test]
fn test_unknown_header_variable_fails() {
    let endpoint = Arc::new(ChannelEndpoint::new("out"));
    let mut context = TestContext::new();

    let err = send(endpoint.clone())
        .payload("<Hello/>")
        .header("operation", "${op}")
        .build()
        .unwrap()
        .execute(&mut context)
        .unwrap_err();

    assert!(matches!(err.root_cause(), CourierError::UnknownVariable(name) if name == "op"));
    assert_eq!(endpoint.pending(), 0);
}

#[test]
fn test_explicit_dictionary_translates_payload() {
    let endpoint = Arc::new(ChannelEndpoint::new("out"));
    let mut context = TestContext::new();
    context.set_variable("greeting", "Hello");

    let dictionary: Arc<dyn DataDictionary> =
        Arc::new(SimpleMappingDictionary::new("greetings").with_mapping("?", "${greeting}"));

    send(endpoint.clone())
        .payload("<Message>? Citrus!</Message>")
        .dictionary(dictionary)
        .build()
        .unwrap()
        .execute(&mut context)
        .unwrap();

    assert_eq!(endpoint.drain()[0].payload_text(), "<Message>Hello Citrus!</Message>");
}

#[test]
fn test_explicit_dictionary_runs_before_global_ones() {
    let endpoint = Arc::new(ChannelEndpoint::new("out"));
    let mut context = TestContext::new();
    context
        .message_processors_mut()
        .add(Arc::new(SimpleMappingDictionary::new("global").global().with_mapping("B", "C")));

    let explicit: Arc<dyn DataDictionary> =
        Arc::new(SimpleMappingDictionary::new("explicit").with_mapping("A", "B"));

    send(endpoint.clone())
        .payload("A")
        .dictionary(explicit)
        .build()
        .unwrap()
        .execute(&mut context)
        .unwrap();

    assert_eq!(endpoint.drain()[0].payload_text(), "C");
}

#[test]
fn test_inbound_dictionary_ignores_outbound_messages() {
    let endpoint = Arc::new(ChannelEndpoint::new("out"));
    let mut context = TestContext::new();
    context.message_processors_mut().add(Arc::new(
        SimpleMappingDictionary::new("inbound-only")
            .global()
            .with_direction(MessageDirection::Inbound)
            .with_mapping("Hello", "Bye"),
    ));

    send(endpoint.clone())
        .payload("Hello")
        .build()
        .unwrap()
        .execute(&mut context)
        .unwrap();

    assert_eq!(endpoint.drain()[0].payload_text(), "Hello");
}

#[test]
fn test_explicit_scope_dictionary_in_chain_is_not_global() {
    let endpoint = Arc::new(ChannelEndpoint::new("out"));
    let mut context = TestContext::new();
    context
        .message_processors_mut()
        .add(Arc::new(SimpleMappingDictionary::new("local").with_mapping("Hello", "Bye")));

    send(endpoint.clone())
        .payload("Hello")
        .build()
        .unwrap()
        .execute(&mut context)
        .unwrap();

    assert_eq!(endpoint.drain()[0].payload_text(), "Hello");
}

#[test]
fn test_disabled_actor_skips_producer() {
    let sent = Arc::new(AtomicUsize::new(0));
    let endpoint = Arc::new(CountingEndpoint {
        actor: None,
        sent: sent.clone(),
    });

    let mut test_case = TestCase::new("disabled-actor").action(
        send(endpoint)
            .actor(TestActor::disabled("client"))
            .payload("${neverResolved}")
            .build()
            .unwrap(),
    );

    let mut context = TestContext::new();
    test_case.run(&mut context).unwrap();

    assert_eq!(sent.load(Ordering::SeqCst), 0);
    assert_eq!(test_case.result(), &TestResult::Success);
    assert_eq!(test_case.states(), &[ActionState::Skipped]);
}

#[test]
fn test_endpoint_actor_is_inherited() {
    let sent = Arc::new(AtomicUsize::new(0));
    let endpoint = Arc::new(CountingEndpoint {
        actor: Some(TestActor::disabled("server")),
        sent: sent.clone(),
    });
    let mut context = TestContext::new();

    let inherited = send(endpoint.clone()).payload("<Hello/>").build().unwrap();
    assert_eq!(inherited.execute(&mut context).unwrap(), ActionState::Skipped);
    assert_eq!(sent.load(Ordering::SeqCst), 0);

    let own_actor = send(endpoint)
        .actor(TestActor::new("client"))
        .payload("<Hello/>")
        .build()
        .unwrap();
    assert_eq!(own_actor.execute(&mut context).unwrap(), ActionState::Done);
    assert_eq!(sent.load(Ordering::SeqCst), 1);
}

#[test]
fn test_static_message_is_sent_with_fresh_id() {
    let endpoint = Arc::new(ChannelEndpoint::new("out"));
    let mut context = TestContext::new();
    let original = Message::new("<TestRequest><Message>Hello World!</Message></TestRequest>")
        .with_header("operation", "sayHello");

    send(endpoint.clone())
        .message(original.clone())
        .build()
        .unwrap()
        .execute(&mut context)
        .unwrap();

    let sent = endpoint.drain();
    assert_ne!(sent[0].id, original.id);
    assert_eq!(sent[0].payload_text(), original.payload_text());
    assert_eq!(sent[0].header("operation"), original.header("operation"));
}

#[test]
fn test_resource_with_unsupported_charset_fails() {
    let endpoint = Arc::new(ChannelEndpoint::new("out"));
    let mut context = TestContext::new();
    context.set_resource_loader(Arc::new(
        InMemoryResourceLoader::new().with_text("hello.xml", "<Hello/>"),
    ));

    let err = send(endpoint.clone())
        .payload_resource_with_charset("hello.xml", "X-UNKNOWN")
        .build()
        .unwrap()
        .execute(&mut context)
        .unwrap_err();

    assert!(matches!(
        err.root_cause(),
        CourierError::Encoding { charset, .. } if charset == "X-UNKNOWN"
    ));
    assert_eq!(endpoint.pending(), 0);
}

#[test]
fn test_resource_payload_is_resolved() {
    let endpoint = Arc::new(ChannelEndpoint::new("out"));
    let mut context = TestContext::new();
    context.set_variable("name", "courier");
    context.set_resource_loader(Arc::new(
        InMemoryResourceLoader::new().with_text("hello.xml", "<Hello>${name}</Hello>"),
    ));

    send(endpoint.clone())
        .payload_resource("hello.xml")
        .build()
        .unwrap()
        .execute(&mut context)
        .unwrap();

    assert_eq!(endpoint.drain()[0].payload_text(), "<Hello>courier</Hello>");
}

#[test]
fn test_global_processors_run_on_outbound_messages() {
    let endpoint = Arc::new(ChannelEndpoint::new("out"));
    let mut context = TestContext::new();
    context.message_processors_mut().push(
        |message: &mut Message, _context: &mut TestContext| -> Result<()> {
            message.set_header("stamped", true);
            Ok(())
        },
    );

    send(endpoint.clone())
        .payload("<Hello/>")
        .build()
        .unwrap()
        .execute(&mut context)
        .unwrap();

    assert_eq!(endpoint.drain()[0].header("stamped"), Some(serde_json::json!(true)));
}

#[test]
fn test_extractor_writes_message_id() {
    let endpoint = Arc::new(ChannelEndpoint::new("out"));
    let mut context = TestContext::new();

    send(endpoint.clone())
        .payload("<Hello/>")
        .process(MessageHeaderVariableExtractor::new().with_mapping(MESSAGE_ID_HEADER, "sentId"))
        .build()
        .unwrap()
        .execute(&mut context)
        .unwrap();

    let sent = endpoint.drain();
    assert_eq!(context.get_variable_string("sentId").unwrap(), sent[0].id.to_string());
}

#[test]
fn test_ascii_resource_declaring_utf16_is_sent() {
    let endpoint = Arc::new(ChannelEndpoint::new("out"));
    let mut context = TestContext::new();
    context.set_variable("text", "Hello World!");
    context.set_resource_loader(Arc::new(InMemoryResourceLoader::new().with_text(
        "req.xml",
        r#"<?xml version="1.0" encoding="UTF-16"?><TestRequest><Message>${text}</Message></TestRequest>"#,
    )));

    send(endpoint.clone())
        .payload_resource("req.xml")
        .build()
        .unwrap()
        .execute(&mut context)
        .unwrap();

    assert_eq!(
        endpoint.drain()[0].payload_text(),
        r#"<?xml version="1.0" encoding="UTF-16"?><TestRequest><Message>Hello World!</Message></TestRequest>"#
    );
}

#[test]
fn test_static_message_keeps_header_data_and_name() {
    let endpoint = Arc::new(ChannelEndpoint::new("out"));
    let mut context = TestContext::new();

    send(endpoint.clone())
        .message(Message::new("<a/>"))
        .header_data("<Extra/>")
        .message_name("m1")
        .build()
        .unwrap()
        .execute(&mut context)
        .unwrap();

    let sent = endpoint.drain();
    assert_eq!(sent[0].header_data, vec!["<Extra/>".to_string()]);
    assert_eq!(sent[0].name.as_deref(), Some("m1"));
    assert!(context.message_store().get("m1").is_some());
}

#[test]
fn test_conflicting_message_inputs_are_rejected() {
    let endpoint = Arc::new(ChannelEndpoint::new("out"));

    let script_and_payload = send(endpoint.clone())
        .script("markup.hello()")
        .payload("<Hello/>")
        .build();
    assert!(matches!(script_and_payload, Err(CourierError::Config(_))));

    let static_and_payload = send(endpoint)
        .message(Message::new("<a/>"))
        .payload("<b/>")
        .build();
    assert!(matches!(static_and_payload, Err(CourierError::Config(_))));
}

#[test]
fn test_call_syntax_without_placeholder_is_sent_verbatim() {
    let endpoint = Arc::new(ChannelEndpoint::new("out"));
    let mut context = TestContext::new();

    send(endpoint.clone())
        .payload("courier:upperCase('no placeholders here')")
        .build()
        .unwrap()
        .execute(&mut context)
        .unwrap();

    assert_eq!(
        endpoint.drain()[0].payload_text(),
        "courier:upperCase('no placeholders here')"
    );
}

#[test]
fn test_extractor_sees_translated_payload() {
    let endpoint = Arc::new(ChannelEndpoint::new("out"));
    let mut context = TestContext::new();
    let dictionary: Arc<dyn DataDictionary> =
        Arc::new(SimpleMappingDictionary::new("greetings").with_mapping("?", "Hello"));

    send(endpoint.clone())
        .payload(r#"{"greeting": "? Citrus!"}"#)
        .message_type(MessageType::Json)
        .dictionary(dictionary)
        .process(JsonPathVariableExtractor::new().with_mapping("$.greeting", "sentGreeting"))
        .build()
        .unwrap()
        .execute(&mut context)
        .unwrap();

    assert_eq!(context.get_variable_string("sentGreeting").unwrap(), "Hello Citrus!");
    assert!(endpoint.drain()[0].payload_text().contains("Hello Citrus!"));
}
