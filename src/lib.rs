//! # Courier: Message-Based Integration Test Orchestration
//!
//! Courier runs test cases made of ordered actions (send, receive, control
//! containers) against messaging endpoints. Message content is built from
//! templates resolved against a per-case runtime context holding variables,
//! functions and validation matchers.
//!
//! ## Features
//!
//! - **Runtime context**: `${name}` variable substitution and `prefix:function(args)` calls
//! - **Message builders**: payload templates, static messages and scripted markup generation
//! - **Data dictionaries**: explicit or global, direction-aware message translation
//! - **Actions and containers**: actor-based skipping, abort on first failure, single wrapping per level
//! - **YAML test cases**: declarative endpoints, dictionaries and action trees
//!
//! ## Example: Test Case
//!
//! ```yaml
//! name: greeting
//! variables:
//!   user: courier
//! endpoints:
//!   - name: orders
//! actions:
//!   - action: send
//!     endpoint: orders
//!     message:
//!       payload: "<Hello>${user}</Hello>"
//!       headers:
//!         operation: greet
//!   - action: receive
//!     endpoint: orders
//!     message:
//!       payload: "<Hello>${user}</Hello>"
//!     extract:
//!       headers:
//!         operation: op
//! ```
//!
//! ## Example: DSL
//!
//! ```
//! use std::sync::Arc;
//! use courier::actions::send;
//! use courier::endpoint::ChannelEndpoint;
//! use courier::runtime::TestContext;
//! use courier::test_case::TestCase;
//!
//! let endpoint = Arc::new(ChannelEndpoint::new("orders"));
//! let mut test_case = TestCase::new("order-created")
//!     .variable("id", "${courier:randomNumber(6)}")
//!     .action(send(endpoint.clone()).payload("<Order>${id}</Order>").build().unwrap());
//!
//! let mut context = TestContext::new();
//! test_case.run(&mut context).unwrap();
//! assert_eq!(endpoint.pending(), 1);
//! ```

// Core modules
pub mod error;
pub mod actor;
pub mod config;
pub mod extraction;
pub mod reference;
pub mod resource;

// Runtime context, template resolution and YAML loading
pub mod runtime;
pub mod functions;
pub mod validation;

// Messages, dictionaries and endpoints
pub mod message;
pub mod dictionary;
pub mod endpoint;
pub mod extractors;

// Execution model
pub mod actions;
pub mod container;
pub mod test_case;

// Re-export key types
pub use error::{CourierError, DecodeError, Result};
pub use actor::TestActor;
pub use config::CourierConfig;
pub use extraction::{Extractor, FieldPath};
pub use reference::{Reference, ReferenceResolver, ReferenceResolverExt, SimpleReferenceResolver};

// Re-export runtime types
pub use runtime::{LoadedTestCase, TestCaseDefinition, TestContext, TestContextFactory};
pub use functions::{Function, FunctionLibrary, FunctionRegistry};
pub use validation::{ValidationMatcher, ValidationMatcherLibrary, ValidationMatcherRegistry};

// Re-export message types
pub use message::{Message, MessageBuilder, MessageDirection, MessageProcessor, MessageType, Payload};
pub use dictionary::{DataDictionary, JsonPathMappingDictionary, SimpleMappingDictionary};
pub use endpoint::{ChannelEndpoint, Consumer, Endpoint, Producer};

// Re-export execution types
pub use actions::{receive, send, ActionState, TestAction};
pub use container::{Conditional, Sequence, SuiteContainer};
pub use test_case::{TestCase, TestCaseRunner, TestResult};
