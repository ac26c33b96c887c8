//! Runtime state of a running test case and YAML test case loading.
//!
//! This module provides the per-case [`TestContext`] with its variable store
//! and template resolution, plus the loader turning YAML definitions into
//! runnable test cases.

pub mod context;
pub mod variables;
pub mod config_loader;

// Re-export key types
pub use context::{TestContext, TestContextFactory};
pub use variables::{split_template, value_to_string, TemplateSegment, VariableStore};
pub use config_loader::{LoadedTestCase, TestCaseDefinition};
