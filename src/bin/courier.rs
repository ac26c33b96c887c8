//! courier CLI - run and validate YAML test cases
//!
//! Loads a test case definition, wires its endpoints and dictionaries and
//! executes its actions in order.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process;

use courier::{CourierConfig, LoadedTestCase, TestCaseDefinition, TestResult};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "courier")]
#[command(version, about = "Message-based integration test runner", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a test case
    Run {
        /// Path to the test case YAML file
        #[arg(short, long)]
        case: PathBuf,

        /// Override a declared variable (repeatable)
        #[arg(short, long = "var", value_name = "NAME=VALUE", value_parser = parse_variable)]
        var: Vec<(String, String)>,
    },

    /// Load a test case and check its references without running it
    Validate {
        /// Path to the test case YAML file
        #[arg(short, long)]
        case: PathBuf,
    },
}

fn parse_variable(raw: &str) -> Result<(String, String), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got '{}'", raw))?;
    if name.trim().is_empty() {
        return Err(format!("variable name missing in '{}'", raw));
    }
    Ok((name.trim().to_string(), value.to_string()))
}

fn main() {
    let cli = Cli::parse();

    let config = match CourierConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_new(&config.log_filter).unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let result = match cli.command {
        Commands::Run { case, var } => run_case(&case, var, config),
        Commands::Validate { case } => validate_case(&case, config),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

/// Resources referenced by a case resolve next to the case file unless a
/// resource directory is configured.
fn load_case(path: &Path, mut config: CourierConfig) -> Result<LoadedTestCase, String> {
    if config.resource_dir.is_none() {
        config.resource_dir = path.parent().map(Path::to_path_buf);
    }

    let definition = TestCaseDefinition::load_from_file(path)
        .map_err(|e| format!("Failed to load {}: {}", path.display(), e))?;

    definition
        .into_test_case(&config)
        .map_err(|e| format!("Invalid test case {}: {}", path.display(), e))
}

fn run_case(path: &Path, overrides: Vec<(String, String)>, config: CourierConfig) -> Result<(), String> {
    println!("▶ Running {}...", path.display());

    let mut loaded = load_case(path, config)?;
    for (name, value) in overrides {
        println!("  ℹ Variable override: {}={}", name, value);
        loaded.set_variable(name, value);
    }

    let (context, _outcome) = loaded.run();

    match loaded.test_case.result() {
        TestResult::Success => {
            println!(
                "  ✓ {} SUCCESS ({} actions, {} messages)",
                loaded.name(),
                loaded.test_case.states().len(),
                context.message_store().len()
            );
            Ok(())
        }
        TestResult::Failed { action, cause } => Err(format!(
            "{} FAILED in action '{}': {}",
            loaded.name(),
            action.as_deref().unwrap_or("<variables>"),
            cause
        )),
        TestResult::Pending => Err(format!("{} did not complete", loaded.name())),
    }
}

fn validate_case(path: &Path, config: CourierConfig) -> Result<(), String> {
    println!("🔍 Validating {}...", path.display());

    let loaded = load_case(path, config)?;

    println!("  ✓ Test case '{}'", loaded.name());
    println!("  ✓ {} top-level actions", loaded.test_case.actions().len());
    for name in loaded.endpoints.keys() {
        println!("  ✓ Endpoint '{}'", name);
    }
    Ok(())
}
