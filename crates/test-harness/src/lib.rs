//! Test harness for the model pipeline.
//!
//! Provides fixtures, a recording presenter and verification tools for
//! driving whole requests through the pipeline and checking the results.
//!
//! # Key Components
//!
//! - [`fixtures`]: real STEP documents from truck primitives, and mock scenarios
//! - [`recorder`]: a presenter that keeps every update for inspection
//! - [`oracle`]: verification functions returning pass/fail verdicts
//! - [`assertions`]: tolerance assertions with diagnostic output

pub mod assertions;
pub mod fixtures;
pub mod oracle;
pub mod recorder;

pub use assertions::HarnessError;
pub use fixtures::Scenario;
pub use oracle::OracleVerdict;
pub use recorder::RecordingPresenter;

/// Install a `tracing` subscriber for tests. Honours `RUST_LOG`.
/// Safe to call from every test; only the first call installs.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}
