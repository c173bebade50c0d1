//! Assertion helpers with diagnostic output.
//!
//! Every failure carries expected vs actual and the context string the
//! caller passed in.

use model_pipeline::{Measurement, MeshRef};
use viewer_bridge::{CombinedMeasurements, PipelineOutcome};

use crate::oracle::{self, OracleVerdict};

/// Errors from harness operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum HarnessError {
    #[error("fixture error: {detail}")]
    Fixture { detail: String },

    #[error("unexpected outcome: {detail}")]
    UnexpectedOutcome { detail: String },

    #[error("assertion failed: {detail}")]
    AssertionFailed { detail: String },
}

/// Assert a value within a relative tolerance.
pub fn assert_close(
    actual: f64,
    expected: f64,
    rel_tol: f64,
    ctx: &str,
) -> Result<(), HarnessError> {
    let verdict = oracle::check_close(ctx, actual, expected, rel_tol);
    if verdict.passed {
        Ok(())
    } else {
        Err(HarnessError::AssertionFailed {
            detail: format!("[{}] {}", ctx, verdict.detail),
        })
    }
}

/// Assert every verdict passed, reporting all failures together.
pub fn assert_all_pass(verdicts: &[OracleVerdict], ctx: &str) -> Result<(), HarnessError> {
    let failures: Vec<String> = verdicts
        .iter()
        .filter(|v| !v.passed)
        .map(|v| format!("{}: {}", v.oracle_name, v.detail))
        .collect();
    if failures.is_empty() {
        Ok(())
    } else {
        Err(HarnessError::AssertionFailed {
            detail: format!("[{}] {}", ctx, failures.join("; ")),
        })
    }
}

/// Unwrap a `Loaded` outcome.
pub fn expect_loaded(outcome: &PipelineOutcome) -> Result<(&Measurement, &MeshRef), HarnessError> {
    match outcome {
        PipelineOutcome::Loaded {
            measurement, mesh, ..
        } => Ok((measurement, mesh)),
        other => Err(HarnessError::UnexpectedOutcome {
            detail: format!("expected Loaded, got {:?}", other),
        }),
    }
}

/// Unwrap a `Combined` outcome.
pub fn expect_combined(
    outcome: &PipelineOutcome,
) -> Result<(&CombinedMeasurements, Option<&MeshRef>, &MeshRef), HarnessError> {
    match outcome {
        PipelineOutcome::Combined {
            measurements,
            preview_mesh,
            final_mesh,
        } => Ok((measurements, preview_mesh.as_ref(), final_mesh)),
        other => Err(HarnessError::UnexpectedOutcome {
            detail: format!("expected Combined, got {:?}", other),
        }),
    }
}
