//! Fixture documents and ready-made scenarios.

use shape_kernel::primitives::{make_box, make_sphere, step_document, step_document_with_voids};
use shape_kernel::{MockKernel, MockShape};
use viewer_bridge::catalog::model_path;
use viewer_bridge::{
    BridgeConfig, MemorySource, PipelineContext, PipelineController, PipelineOutcome,
};

use crate::assertions::HarnessError;
use crate::recorder::RecordingPresenter;

/// STEP text for an axis-aligned box.
pub fn box_step(origin: [f64; 3], size: [f64; 3]) -> String {
    step_document(&make_box(origin, size))
}

/// STEP text for a sphere.
pub fn sphere_step(center: [f64; 3], radius: f64) -> Result<String, HarnessError> {
    let solid = make_sphere(center, radius).map_err(|e| HarnessError::Fixture {
        detail: e.to_string(),
    })?;
    Ok(step_document(&solid))
}

/// STEP text for a box with a box-shaped cavity.
pub fn hollow_box_step(
    origin: [f64; 3],
    size: [f64; 3],
    cavity_origin: [f64; 3],
    cavity_size: [f64; 3],
) -> Result<String, HarnessError> {
    step_document_with_voids(
        &make_box(origin, size),
        &[make_box(cavity_origin, cavity_size)],
    )
    .map_err(|e| HarnessError::Fixture {
        detail: e.to_string(),
    })
}

/// A mock kernel and an in-memory source wired to the default catalog.
///
/// Documents are keyed by their bundled model number, so `model(1, ..)`
/// is what selector 1 and the first half of selector 12 load.
pub struct Scenario {
    pub kernel: MockKernel,
    pub source: MemorySource,
    pub config: BridgeConfig,
}

impl Scenario {
    pub fn new() -> Self {
        Self {
            kernel: MockKernel::new(),
            source: MemorySource::new(),
            config: BridgeConfig::default(),
        }
    }

    /// Bundle model `n` as a document made of `pieces`.
    pub fn model(mut self, n: u32, pieces: Vec<MockShape>) -> Self {
        let bytes = format!("mock-model-{}", n).into_bytes();
        self.kernel.register_document(bytes.clone(), pieces);
        self.source.insert(model_path(n), bytes);
        self
    }

    /// Bundle model `n` as bytes no reader accepts.
    pub fn corrupt_model(mut self, n: u32) -> Self {
        self.source.insert(model_path(n), b"not an exchange document".to_vec());
        self
    }

    pub fn with_config(mut self, config: BridgeConfig) -> Self {
        self.config = config;
        self
    }

    /// Model 1 is a unit ball at the origin.
    pub fn unit_sphere() -> Self {
        Self::new().model(1, vec![MockShape::ball([0.0; 3], 1.0)])
    }

    /// Models 1 and 2 are unit cubes side by side along +x, touching.
    pub fn two_cubes() -> Self {
        Self::new()
            .model(1, vec![MockShape::block([0.0; 3], [1.0; 3])])
            .model(2, vec![MockShape::block([1.0, 0.0, 0.0], [1.0; 3])])
    }

    /// Run one selector through a fresh controller.
    pub fn run(&mut self, selector: u32) -> (PipelineOutcome, RecordingPresenter) {
        let mut presenter = RecordingPresenter::default();
        let mut controller = PipelineController::new(&self.config);
        let outcome = {
            let mut ctx = PipelineContext {
                kernel: &mut self.kernel,
                source: &self.source,
                presenter: &mut presenter,
            };
            controller.run(&mut ctx, selector)
        };
        (outcome, presenter)
    }
}

impl Default for Scenario {
    fn default() -> Self {
        Self::new()
    }
}
