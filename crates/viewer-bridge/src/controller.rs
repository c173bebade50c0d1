//! PipelineController: sequences one request from selector to outcome.

use tracing::{info, instrument, warn};

use model_pipeline::{
    combine, load, measure, preview_separation, stl_data_url, Axis, MeshExporter,
    SeparationPolicy, StlDataUrlExporter,
};
use shape_kernel::tessellation::uv_sphere;
use shape_kernel::{Kernel, SolidHandle};

use crate::catalog::{ModelCatalog, ModelRequest};
use crate::config::BridgeConfig;
use crate::messages::*;
use crate::source::ModelSource;

const LOADING_STATUS: &str = "Model: Loading...";

/// Latitude bands of the startup placeholder sphere.
const PLACEHOLDER_STACKS: u32 = 16;
/// Longitude segments of the startup placeholder sphere.
const PLACEHOLDER_SLICES: u32 = 32;

/// Per-request collaborators. The kernel is passed in for each request
/// and never held by the controller.
pub struct PipelineContext<'a> {
    pub kernel: &'a mut dyn Kernel,
    pub source: &'a dyn ModelSource,
    pub presenter: &'a mut dyn Presenter,
}

/// Drives the load / measure / combine / render sequence.
pub struct PipelineController {
    state: ControllerState,
    catalog: ModelCatalog,
    exporter: Box<dyn MeshExporter + Send>,
    separation: SeparationPolicy,
    axis: Axis,
}

impl PipelineController {
    pub fn new(config: &BridgeConfig) -> Self {
        Self {
            state: ControllerState::Idle,
            catalog: config.catalog(),
            exporter: Box::new(StlDataUrlExporter::new(config.tessellation_tolerance)),
            separation: config.separation,
            axis: config.separation_axis,
        }
    }

    pub fn with_exporter(mut self, exporter: Box<dyn MeshExporter + Send>) -> Self {
        self.exporter = exporter;
        self
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    pub fn catalog(&self) -> &ModelCatalog {
        &self.catalog
    }

    /// Run one request to completion. Always publishes exactly one
    /// `Outcome` and returns the controller to `Idle`.
    #[instrument(skip(self, ctx))]
    pub fn run(&mut self, ctx: &mut PipelineContext<'_>, selector: u32) -> PipelineOutcome {
        let result = match self.catalog.lookup(selector).cloned() {
            Some(ModelRequest::Single { source }) => self.run_single(ctx, &source),
            Some(ModelRequest::Union { first, second }) => self.run_union(ctx, &first, &second),
            None => Err(FailureReason::UnknownSelector { selector }),
        };

        let outcome = match result {
            Ok(outcome) => outcome,
            Err(reason) => {
                warn!(%reason, "request failed");
                self.transition(ctx.presenter, ControllerState::Failed);
                ctx.presenter.publish(PresentationUpdate::Status {
                    slot: DisplaySlot::Primary,
                    message: reason.to_string(),
                });
                PipelineOutcome::Failed { reason }
            }
        };

        ctx.presenter.publish(PresentationUpdate::Outcome {
            outcome: outcome.clone(),
        });
        self.transition(ctx.presenter, ControllerState::Idle);
        outcome
    }

    /// Show the unit-sphere placeholder in both viewports.
    ///
    /// Needs no kernel or source. Publishes one `Ready` outcome and leaves
    /// the controller `Idle`.
    #[instrument(skip_all)]
    pub fn initialize(&mut self, presenter: &mut dyn Presenter) -> PipelineOutcome {
        let mesh = stl_data_url(&uv_sphere(
            [0.0; 3],
            1.0,
            PLACEHOLDER_STACKS,
            PLACEHOLDER_SLICES,
        ));
        for slot in [DisplaySlot::Primary, DisplaySlot::Secondary] {
            presenter.publish(PresentationUpdate::Slot {
                slot,
                content: SlotContent {
                    mesh: Some(mesh.clone()),
                    summaries: Vec::new(),
                },
            });
        }
        info!(triangles = mesh.triangle_count, "placeholder shown");

        let outcome = PipelineOutcome::Ready { mesh };
        presenter.publish(PresentationUpdate::Outcome {
            outcome: outcome.clone(),
        });
        self.transition(presenter, ControllerState::Idle);
        outcome
    }

    fn transition(&mut self, presenter: &mut dyn Presenter, state: ControllerState) {
        self.state = state;
        presenter.publish(PresentationUpdate::StateChanged { state });
    }

    /// Enter a loading state and announce it on the given slots.
    fn enter_loading(
        &mut self,
        presenter: &mut dyn Presenter,
        state: ControllerState,
        slots: &[DisplaySlot],
    ) {
        self.transition(presenter, state);
        for &slot in slots {
            presenter.publish(PresentationUpdate::Status {
                slot,
                message: LOADING_STATUS.to_string(),
            });
        }
    }

    fn run_single(
        &mut self,
        ctx: &mut PipelineContext<'_>,
        source: &str,
    ) -> Result<PipelineOutcome, FailureReason> {
        self.enter_loading(ctx.presenter, ControllerState::Loading, &[DisplaySlot::Primary]);
        let solid = fetch_and_load(ctx, source)?;

        self.transition(ctx.presenter, ControllerState::Measuring);
        let measurement = measure(ctx.kernel, &solid);

        self.transition(ctx.presenter, ControllerState::Rendering);
        let mesh = self.export(ctx.kernel, solid)?;

        ctx.presenter.publish(PresentationUpdate::Slot {
            slot: DisplaySlot::Primary,
            content: SlotContent {
                mesh: Some(mesh.clone()),
                summaries: vec![MeasurementSummary::new(source, &measurement)],
            },
        });
        info!(source, volume = measurement.volume, "model loaded");
        Ok(PipelineOutcome::Loaded {
            source: source.to_string(),
            measurement,
            mesh,
        })
    }

    fn run_union(
        &mut self,
        ctx: &mut PipelineContext<'_>,
        first: &str,
        second: &str,
    ) -> Result<PipelineOutcome, FailureReason> {
        self.enter_loading(
            ctx.presenter,
            ControllerState::LoadingFirst,
            &[DisplaySlot::Primary, DisplaySlot::Secondary],
        );
        let a = fetch_and_load(ctx, first)?;

        self.enter_loading(
            ctx.presenter,
            ControllerState::LoadingSecond,
            &[DisplaySlot::Secondary],
        );
        let b = match fetch_and_load(ctx, second) {
            Ok(b) => b,
            Err(reason) => {
                ctx.kernel.release(a);
                return Err(reason);
            }
        };

        self.transition(ctx.presenter, ControllerState::Combining);
        let first_measurement = measure(ctx.kernel, &a);
        let second_measurement = measure(ctx.kernel, &b);
        let separation = preview_separation(ctx.kernel, &self.separation, self.axis, &a, &b);
        let combined =
            combine(ctx.kernel, a, b, &separation).map_err(|e| FailureReason::Combination {
                stage: e.stage(),
                message: e.to_string(),
            })?;

        self.transition(ctx.presenter, ControllerState::Measuring);
        let measurements = CombinedMeasurements {
            first: first_measurement,
            second: second_measurement,
            preview: combined.preview.as_ref().map(|p| p.measurement),
            final_: combined.final_.measurement,
        };
        let union_label = format!("{} + {}", first, second);
        let primary_summaries = vec![
            MeasurementSummary::new(first, &first_measurement),
            MeasurementSummary::new(second, &second_measurement),
        ];
        let secondary_summaries = vec![MeasurementSummary::new(union_label, &measurements.final_)];

        self.transition(ctx.presenter, ControllerState::Rendering);
        let preview_mesh = match combined.preview {
            Some(preview) => match self.export(ctx.kernel, preview.solid) {
                Ok(mesh) => Some(mesh),
                Err(reason) => {
                    warn!(%reason, "preview mesh unavailable");
                    None
                }
            },
            None => None,
        };
        let final_mesh = self.export(ctx.kernel, combined.final_.solid)?;

        ctx.presenter.publish(PresentationUpdate::Slot {
            slot: DisplaySlot::Primary,
            content: SlotContent {
                mesh: preview_mesh.clone(),
                summaries: primary_summaries,
            },
        });
        ctx.presenter.publish(PresentationUpdate::Slot {
            slot: DisplaySlot::Secondary,
            content: SlotContent {
                mesh: Some(final_mesh.clone()),
                summaries: secondary_summaries,
            },
        });
        info!(first, second, volume = measurements.final_.volume, "models combined");
        Ok(PipelineOutcome::Combined {
            preview_mesh,
            final_mesh,
            measurements,
        })
    }

    fn export(
        &self,
        kernel: &mut dyn Kernel,
        solid: SolidHandle,
    ) -> Result<model_pipeline::MeshRef, FailureReason> {
        self.exporter
            .to_displayable(kernel, solid)
            .map_err(|e| FailureReason::Export {
                message: e.to_string(),
            })
    }
}

fn fetch_and_load(ctx: &mut PipelineContext<'_>, identifier: &str) -> Result<SolidHandle, FailureReason> {
    let bytes = ctx
        .source
        .fetch(identifier)
        .map_err(|e| FailureReason::Fetch {
            identifier: identifier.to_string(),
            message: e.to_string(),
        })?;
    load(ctx.kernel, identifier, &bytes).map_err(|e| FailureReason::Load {
        status_code: e.status_code(),
        identifier: e.identifier,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemorySource;
    use shape_kernel::{BuildStatus, MockKernel, MockShape};

    fn setup() -> (MockKernel, MemorySource) {
        let mut kernel = MockKernel::new();
        kernel.register_document(b"cube".to_vec(), vec![MockShape::block([0.0; 3], [1.0; 3])]);
        kernel.register_document(
            b"cube-x1".to_vec(),
            vec![MockShape::block([1.0, 0.0, 0.0], [1.0; 3])],
        );
        let source = MemorySource::new()
            .with("models/model1.STEP", b"cube".to_vec())
            .with("models/model2.STEP", b"cube-x1".to_vec())
            .with("models/model3.STEP", b"garbage".to_vec());
        (kernel, source)
    }

    fn run(kernel: &mut MockKernel, source: &MemorySource, selector: u32) -> (PipelineOutcome, Vec<PresentationUpdate>) {
        let mut updates: Vec<PresentationUpdate> = Vec::new();
        let mut controller = PipelineController::new(&BridgeConfig::default());
        let outcome = {
            let mut ctx = PipelineContext {
                kernel,
                source,
                presenter: &mut updates,
            };
            controller.run(&mut ctx, selector)
        };
        assert_eq!(controller.state(), ControllerState::Idle);
        (outcome, updates)
    }

    fn states(updates: &[PresentationUpdate]) -> Vec<ControllerState> {
        updates
            .iter()
            .filter_map(|u| match u {
                PresentationUpdate::StateChanged { state } => Some(*state),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn initialize_shows_sphere_in_both_slots() {
        let mut updates: Vec<PresentationUpdate> = Vec::new();
        let mut controller = PipelineController::new(&BridgeConfig::default());
        let outcome = controller.initialize(&mut updates);

        let PipelineOutcome::Ready { mesh } = &outcome else {
            panic!("expected a ready outcome");
        };
        assert_eq!(mesh.triangle_count, 32 * (2 * 16 - 2));
        let slots: Vec<DisplaySlot> = updates
            .iter()
            .filter_map(|u| match u {
                PresentationUpdate::Slot { slot, content } => {
                    assert_eq!(content.mesh.as_ref(), Some(mesh));
                    assert!(content.summaries.is_empty());
                    Some(*slot)
                }
                _ => None,
            })
            .collect();
        assert_eq!(slots, vec![DisplaySlot::Primary, DisplaySlot::Secondary]);
        assert_eq!(states(&updates), vec![ControllerState::Idle]);
        assert_eq!(controller.state(), ControllerState::Idle);
    }

    #[test]
    fn single_model_sequence() {
        let (mut kernel, source) = setup();
        let (outcome, updates) = run(&mut kernel, &source, 1);

        assert!(matches!(outcome, PipelineOutcome::Loaded { .. }));
        assert_eq!(
            states(&updates),
            vec![
                ControllerState::Loading,
                ControllerState::Measuring,
                ControllerState::Rendering,
                ControllerState::Idle
            ]
        );
        assert_eq!(
            updates[1],
            PresentationUpdate::Status {
                slot: DisplaySlot::Primary,
                message: "Model: Loading...".to_string()
            }
        );
        assert_eq!(kernel.live_solids(), 0);
        assert!(kernel.staged_names().is_empty());
    }

    #[test]
    fn union_sequence_and_slots() {
        let (mut kernel, source) = setup();
        let (outcome, updates) = run(&mut kernel, &source, 12);

        assert_eq!(
            states(&updates),
            vec![
                ControllerState::LoadingFirst,
                ControllerState::LoadingSecond,
                ControllerState::Combining,
                ControllerState::Measuring,
                ControllerState::Rendering,
                ControllerState::Idle
            ]
        );
        let PipelineOutcome::Combined { measurements, preview_mesh, .. } = outcome else {
            panic!("expected a combined outcome");
        };
        assert_eq!(measurements.final_.volume, 2.0);
        assert!(preview_mesh.is_some());

        let secondary = updates.iter().find_map(|u| match u {
            PresentationUpdate::Slot {
                slot: DisplaySlot::Secondary,
                content,
            } => Some(content.clone()),
            _ => None,
        });
        let secondary = secondary.unwrap();
        assert_eq!(
            secondary.summaries[0].model,
            "models/model1.STEP + models/model2.STEP"
        );
        assert_eq!(kernel.live_solids(), 0);
    }

    #[test]
    fn loading_first_announces_both_slots() {
        let (mut kernel, source) = setup();
        let (_, updates) = run(&mut kernel, &source, 12);
        let announced: Vec<DisplaySlot> = updates
            .iter()
            .filter_map(|u| match u {
                PresentationUpdate::Status { slot, message } if message == LOADING_STATUS => Some(*slot),
                _ => None,
            })
            .collect();
        assert_eq!(
            announced,
            vec![DisplaySlot::Primary, DisplaySlot::Secondary, DisplaySlot::Secondary]
        );
    }

    #[test]
    fn unreadable_model_fails_with_status() {
        let (mut kernel, source) = setup();
        let (outcome, updates) = run(&mut kernel, &source, 3);
        assert_eq!(
            outcome,
            PipelineOutcome::Failed {
                reason: FailureReason::Load {
                    identifier: "models/model3.STEP".to_string(),
                    status_code: 3
                }
            }
        );
        assert!(states(&updates).contains(&ControllerState::Failed));
        let outcomes = updates
            .iter()
            .filter(|u| matches!(u, PresentationUpdate::Outcome { .. }))
            .count();
        assert_eq!(outcomes, 1);
    }

    #[test]
    fn missing_file_and_unknown_selector() {
        let (mut kernel, source) = setup();
        let (outcome, _) = run(&mut kernel, &source, 4);
        assert!(matches!(
            outcome,
            PipelineOutcome::Failed {
                reason: FailureReason::Fetch { .. }
            }
        ));

        let (outcome, _) = run(&mut kernel, &source, 9);
        assert_eq!(
            outcome,
            PipelineOutcome::Failed {
                reason: FailureReason::UnknownSelector { selector: 9 }
            }
        );
    }

    #[test]
    fn final_union_failure_releases_inputs() {
        let (mut kernel, source) = setup();
        kernel.queue_union_status(BuildStatus::Done);
        kernel.queue_union_status(BuildStatus::NotDone);
        let (outcome, _) = run(&mut kernel, &source, 12);
        assert!(matches!(
            outcome,
            PipelineOutcome::Failed {
                reason: FailureReason::Combination { .. }
            }
        ));
        assert_eq!(kernel.live_solids(), 0);
    }

    #[test]
    fn second_load_failure_releases_first() {
        let (mut kernel, _) = setup();
        let source = MemorySource::new().with("models/model1.STEP", b"cube".to_vec());
        let (outcome, _) = run(&mut kernel, &source, 12);
        assert!(outcome.is_failed());
        assert_eq!(kernel.live_solids(), 0);
    }

    #[test]
    fn preview_failure_still_combines() {
        let (mut kernel, source) = setup();
        kernel.queue_union_status(BuildStatus::NotDone);
        let (outcome, _) = run(&mut kernel, &source, 12);
        let PipelineOutcome::Combined { preview_mesh, measurements, .. } = outcome else {
            panic!("expected a combined outcome");
        };
        assert!(preview_mesh.is_none());
        assert!(measurements.preview.is_none());
        assert_eq!(kernel.live_solids(), 0);
    }
}
