use shape_kernel::Kernel;

use crate::controller::{PipelineContext, PipelineController};
use crate::messages::{PipelineOutcome, PresentationUpdate, Presenter, ViewerRequest};
use crate::source::ModelSource;

/// Dispatch a viewer request to the controller.
///
/// Every update, including the terminal outcome, goes to `presenter`.
pub fn dispatch(
    controller: &mut PipelineController,
    msg: ViewerRequest,
    kernel: &mut dyn Kernel,
    source: &dyn ModelSource,
    presenter: &mut dyn Presenter,
) -> PipelineOutcome {
    let mut ctx = PipelineContext {
        kernel,
        source,
        presenter,
    };
    match msg {
        ViewerRequest::Init => controller.initialize(ctx.presenter),
        ViewerRequest::SelectModel { selector } => controller.run(&mut ctx, selector),
    }
}

/// Process a JSON request and return the JSON array of updates it produced.
///
/// A request that cannot be decoded yields a single `Error` update.
pub fn process_message(
    controller: &mut PipelineController,
    kernel: &mut dyn Kernel,
    source: &dyn ModelSource,
    json_input: &str,
) -> String {
    let mut updates: Vec<PresentationUpdate> = Vec::new();
    match serde_json::from_str::<ViewerRequest>(json_input) {
        Ok(msg) => {
            dispatch(controller, msg, kernel, source, &mut updates);
        }
        Err(e) => updates.push(PresentationUpdate::Error {
            message: format!("Failed to parse message: {}", e),
        }),
    }
    serde_json::to_string(&updates).unwrap_or_else(|e| {
        format!(
            r#"[{{"type":"Error","message":"Failed to serialize updates: {}"}}]"#,
            e.to_string().replace('"', "'")
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BridgeConfig;
    use crate::source::MemorySource;
    use shape_kernel::{MockKernel, MockShape};

    #[test]
    fn json_round_trip() {
        let mut kernel = MockKernel::new();
        kernel.register_document(b"ball".to_vec(), vec![MockShape::ball([0.0; 3], 1.0)]);
        let source = MemorySource::new().with("models/model2.STEP", b"ball".to_vec());
        let mut controller = PipelineController::new(&BridgeConfig::default());

        let out = process_message(
            &mut controller,
            &mut kernel,
            &source,
            r#"{"type":"SelectModel","selector":2}"#,
        );
        let updates: Vec<PresentationUpdate> = serde_json::from_str(&out).unwrap();
        let outcome = updates.iter().find_map(|u| match u {
            PresentationUpdate::Outcome { outcome } => Some(outcome.clone()),
            _ => None,
        });
        assert!(matches!(outcome, Some(PipelineOutcome::Loaded { .. })));
    }

    #[test]
    fn malformed_json_is_an_error_update() {
        let mut kernel = MockKernel::new();
        let source = MemorySource::new();
        let mut controller = PipelineController::new(&BridgeConfig::default());

        let out = process_message(&mut controller, &mut kernel, &source, "{");
        let updates: Vec<PresentationUpdate> = serde_json::from_str(&out).unwrap();
        assert_eq!(updates.len(), 1);
        assert!(matches!(updates[0], PresentationUpdate::Error { .. }));
    }
}
