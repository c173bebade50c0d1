use serde::{Deserialize, Serialize};

use model_pipeline::{CombinationStage, Measurement, MeshRef};

/// Requests from the viewer shell to the pipeline.
/// Serialized as JSON for transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ViewerRequest {
    /// The viewer started; both viewports get the placeholder model.
    Init,
    /// The user picked an entry in the model selector.
    SelectModel { selector: u32 },
}

/// Pipeline controller states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControllerState {
    Idle,
    Loading,
    LoadingFirst,
    LoadingSecond,
    Combining,
    Measuring,
    Rendering,
    Failed,
}

/// The two viewports of the viewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DisplaySlot {
    Primary,
    Secondary,
}

/// Human-readable measurement block shown under a viewport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementSummary {
    pub model: String,
    pub area: f64,
    pub volume: f64,
}

impl MeasurementSummary {
    pub fn new(model: impl Into<String>, measurement: &Measurement) -> Self {
        Self {
            model: model.into(),
            area: measurement.surface_area,
            volume: measurement.volume,
        }
    }

    pub fn lines(&self) -> [String; 3] {
        [
            format!("Model: {}", self.model),
            format!("Area: {}", self.area),
            format!("Vol: {}", self.volume),
        ]
    }
}

impl std::fmt::Display for MeasurementSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.lines().join("\n"))
    }
}

/// What one viewport shows after a request completes.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SlotContent {
    pub mesh: Option<MeshRef>,
    pub summaries: Vec<MeasurementSummary>,
}

/// Measurements reported for a two-model request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CombinedMeasurements {
    pub first: Measurement,
    pub second: Measurement,
    pub preview: Option<Measurement>,
    pub final_: Measurement,
}

/// Why a request failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum FailureReason {
    /// The document could not be read.
    Load { identifier: String, status_code: i32 },
    /// The document bytes could not be obtained.
    Fetch { identifier: String, message: String },
    /// The final union did not complete.
    Combination {
        stage: CombinationStage,
        message: String,
    },
    /// A solid could not be turned into a mesh.
    Export { message: String },
    /// The selector is not in the catalog.
    UnknownSelector { selector: u32 },
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureReason::Load {
                identifier,
                status_code,
            } => write!(f, "Failed to load {} (status {})", identifier, status_code),
            FailureReason::Fetch {
                identifier,
                message,
            } => write!(f, "Failed to fetch {}: {}", identifier, message),
            FailureReason::Combination { stage, message } => {
                write!(f, "Union failed at {} stage: {}", stage, message)
            }
            FailureReason::Export { message } => write!(f, "Mesh export failed: {}", message),
            FailureReason::UnknownSelector { selector } => {
                write!(f, "Unknown model selector {}", selector)
            }
        }
    }
}

/// Terminal result of one pipeline invocation.
///
/// Solid handles never appear here; they do not outlive the invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PipelineOutcome {
    Loaded {
        source: String,
        measurement: Measurement,
        mesh: MeshRef,
    },
    Combined {
        preview_mesh: Option<MeshRef>,
        final_mesh: MeshRef,
        measurements: CombinedMeasurements,
    },
    Failed {
        reason: FailureReason,
    },
    /// Both viewports show the startup placeholder.
    Ready { mesh: MeshRef },
}

impl PipelineOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, PipelineOutcome::Failed { .. })
    }
}

/// Messages from the pipeline to the viewer shell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PresentationUpdate {
    /// The controller moved to a new state.
    StateChanged { state: ControllerState },
    /// A status line for a viewport, e.g. "Model: Loading...".
    Status { slot: DisplaySlot, message: String },
    /// Final content for a viewport.
    Slot {
        slot: DisplaySlot,
        content: SlotContent,
    },
    /// The terminal outcome. Exactly one per request.
    Outcome { outcome: PipelineOutcome },
    /// A request could not be decoded or accepted.
    Error { message: String },
}

/// Receiver of presentation updates.
pub trait Presenter {
    fn publish(&mut self, update: PresentationUpdate);
}

impl Presenter for Vec<PresentationUpdate> {
    fn publish(&mut self, update: PresentationUpdate) {
        self.push(update);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_lines() {
        let s = MeasurementSummary::new(
            "models/model1.STEP",
            &Measurement {
                volume: 2.0,
                surface_area: 10.5,
            },
        );
        assert_eq!(s.to_string(), "Model: models/model1.STEP\nArea: 10.5\nVol: 2");
    }

    #[test]
    fn request_json_is_tagged() {
        let req: ViewerRequest = serde_json::from_str(r#"{"type":"SelectModel","selector":12}"#).unwrap();
        assert_eq!(req, ViewerRequest::SelectModel { selector: 12 });
        let init: ViewerRequest = serde_json::from_str(r#"{"type":"Init"}"#).unwrap();
        assert_eq!(init, ViewerRequest::Init);
    }

    #[test]
    fn failure_outcome_serializes_with_kind() {
        let update = PresentationUpdate::Outcome {
            outcome: PipelineOutcome::Failed {
                reason: FailureReason::UnknownSelector { selector: 7 },
            },
        };
        let json = serde_json::to_value(&update).unwrap();
        assert_eq!(json["type"], "Outcome");
        assert_eq!(json["outcome"]["type"], "Failed");
        assert_eq!(json["outcome"]["reason"]["kind"], "UnknownSelector");
        assert_eq!(json["outcome"]["reason"]["selector"], 7);
    }
}
