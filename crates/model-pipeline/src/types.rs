use serde::{Deserialize, Serialize};
use shape_kernel::{KernelError, ReadStatus, SolidHandle};

/// Volume and surface area of one solid at one point in time.
///
/// Both values are non-negative. Immutable once computed.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Measurement {
    pub volume: f64,
    pub surface_area: f64,
}

/// A request to load one document. Consumed once by the loader.
#[derive(Debug, Clone)]
pub struct LoadRequest {
    /// Used only for diagnostics.
    pub source_identifier: String,
    pub raw_bytes: Vec<u8>,
}

impl LoadRequest {
    pub fn new(source_identifier: impl Into<String>, raw_bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            source_identifier: source_identifier.into(),
            raw_bytes: raw_bytes.into(),
        }
    }
}

/// Which of the two unions a combination error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CombinationStage {
    Preview,
    Final,
}

impl std::fmt::Display for CombinationStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CombinationStage::Preview => write!(f, "preview"),
            CombinationStage::Final => write!(f, "final"),
        }
    }
}

/// A union that was built and measured.
#[derive(Debug)]
pub struct CombinedSolid {
    pub solid: SolidHandle,
    pub measurement: Measurement,
}

/// Both unions of one pair of inputs.
///
/// `preview` is absent when only the preview build failed; the error is
/// kept in `preview_error` so it can still be reported.
#[derive(Debug)]
pub struct CombinationResult {
    pub preview: Option<CombinedSolid>,
    pub preview_error: Option<CombinationError>,
    pub final_: CombinedSolid,
}

/// Renderer-consumable reference to a tessellated solid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeshRef {
    pub uri: String,
    pub triangle_count: usize,
}

/// The document could not be fully read.
#[derive(Debug, Clone, thiserror::Error)]
#[error("failed to load {identifier}: reader status {status}")]
pub struct LoadError {
    pub identifier: String,
    pub status: ReadStatus,
}

impl LoadError {
    pub fn status_code(&self) -> i32 {
        self.status.code()
    }
}

/// A boolean union build did not complete.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CombinationError {
    #[error("{stage} union did not complete")]
    NotDone { stage: CombinationStage },

    #[error("{stage} union failed: {source}")]
    Kernel {
        stage: CombinationStage,
        #[source]
        source: KernelError,
    },
}

impl CombinationError {
    pub fn stage(&self) -> CombinationStage {
        match self {
            CombinationError::NotDone { stage } | CombinationError::Kernel { stage, .. } => *stage,
        }
    }
}

/// A solid could not be turned into a displayable mesh.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ExportError {
    #[error("tessellation failed: {0}")]
    Kernel(#[from] KernelError),
}
