use serde::{Deserialize, Serialize};

/// Opaque handle to a solid owned by the geometry kernel.
///
/// Move-only: a handle has exactly one owner at a time and is given back
/// to the kernel with [`Kernel::release`](crate::Kernel::release).
/// NEVER persisted. Valid only for the kernel instance that issued it.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct SolidHandle(pub(crate) u64);

impl SolidHandle {
    pub(crate) fn id(&self) -> u64 {
        self.0
    }
}

/// Handle to a document the kernel has read but not yet transferred.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct DocumentHandle(pub(crate) u64);

impl DocumentHandle {
    pub(crate) fn id(&self) -> u64 {
        self.0
    }
}

/// Completion status of the exchange-document reader.
///
/// Codes are stable and reported to the presentation layer on failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReadStatus {
    /// Nothing was read (missing or empty input).
    Void,
    /// The document was read completely.
    Done,
    /// The document is structurally invalid.
    Error,
    /// The reader could not parse the input.
    Fail,
    /// Reading was interrupted.
    Stop,
}

impl ReadStatus {
    pub fn code(self) -> i32 {
        match self {
            ReadStatus::Void => 0,
            ReadStatus::Done => 1,
            ReadStatus::Error => 2,
            ReadStatus::Fail => 3,
            ReadStatus::Stop => 4,
        }
    }

    pub fn is_done(self) -> bool {
        self == ReadStatus::Done
    }
}

impl std::fmt::Display for ReadStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?} ({})", self, self.code())
    }
}

/// Completion status of a boolean build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BuildStatus {
    Done,
    NotDone,
}

/// Result of transferring a document's roots into kernel space.
#[derive(Debug)]
pub struct RootTransfer {
    /// Composite solid holding every transferred root. May be empty.
    pub solid: SolidHandle,
    /// Number of roots that were transferred.
    pub roots_transferred: usize,
}

/// Result of a boolean build. The solid is returned even when the build
/// did not complete, so the caller can release it.
#[derive(Debug)]
pub struct BooleanBuild {
    pub status: BuildStatus,
    pub solid: SolidHandle,
}

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min: [f64; 3],
    pub max: [f64; 3],
}

impl BoundingBox {
    /// The box of an empty shape: inverted so that any point extends it.
    pub fn empty() -> Self {
        Self {
            min: [f64::MAX; 3],
            max: [f64::MIN; 3],
        }
    }

    pub fn is_empty(&self) -> bool {
        (0..3).any(|i| self.min[i] > self.max[i])
    }

    pub fn include_point(&mut self, p: [f64; 3]) {
        for i in 0..3 {
            self.min[i] = self.min[i].min(p[i]);
            self.max[i] = self.max[i].max(p[i]);
        }
    }

    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        let mut out = *self;
        if !other.is_empty() {
            out.include_point(other.min);
            out.include_point(other.max);
        }
        out
    }

    pub fn translated(&self, v: [f64; 3]) -> BoundingBox {
        if self.is_empty() {
            return *self;
        }
        BoundingBox {
            min: [self.min[0] + v[0], self.min[1] + v[1], self.min[2] + v[2]],
            max: [self.max[0] + v[0], self.max[1] + v[1], self.max[2] + v[2]],
        }
    }

    /// True when the interiors overlap by more than `tolerance` on every axis.
    /// Boxes that merely touch do not overlap.
    pub fn overlaps(&self, other: &BoundingBox, tolerance: f64) -> bool {
        if self.is_empty() || other.is_empty() {
            return false;
        }
        (0..3).all(|i| {
            self.min[i] < other.max[i] - tolerance && other.min[i] < self.max[i] - tolerance
        })
    }
}

/// Errors from kernel operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum KernelError {
    #[error("solid not found: {id}")]
    SolidNotFound { id: u64 },

    #[error("document not found: {id}")]
    DocumentNotFound { id: u64 },

    #[error("invalid staged file name: {name}")]
    InvalidName { name: String },

    #[error("staging failed for {name}: {reason}")]
    StagingFailed { name: String, reason: String },

    #[error("kernel error: {message}")]
    Other { message: String },
}

/// Tessellated triangle mesh for display.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RenderMesh {
    /// Flat array of vertex positions [x0, y0, z0, x1, y1, z1, ...].
    pub vertices: Vec<f32>,
    /// Flat array of vertex normals [nx0, ny0, nz0, nx1, ny1, nz1, ...].
    pub normals: Vec<f32>,
    /// Triangle indices into the vertex array.
    pub indices: Vec<u32>,
    /// Mapping from triangle ranges to source faces.
    pub face_ranges: Vec<FaceRange>,
}

impl RenderMesh {
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Append another mesh, re-basing its indices and face ranges.
    pub fn append(&mut self, other: RenderMesh) {
        let base_vertex = (self.vertices.len() / 3) as u32;
        let base_index = self.indices.len() as u32;
        let face_base = self.face_ranges.len() as u32;
        self.vertices.extend(other.vertices);
        self.normals.extend(other.normals);
        self.indices
            .extend(other.indices.into_iter().map(|i| i + base_vertex));
        self.face_ranges
            .extend(other.face_ranges.into_iter().map(|r| FaceRange {
                face_index: r.face_index + face_base,
                start_index: r.start_index + base_index,
                end_index: r.end_index + base_index,
            }));
    }
}

/// Maps a contiguous range of triangle indices to one face of the source shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaceRange {
    pub face_index: u32,
    /// Start index in the indices array (inclusive).
    pub start_index: u32,
    /// End index in the indices array (exclusive).
    pub end_index: u32,
}
