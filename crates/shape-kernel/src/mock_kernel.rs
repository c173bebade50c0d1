//! Deterministic test double implementing Kernel.
//!
//! Documents are registered up front as byte sequences mapped to analytic
//! pieces. Measurements are closed-form: overlapping blocks are measured as
//! their union, and a union that would overlap a ball is refused. Tessellation
//! produces real triangles, and every handle and staged file is tracked so
//! tests can check that a pipeline invocation leaves nothing behind.

use std::collections::{HashMap, VecDeque};
use std::f64::consts::PI;

use crate::tessellation::uv_sphere;
use crate::traits::{validate_staged_name, Kernel};
use crate::types::*;

/// Latitude bands used when tessellating a ball.
const BALL_STACKS: u32 = 16;
/// Longitude segments used when tessellating a ball.
const BALL_SLICES: u32 = 32;

/// Bounding-box overlap below this is treated as touching.
const CONTACT_TOLERANCE: f64 = 1e-9;

/// An analytic piece of a mock solid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MockShape {
    /// Axis-aligned box between two corners.
    Block { min: [f64; 3], max: [f64; 3] },
    /// Sphere.
    Ball { center: [f64; 3], radius: f64 },
}

impl MockShape {
    /// Axis-aligned box with one corner at `origin`.
    pub fn block(origin: [f64; 3], size: [f64; 3]) -> Self {
        MockShape::Block {
            min: origin,
            max: [
                origin[0] + size[0],
                origin[1] + size[1],
                origin[2] + size[2],
            ],
        }
    }

    pub fn ball(center: [f64; 3], radius: f64) -> Self {
        MockShape::Ball { center, radius }
    }


    fn bounds(&self) -> BoundingBox {
        match *self {
            MockShape::Block { min, max } => BoundingBox { min, max },
            MockShape::Ball { center, radius } => BoundingBox {
                min: [center[0] - radius, center[1] - radius, center[2] - radius],
                max: [center[0] + radius, center[1] + radius, center[2] + radius],
            },
        }
    }

    fn translated(&self, v: [f64; 3]) -> Self {
        let add = |p: [f64; 3]| [p[0] + v[0], p[1] + v[1], p[2] + v[2]];
        match *self {
            MockShape::Block { min, max } => MockShape::Block {
                min: add(min),
                max: add(max),
            },
            MockShape::Ball { center, radius } => MockShape::Ball {
                center: add(center),
                radius,
            },
        }
    }
}

/// A synthetic solid: the union of its analytic pieces.
#[derive(Debug, Clone, Default)]
struct MockSolid {
    pieces: Vec<MockShape>,
}

impl MockSolid {
    fn blocks(&self) -> Vec<([f64; 3], [f64; 3])> {
        self.pieces
            .iter()
            .filter_map(|p| match *p {
                MockShape::Block { min, max } => Some((min, max)),
                MockShape::Ball { .. } => None,
            })
            .collect()
    }

    fn balls(&self) -> impl Iterator<Item = f64> + '_ {
        self.pieces.iter().filter_map(|p| match *p {
            MockShape::Ball { radius, .. } => Some(radius),
            MockShape::Block { .. } => None,
        })
    }

    /// Volume and area: blocks as one union, balls added whole.
    fn mass(&self) -> (f64, f64) {
        let (mut volume, mut area) = block_union_mass(&self.blocks());
        for radius in self.balls() {
            volume += 4.0 / 3.0 * PI * radius.powi(3);
            area += 4.0 * PI * radius * radius;
        }
        (volume, area)
    }

    /// True when a ball of either solid overlaps any piece of the other.
    fn ball_overlaps(&self, other: &MockSolid) -> bool {
        let overlapping = |x: &MockShape, y: &MockShape| {
            x.bounds().overlaps(&y.bounds(), CONTACT_TOLERANCE)
        };
        self.pieces.iter().any(|p| {
            other.pieces.iter().any(|q| {
                let curved = matches!(p, MockShape::Ball { .. }) || matches!(q, MockShape::Ball { .. });
                curved && overlapping(p, q)
            })
        })
    }
}

/// Exact volume and boundary area of a union of axis-aligned blocks.
///
/// Space is cut at every block face; each cell is inside when its centre is
/// inside some block, and area is counted on cell faces between inside and
/// outside.
fn block_union_mass(blocks: &[([f64; 3], [f64; 3])]) -> (f64, f64) {
    let mut cuts: [Vec<f64>; 3] = Default::default();
    for (min, max) in blocks {
        for axis in 0..3 {
            cuts[axis].push(min[axis]);
            cuts[axis].push(max[axis]);
        }
    }
    for c in &mut cuts {
        c.sort_by(|a, b| a.total_cmp(b));
        c.dedup();
    }
    if cuts.iter().any(|c| c.len() < 2) {
        return (0.0, 0.0);
    }
    let dims = [cuts[0].len() - 1, cuts[1].len() - 1, cuts[2].len() - 1];

    let inside = |cell: [isize; 3]| -> bool {
        let mut centre = [0.0; 3];
        for axis in 0..3 {
            let i = cell[axis];
            if i < 0 || i as usize >= dims[axis] {
                return false;
            }
            let i = i as usize;
            centre[axis] = 0.5 * (cuts[axis][i] + cuts[axis][i + 1]);
        }
        blocks
            .iter()
            .any(|(min, max)| (0..3).all(|a| min[a] < centre[a] && centre[a] < max[a]))
    };

    let (mut volume, mut area) = (0.0, 0.0);
    for i in 0..dims[0] {
        for j in 0..dims[1] {
            for k in 0..dims[2] {
                let cell = [i as isize, j as isize, k as isize];
                if !inside(cell) {
                    continue;
                }
                let width = [
                    cuts[0][i + 1] - cuts[0][i],
                    cuts[1][j + 1] - cuts[1][j],
                    cuts[2][k + 1] - cuts[2][k],
                ];
                volume += width[0] * width[1] * width[2];
                for axis in 0..3 {
                    let face = width[(axis + 1) % 3] * width[(axis + 2) % 3];
                    for step in [-1, 1] {
                        let mut neighbour = cell;
                        neighbour[axis] += step;
                        if !inside(neighbour) {
                            area += face;
                        }
                    }
                }
            }
        }
    }
    (volume, area)
}

/// Deterministic test double for the geometry kernel.
pub struct MockKernel {
    next_handle: u64,
    solids: HashMap<u64, MockSolid>,
    /// Documents read with status Done, awaiting transfer.
    documents: HashMap<u64, MockSolid>,
    /// Registered document contents, keyed by exact bytes.
    registry: HashMap<Vec<u8>, Vec<MockShape>>,
    /// The working namespace.
    staged: HashMap<String, Vec<u8>>,
    /// Every name ever staged, in order.
    staging_history: Vec<String>,
    /// Forced statuses for upcoming boolean builds.
    union_statuses: VecDeque<BuildStatus>,
    union_count: usize,
}

impl MockKernel {
    pub fn new() -> Self {
        Self {
            next_handle: 1,
            solids: HashMap::new(),
            documents: HashMap::new(),
            registry: HashMap::new(),
            staged: HashMap::new(),
            staging_history: Vec::new(),
            union_statuses: VecDeque::new(),
            union_count: 0,
        }
    }

    fn alloc(&mut self) -> u64 {
        let id = self.next_handle;
        self.next_handle += 1;
        id
    }

    fn store_solid(&mut self, solid: MockSolid) -> SolidHandle {
        let handle = SolidHandle(self.alloc());
        self.solids.insert(handle.id(), solid);
        handle
    }

    fn get_solid(&self, handle: &SolidHandle) -> Result<&MockSolid, KernelError> {
        self.solids
            .get(&handle.id())
            .ok_or(KernelError::SolidNotFound { id: handle.id() })
    }

    /// Register the contents a document with these exact bytes decodes to.
    /// An empty piece list models a document with no transferable roots.
    pub fn register_document(&mut self, bytes: impl Into<Vec<u8>>, pieces: Vec<MockShape>) {
        self.registry.insert(bytes.into(), pieces);
    }

    /// Force the status of the next boolean build. Queued statuses are
    /// consumed in order; once empty, builds complete normally.
    pub fn queue_union_status(&mut self, status: BuildStatus) {
        self.union_statuses.push_back(status);
    }

    /// Number of solids currently alive.
    pub fn live_solids(&self) -> usize {
        self.solids.len()
    }

    /// Number of documents read but neither transferred nor closed.
    pub fn open_documents(&self) -> usize {
        self.documents.len()
    }

    /// Names currently present in the working namespace.
    pub fn staged_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.staged.keys().cloned().collect();
        names.sort();
        names
    }

    /// Every name ever staged, in order.
    pub fn staging_history(&self) -> &[String] {
        &self.staging_history
    }

    /// Number of boolean builds attempted.
    pub fn union_count(&self) -> usize {
        self.union_count
    }

    /// Generate a deterministic mesh for one piece.
    fn tessellate_piece(piece: &MockShape) -> RenderMesh {
        match *piece {
            MockShape::Block { min, max } => tessellate_block(min, max),
            MockShape::Ball { center, radius } => tessellate_ball(center, radius),
        }
    }
}

impl Default for MockKernel {
    fn default() -> Self {
        Self::new()
    }
}

/// Six quads, two triangles each, wound outward.
fn tessellate_block(min: [f64; 3], max: [f64; 3]) -> RenderMesh {
    let corner = |x: bool, y: bool, z: bool| {
        [
            if x { max[0] } else { min[0] },
            if y { max[1] } else { min[1] },
            if z { max[2] } else { min[2] },
        ]
    };
    // (quad corners counter-clockwise seen from outside, normal)
    let quads = [
        (
            [corner(false, false, false), corner(false, true, false), corner(true, true, false), corner(true, false, false)],
            [0.0, 0.0, -1.0],
        ),
        (
            [corner(false, false, true), corner(true, false, true), corner(true, true, true), corner(false, true, true)],
            [0.0, 0.0, 1.0],
        ),
        (
            [corner(false, false, false), corner(true, false, false), corner(true, false, true), corner(false, false, true)],
            [0.0, -1.0, 0.0],
        ),
        (
            [corner(false, true, false), corner(false, true, true), corner(true, true, true), corner(true, true, false)],
            [0.0, 1.0, 0.0],
        ),
        (
            [corner(false, false, false), corner(false, false, true), corner(false, true, true), corner(false, true, false)],
            [-1.0, 0.0, 0.0],
        ),
        (
            [corner(true, false, false), corner(true, true, false), corner(true, true, true), corner(true, false, true)],
            [1.0, 0.0, 0.0],
        ),
    ];

    let mut mesh = RenderMesh::default();
    for (face_index, (corners, n)) in quads.iter().enumerate() {
        let start_index = mesh.indices.len() as u32;
        let base = (mesh.vertices.len() / 3) as u32;
        for c in corners {
            mesh.vertices
                .extend_from_slice(&[c[0] as f32, c[1] as f32, c[2] as f32]);
            mesh.normals
                .extend_from_slice(&[n[0] as f32, n[1] as f32, n[2] as f32]);
        }
        mesh.indices
            .extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
        mesh.face_ranges.push(FaceRange {
            face_index: face_index as u32,
            start_index,
            end_index: mesh.indices.len() as u32,
        });
    }
    mesh
}

fn tessellate_ball(center: [f64; 3], radius: f64) -> RenderMesh {
    uv_sphere(center, radius, BALL_STACKS, BALL_SLICES)
}

impl Kernel for MockKernel {
    fn stage_file(&mut self, name: &str, bytes: &[u8]) -> Result<(), KernelError> {
        validate_staged_name(name)?;
        self.staged.insert(name.to_string(), bytes.to_vec());
        self.staging_history.push(name.to_string());
        Ok(())
    }

    fn remove_staged(&mut self, name: &str) -> Result<(), KernelError> {
        self.staged.remove(name);
        Ok(())
    }

    fn read_document(&mut self, name: &str) -> (ReadStatus, DocumentHandle) {
        let document = DocumentHandle(self.alloc());
        let Some(bytes) = self.staged.get(name) else {
            return (ReadStatus::Void, document);
        };
        match self.registry.get(bytes) {
            Some(pieces) => {
                let solid = MockSolid {
                    pieces: pieces.clone(),
                };
                self.documents.insert(document.id(), solid);
                (ReadStatus::Done, document)
            }
            None => (ReadStatus::Fail, document),
        }
    }

    fn close_document(&mut self, document: DocumentHandle) {
        self.documents.remove(&document.id());
    }

    fn transfer_roots(&mut self, document: DocumentHandle) -> Result<RootTransfer, KernelError> {
        let solid = self
            .documents
            .remove(&document.id())
            .ok_or(KernelError::DocumentNotFound { id: document.id() })?;
        let roots_transferred = solid.pieces.len();
        Ok(RootTransfer {
            solid: self.store_solid(solid),
            roots_transferred,
        })
    }

    fn volume_of(&self, solid: &SolidHandle) -> Result<f64, KernelError> {
        Ok(self.get_solid(solid)?.mass().0)
    }

    fn surface_area_of(&self, solid: &SolidHandle) -> Result<f64, KernelError> {
        Ok(self.get_solid(solid)?.mass().1)
    }

    fn bounding_box(&self, solid: &SolidHandle) -> Result<BoundingBox, KernelError> {
        Ok(self
            .get_solid(solid)?
            .pieces
            .iter()
            .fold(BoundingBox::empty(), |acc, p| acc.union(&p.bounds())))
    }

    fn translate(
        &mut self,
        solid: &SolidHandle,
        vector: [f64; 3],
    ) -> Result<SolidHandle, KernelError> {
        let moved = MockSolid {
            pieces: self
                .get_solid(solid)?
                .pieces
                .iter()
                .map(|p| p.translated(vector))
                .collect(),
        };
        Ok(self.store_solid(moved))
    }

    fn boolean_union(
        &mut self,
        a: &SolidHandle,
        b: &SolidHandle,
    ) -> Result<BooleanBuild, KernelError> {
        let solid_a = self.get_solid(a)?.clone();
        let solid_b = self.get_solid(b)?.clone();
        self.union_count += 1;

        let status = match self.union_statuses.pop_front() {
            Some(forced) => forced,
            None if solid_a.ball_overlaps(&solid_b) => BuildStatus::NotDone,
            None => BuildStatus::Done,
        };
        let fused = match status {
            BuildStatus::Done => {
                let mut pieces = solid_a.pieces;
                pieces.extend(solid_b.pieces);
                MockSolid { pieces }
            }
            BuildStatus::NotDone => MockSolid::default(),
        };
        Ok(BooleanBuild {
            status,
            solid: self.store_solid(fused),
        })
    }

    fn tessellate(&self, solid: &SolidHandle, _tolerance: f64) -> Result<RenderMesh, KernelError> {
        let s = self.get_solid(solid)?;
        let mut mesh = RenderMesh::default();
        for piece in &s.pieces {
            mesh.append(Self::tessellate_piece(piece));
        }
        Ok(mesh)
    }

    fn release(&mut self, solid: SolidHandle) {
        self.solids.remove(&solid.id());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mass_props::{mesh_surface_area, mesh_volume};
    use approx::assert_relative_eq;

    fn load(kernel: &mut MockKernel, bytes: &[u8]) -> SolidHandle {
        kernel.stage_file("doc.step", bytes).unwrap();
        let (status, doc) = kernel.read_document("doc.step");
        assert_eq!(status, ReadStatus::Done);
        kernel.remove_staged("doc.step").unwrap();
        kernel.transfer_roots(doc).unwrap().solid
    }

    #[test]
    fn test_registered_document_reads_done() {
        let mut kernel = MockKernel::new();
        kernel.register_document("cube", vec![MockShape::block([0.0; 3], [1.0; 3])]);
        let solid = load(&mut kernel, b"cube");
        assert_relative_eq!(kernel.volume_of(&solid).unwrap(), 1.0);
        assert_relative_eq!(kernel.surface_area_of(&solid).unwrap(), 6.0);
        assert_eq!(kernel.open_documents(), 0);
    }

    #[test]
    fn test_unregistered_bytes_read_fail() {
        let mut kernel = MockKernel::new();
        kernel.stage_file("doc.step", b"garbage").unwrap();
        let (status, doc) = kernel.read_document("doc.step");
        assert_eq!(status, ReadStatus::Fail);
        kernel.close_document(doc);
        assert_eq!(kernel.open_documents(), 0);
    }

    #[test]
    fn test_missing_staged_file_reads_void() {
        let mut kernel = MockKernel::new();
        let (status, doc) = kernel.read_document("nothing.step");
        assert_eq!(status, ReadStatus::Void);
        assert!(kernel.transfer_roots(doc).is_err());
    }

    #[test]
    fn test_empty_document_transfers_empty_solid() {
        let mut kernel = MockKernel::new();
        kernel.register_document("empty", Vec::new());
        kernel.stage_file("doc.step", b"empty").unwrap();
        let (_, doc) = kernel.read_document("doc.step");
        let transfer = kernel.transfer_roots(doc).unwrap();
        assert_eq!(transfer.roots_transferred, 0);
        assert_eq!(kernel.volume_of(&transfer.solid).unwrap(), 0.0);
        assert!(kernel.bounding_box(&transfer.solid).unwrap().is_empty());
    }

    #[test]
    fn test_translate_leaves_input_untouched() {
        let mut kernel = MockKernel::new();
        kernel.register_document("cube", vec![MockShape::block([0.0; 3], [1.0; 3])]);
        let solid = load(&mut kernel, b"cube");
        let moved = kernel.translate(&solid, [5.0, 0.0, 0.0]).unwrap();
        assert_eq!(kernel.bounding_box(&solid).unwrap().min, [0.0; 3]);
        assert_eq!(kernel.bounding_box(&moved).unwrap().min, [5.0, 0.0, 0.0]);
        assert_eq!(kernel.live_solids(), 2);
    }

    #[test]
    fn test_boolean_union_combines_pieces() {
        let mut kernel = MockKernel::new();
        kernel.register_document("a", vec![MockShape::block([0.0; 3], [1.0; 3])]);
        kernel.register_document("b", vec![MockShape::block([1.0, 0.0, 0.0], [1.0; 3])]);
        let a = load(&mut kernel, b"a");
        let b = load(&mut kernel, b"b");
        let build = kernel.boolean_union(&a, &b).unwrap();
        assert_eq!(build.status, BuildStatus::Done);
        assert_relative_eq!(kernel.volume_of(&build.solid).unwrap(), 2.0);
        assert_eq!(kernel.union_count(), 1);
    }

    #[test]
    fn test_coincident_blocks_union_to_one() {
        let mut kernel = MockKernel::new();
        kernel.register_document("a", vec![MockShape::block([0.0; 3], [1.0; 3])]);
        let a = load(&mut kernel, b"a");
        let b = load(&mut kernel, b"a");
        let build = kernel.boolean_union(&a, &b).unwrap();
        assert_eq!(build.status, BuildStatus::Done);
        assert_relative_eq!(kernel.volume_of(&build.solid).unwrap(), 1.0);
        assert_relative_eq!(kernel.surface_area_of(&build.solid).unwrap(), 6.0);
    }

    #[test]
    fn test_overlapping_blocks_measure_as_union() {
        let mut kernel = MockKernel::new();
        kernel.register_document("a", vec![MockShape::block([0.0; 3], [1.0; 3])]);
        kernel.register_document("b", vec![MockShape::block([0.5; 3], [1.0; 3])]);
        let a = load(&mut kernel, b"a");
        let b = load(&mut kernel, b"b");
        let build = kernel.boolean_union(&a, &b).unwrap();
        assert_eq!(build.status, BuildStatus::Done);
        assert_relative_eq!(kernel.volume_of(&build.solid).unwrap(), 1.875, epsilon = 1e-12);
        // 2 * 6 faces minus the three 0.25 patches hidden in each cube
        assert_relative_eq!(
            kernel.surface_area_of(&build.solid).unwrap(),
            10.5,
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_ball_overlap_is_not_done() {
        let mut kernel = MockKernel::new();
        kernel.register_document("a", vec![MockShape::block([0.0; 3], [3.0, 1.0, 1.0])]);
        kernel.register_document("b", vec![MockShape::ball([0.5; 3], 0.5)]);
        let a = load(&mut kernel, b"a");
        let b = load(&mut kernel, b"b");
        let build = kernel.boolean_union(&a, &b).unwrap();
        assert_eq!(build.status, BuildStatus::NotDone);

        let moved = kernel.translate(&b, [5.0, 0.0, 0.0]).unwrap();
        let build = kernel.boolean_union(&a, &moved).unwrap();
        assert_eq!(build.status, BuildStatus::Done);
        assert_relative_eq!(
            kernel.volume_of(&build.solid).unwrap(),
            3.0 + PI / 6.0,
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_block_union_mass_of_disjoint_and_touching_blocks() {
        let disjoint = [([0.0; 3], [1.0; 3]), ([3.0, 0.0, 0.0], [4.0, 2.0, 1.0])];
        let (volume, area) = block_union_mass(&disjoint);
        assert_relative_eq!(volume, 3.0, epsilon = 1e-12);
        assert_relative_eq!(area, 6.0 + 10.0, epsilon = 1e-12);

        let touching = [([0.0; 3], [1.0; 3]), ([1.0, 0.0, 0.0], [2.0, 1.0, 1.0])];
        let (volume, area) = block_union_mass(&touching);
        assert_relative_eq!(volume, 2.0, epsilon = 1e-12);
        assert_relative_eq!(area, 10.0, epsilon = 1e-12);
        assert_eq!(block_union_mass(&[]), (0.0, 0.0));
    }

    #[test]
    fn test_queued_union_status_is_consumed() {
        let mut kernel = MockKernel::new();
        kernel.register_document("a", vec![MockShape::block([0.0; 3], [1.0; 3])]);
        let a = load(&mut kernel, b"a");
        let b = load(&mut kernel, b"a");
        kernel.queue_union_status(BuildStatus::NotDone);
        let first = kernel.boolean_union(&a, &b).unwrap();
        let second = kernel.boolean_union(&a, &b).unwrap();
        assert_eq!(first.status, BuildStatus::NotDone);
        assert_eq!(second.status, BuildStatus::Done);
    }

    #[test]
    fn test_release_frees_solid() {
        let mut kernel = MockKernel::new();
        kernel.register_document("a", vec![MockShape::ball([0.0; 3], 1.0)]);
        let a = load(&mut kernel, b"a");
        assert_eq!(kernel.live_solids(), 1);
        kernel.release(a);
        assert_eq!(kernel.live_solids(), 0);
    }

    #[test]
    fn test_tessellate_block_matches_analytic_mass() {
        let mesh = tessellate_block([0.0; 3], [2.0, 3.0, 4.0]);
        assert_eq!(mesh.triangle_count(), 12);
        assert_eq!(mesh.face_ranges.len(), 6);
        assert_relative_eq!(mesh_volume(&mesh), 24.0, epsilon = 1e-6);
        assert_relative_eq!(mesh_surface_area(&mesh), 52.0, epsilon = 1e-6);
    }

    #[test]
    fn test_tessellate_ball_approximates_sphere() {
        let mesh = tessellate_ball([0.0; 3], 1.0);
        let expected = 4.0 / 3.0 * PI;
        assert!((mesh_volume(&mesh) - expected).abs() / expected < 0.05);
    }

    #[test]
    fn test_staging_history_records_names() {
        let mut kernel = MockKernel::new();
        kernel.stage_file("one.step", b"x").unwrap();
        kernel.stage_file("two.step", b"y").unwrap();
        kernel.remove_staged("one.step").unwrap();
        assert_eq!(kernel.staged_names(), vec!["two.step".to_string()]);
        assert_eq!(kernel.staging_history(), ["one.step", "two.step"]);
        assert!(kernel.stage_file("../x", b"z").is_err());
    }
}
