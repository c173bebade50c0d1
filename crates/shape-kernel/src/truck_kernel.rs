//! TruckKernel: geometry kernel backed by truck's STEP reader and mesher.
//!
//! Solids are held as meshed shells. Each STEP shell is triangulated once
//! at transfer time and wound so its normals leave the material; void
//! shells of a `BREP_WITH_VOIDS` therefore carry negative signed volume.
//! Every later query (mass properties, bounds, unions) works on those
//! located meshes, and tessellation at another tolerance re-meshes from
//! the shell's STEP table.

use std::collections::{HashMap, HashSet};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::Arc;

use ruststep::parser::parse;
use tracing::{debug, info, instrument, warn};
use truck_meshalgo::prelude::*;
use truck_stepio::r#in::Table;

use crate::csg;
use crate::mass_props;
use crate::step_records;
use crate::tessellation::{faces_to_render_mesh, offset_mesh, reverse_winding};
use crate::traits::{validate_staged_name, Kernel};
use crate::types::BoundingBox;
use crate::types::*;

/// Default chordal tolerance used when meshing transferred shells.
pub const DEFAULT_TOLERANCE: f64 = 0.002;

/// Bounding-box overlap below this is treated as touching.
const CONTACT_TOLERANCE: f64 = 1e-9;

/// A parsed document awaiting root transfer.
struct StepDocument {
    table: Arc<Table>,
    voids: HashSet<u64>,
}

/// The STEP shell a piece was meshed from.
#[derive(Clone)]
struct ShellSource {
    table: Arc<Table>,
    shell: u64,
    void: bool,
}

impl ShellSource {
    fn mesh(&self, tolerance: f64) -> Result<RenderMesh, String> {
        mesh_shell(&self.table, self.shell, self.void, tolerance)
    }
}

/// A meshed shell placed in world space.
#[derive(Clone)]
struct LocatedShell {
    mesh: Arc<RenderMesh>,
    /// Absent for pieces produced by a mesh boolean.
    source: Option<ShellSource>,
    offset: [f64; 3],
}

impl LocatedShell {
    fn bounds(&self) -> BoundingBox {
        mass_props::mesh_bounding_box(&self.mesh).translated(self.offset)
    }
}

#[derive(Clone, Default)]
struct TruckBody {
    pieces: Vec<LocatedShell>,
}

impl TruckBody {
    /// All pieces in world space, as meshed at transfer time.
    fn world_mesh(&self) -> RenderMesh {
        let mut out = RenderMesh::default();
        for piece in &self.pieces {
            let mut mesh = (*piece.mesh).clone();
            offset_mesh(&mut mesh, piece.offset);
            out.append(mesh);
        }
        out
    }
}

/// Real geometry kernel backed by the truck BREP library.
///
/// Staged files live in a private directory under the system temp dir,
/// created on first use and removed when the kernel is dropped.
pub struct TruckKernel {
    staging_dir: PathBuf,
    tolerance: f64,
    next_handle: u64,
    documents: HashMap<u64, StepDocument>,
    solids: HashMap<u64, TruckBody>,
}

impl TruckKernel {
    pub fn new() -> Self {
        Self::with_tolerance(DEFAULT_TOLERANCE)
    }

    pub fn with_tolerance(tolerance: f64) -> Self {
        let tolerance = if valid_tolerance(tolerance) {
            tolerance
        } else {
            DEFAULT_TOLERANCE
        };
        Self {
            staging_dir: std::env::temp_dir()
                .join(format!("shape-staging-{}", uuid::Uuid::new_v4())),
            tolerance,
            next_handle: 1,
            documents: HashMap::new(),
            solids: HashMap::new(),
        }
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    fn alloc_id(&mut self) -> u64 {
        let id = self.next_handle;
        self.next_handle += 1;
        id
    }

    fn store_body(&mut self, body: TruckBody) -> SolidHandle {
        let id = self.alloc_id();
        self.solids.insert(id, body);
        SolidHandle(id)
    }

    fn body(&self, handle: &SolidHandle) -> Result<&TruckBody, KernelError> {
        self.solids
            .get(&handle.id())
            .ok_or(KernelError::SolidNotFound { id: handle.id() })
    }

    fn staged_path(&self, name: &str) -> Result<PathBuf, KernelError> {
        validate_staged_name(name)?;
        Ok(self.staging_dir.join(name))
    }

    fn parse_document(&self, name: &str) -> ReadOutcome {
        let path = match self.staged_path(name) {
            Ok(path) => path,
            Err(_) => return ReadOutcome::Status(ReadStatus::Void),
        };
        let raw = match std::fs::read(&path) {
            Ok(raw) if !raw.is_empty() => raw,
            Ok(_) => return ReadOutcome::Status(ReadStatus::Void),
            Err(e) => {
                debug!(name, error = %e, "staged file not readable");
                return ReadOutcome::Status(ReadStatus::Void);
            }
        };
        let Ok(text) = String::from_utf8(raw) else {
            return ReadOutcome::Status(ReadStatus::Fail);
        };

        let parsed = catch_unwind(AssertUnwindSafe(|| {
            let exchange = match parse(&text) {
                Ok(exchange) => exchange,
                Err(e) => {
                    debug!(name, error = ?e, "STEP parse failed");
                    return ReadOutcome::Status(ReadStatus::Fail);
                }
            };
            match exchange.data.first() {
                Some(section) => ReadOutcome::Document(StepDocument {
                    table: Arc::new(Table::from_data_section(section)),
                    voids: void_shells(&text),
                }),
                None => ReadOutcome::Status(ReadStatus::Error),
            }
        }));
        parsed.unwrap_or_else(|_| {
            warn!(name, "STEP reader panicked");
            ReadOutcome::Status(ReadStatus::Fail)
        })
    }
}

/// Reader outcome before a document handle is allocated.
enum ReadOutcome {
    Document(StepDocument),
    Status(ReadStatus),
}

impl Default for TruckKernel {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TruckKernel {
    fn drop(&mut self) {
        if self.staging_dir.exists() {
            if let Err(e) = std::fs::remove_dir_all(&self.staging_dir) {
                warn!(dir = %self.staging_dir.display(), error = %e, "failed to remove staging dir");
            }
        }
    }
}

fn valid_tolerance(tolerance: f64) -> bool {
    tolerance.is_normal() && tolerance > 0.0
}

/// Closed shells bounding the voids of `BREP_WITH_VOIDS` records.
///
/// truck's table lists outer and void shells alike, so the raw records are
/// scanned for the void lists and their `ORIENTED_CLOSED_SHELL` wrappers.
fn void_shells(text: &str) -> HashSet<u64> {
    let mut oriented: HashMap<u64, u64> = HashMap::new();
    let mut void_refs: Vec<u64> = Vec::new();

    for (id, body) in step_records::records(text) {
        if body.starts_with("ORIENTED_CLOSED_SHELL") {
            if let Some(&shell) = step_records::hash_refs(body).first() {
                oriented.insert(id, shell);
            }
        } else if body.starts_with("BREP_WITH_VOIDS") {
            // First reference is the outer shell
            void_refs.extend(step_records::hash_refs(body).into_iter().skip(1));
        }
    }

    void_refs
        .into_iter()
        .map(|r| oriented.get(&r).copied().unwrap_or(r))
        .collect()
}

/// Triangulate one shell of a table, wound away from the material.
fn mesh_shell(table: &Table, shell: u64, void: bool, tolerance: f64) -> Result<RenderMesh, String> {
    let holder = table
        .shell
        .get(&shell)
        .ok_or_else(|| format!("no shell #{}", shell))?;
    let meshed = catch_unwind(AssertUnwindSafe(|| {
        let compressed = table
            .to_compressed_shell(holder)
            .map_err(|e| e.to_string())?;
        let poly = compressed.robust_triangulation(tolerance);
        Ok::<_, String>(faces_to_render_mesh(
            poly.faces
                .iter()
                .map(|face| (face.surface.as_ref(), face.orientation)),
        ))
    }))
    .map_err(|_| "shell triangulation panicked".to_string())?;
    let mut mesh = meshed?;

    if (mass_props::mesh_signed_volume(&mesh) < 0.0) != void {
        reverse_winding(&mut mesh);
    }
    Ok(mesh)
}

/// Mesh every shell of a document, in entity order.
///
/// Shells that cannot be converted or meshed are skipped.
fn mesh_document(document: &StepDocument, tolerance: f64) -> Vec<LocatedShell> {
    let mut ids: Vec<u64> = document.table.shell.keys().copied().collect();
    ids.sort_unstable();

    let mut pieces = Vec::with_capacity(ids.len());
    for shell in ids {
        let source = ShellSource {
            table: Arc::clone(&document.table),
            shell,
            void: document.voids.contains(&shell),
        };
        match source.mesh(tolerance) {
            Ok(mesh) if !mesh.is_empty() => pieces.push(LocatedShell {
                mesh: Arc::new(mesh),
                source: Some(source),
                offset: [0.0; 3],
            }),
            Ok(_) => warn!(shell, "shell produced no triangles"),
            Err(reason) => warn!(shell, %reason, "skipping unconvertible shell"),
        }
    }
    pieces
}

impl Kernel for TruckKernel {
    fn stage_file(&mut self, name: &str, bytes: &[u8]) -> Result<(), KernelError> {
        let path = self.staged_path(name)?;
        std::fs::create_dir_all(&self.staging_dir)
            .and_then(|_| std::fs::write(&path, bytes))
            .map_err(|e| KernelError::StagingFailed {
                name: name.to_string(),
                reason: e.to_string(),
            })?;
        debug!(name, bytes = bytes.len(), "staged file");
        Ok(())
    }

    fn remove_staged(&mut self, name: &str) -> Result<(), KernelError> {
        let path = self.staged_path(name)?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(KernelError::StagingFailed {
                name: name.to_string(),
                reason: e.to_string(),
            }),
        }
    }

    #[instrument(skip(self))]
    fn read_document(&mut self, name: &str) -> (ReadStatus, DocumentHandle) {
        let id = self.alloc_id();
        let status = match self.parse_document(name) {
            ReadOutcome::Document(document) => {
                self.documents.insert(id, document);
                ReadStatus::Done
            }
            ReadOutcome::Status(status) => status,
        };
        info!(%status, "read STEP document");
        (status, DocumentHandle(id))
    }

    fn close_document(&mut self, document: DocumentHandle) {
        self.documents.remove(&document.id());
    }

    #[instrument(skip(self, document), fields(document = document.id()))]
    fn transfer_roots(&mut self, document: DocumentHandle) -> Result<RootTransfer, KernelError> {
        let document = self
            .documents
            .remove(&document.id())
            .ok_or(KernelError::DocumentNotFound { id: document.id() })?;

        let pieces = mesh_document(&document, self.tolerance);
        let roots_transferred = pieces.len();
        info!(roots_transferred, voids = document.voids.len(), "transferred roots");

        Ok(RootTransfer {
            solid: self.store_body(TruckBody { pieces }),
            roots_transferred,
        })
    }

    fn volume_of(&self, solid: &SolidHandle) -> Result<f64, KernelError> {
        let body = self.body(solid)?;
        let signed: f64 = body
            .pieces
            .iter()
            .map(|piece| mass_props::mesh_signed_volume(&piece.mesh))
            .sum();
        Ok(signed.max(0.0))
    }

    fn surface_area_of(&self, solid: &SolidHandle) -> Result<f64, KernelError> {
        let body = self.body(solid)?;
        Ok(body
            .pieces
            .iter()
            .map(|piece| mass_props::mesh_surface_area(&piece.mesh))
            .sum())
    }

    fn bounding_box(&self, solid: &SolidHandle) -> Result<BoundingBox, KernelError> {
        let body = self.body(solid)?;
        Ok(body
            .pieces
            .iter()
            .fold(BoundingBox::empty(), |acc, piece| acc.union(&piece.bounds())))
    }

    fn translate(
        &mut self,
        solid: &SolidHandle,
        vector: [f64; 3],
    ) -> Result<SolidHandle, KernelError> {
        let mut body = self.body(solid)?.clone();
        for piece in &mut body.pieces {
            for i in 0..3 {
                piece.offset[i] += vector[i];
            }
        }
        Ok(self.store_body(body))
    }

    /// Disjoint or touching operands fuse by assembly, which is exact.
    /// Intersecting operands are fused as meshes by csgrs; a fuse that
    /// yields nothing or panics reports `NotDone`.
    #[instrument(skip(self, a, b), fields(a = a.id(), b = b.id()))]
    fn boolean_union(
        &mut self,
        a: &SolidHandle,
        b: &SolidHandle,
    ) -> Result<BooleanBuild, KernelError> {
        let first = self.body(a)?;
        let second = self.body(b)?;

        let intersecting = first.pieces.iter().any(|p| {
            second
                .pieces
                .iter()
                .any(|q| p.bounds().overlaps(&q.bounds(), CONTACT_TOLERANCE))
        });

        if !intersecting {
            let mut pieces = first.pieces.clone();
            pieces.extend(second.pieces.iter().cloned());
            info!(pieces = pieces.len(), "union built by assembly");
            let solid = self.store_body(TruckBody { pieces });
            return Ok(BooleanBuild {
                status: BuildStatus::Done,
                solid,
            });
        }

        let (lhs, rhs) = (first.world_mesh(), second.world_mesh());
        let fused = catch_unwind(AssertUnwindSafe(|| csg::union(&lhs, &rhs)));
        let (status, body) = match fused {
            Ok(mesh) if !mesh.is_empty() => {
                info!(triangles = mesh.triangle_count(), "union fused");
                let piece = LocatedShell {
                    mesh: Arc::new(mesh),
                    source: None,
                    offset: [0.0; 3],
                };
                (BuildStatus::Done, TruckBody { pieces: vec![piece] })
            }
            Ok(_) => {
                warn!("mesh union produced no triangles");
                (BuildStatus::NotDone, TruckBody::default())
            }
            Err(_) => {
                warn!("mesh union panicked");
                (BuildStatus::NotDone, TruckBody::default())
            }
        };
        let solid = self.store_body(body);
        Ok(BooleanBuild { status, solid })
    }

    /// Shells still tied to their STEP table are re-meshed when `tolerance`
    /// differs from the transfer tolerance. Fused pieces keep their mesh.
    fn tessellate(&self, solid: &SolidHandle, tolerance: f64) -> Result<RenderMesh, KernelError> {
        let body = self.body(solid)?;
        let remesh = valid_tolerance(tolerance) && (tolerance - self.tolerance).abs() > f64::EPSILON;

        let mut out = RenderMesh::default();
        for piece in &body.pieces {
            let mut mesh = match (&piece.source, remesh) {
                (Some(source), true) => source.mesh(tolerance).unwrap_or_else(|reason| {
                    warn!(shell = source.shell, %reason, "re-mesh failed; using transfer mesh");
                    (*piece.mesh).clone()
                }),
                _ => (*piece.mesh).clone(),
            };
            offset_mesh(&mut mesh, piece.offset);
            out.append(mesh);
        }
        Ok(out)
    }

    fn release(&mut self, solid: SolidHandle) {
        self.solids.remove(&solid.id());
    }
}
