//! MeshExporter: solids to renderer-consumable mesh references.

use base64::Engine;
use shape_kernel::{Kernel, RenderMesh, SolidHandle};
use tracing::{debug, instrument};

use crate::types::{ExportError, MeshRef};

/// Default chordal tolerance for display meshes.
pub const DEFAULT_TESSELLATION_TOLERANCE: f64 = 0.01;

/// Turns a solid into something a viewer can display.
pub trait MeshExporter {
    /// Consumes the solid; it is released whether or not export succeeds.
    fn to_displayable(
        &self,
        kernel: &mut dyn Kernel,
        solid: SolidHandle,
    ) -> Result<MeshRef, ExportError>;
}

/// Binary STL wrapped in a `data:` URI.
#[derive(Debug, Clone)]
pub struct StlDataUrlExporter {
    pub tolerance: f64,
}

impl StlDataUrlExporter {
    pub const MEDIA_TYPE: &'static str = "model/stl";

    pub fn new(tolerance: f64) -> Self {
        Self { tolerance }
    }
}

impl Default for StlDataUrlExporter {
    fn default() -> Self {
        Self::new(DEFAULT_TESSELLATION_TOLERANCE)
    }
}

impl MeshExporter for StlDataUrlExporter {
    #[instrument(skip_all, fields(tolerance = self.tolerance))]
    fn to_displayable(
        &self,
        kernel: &mut dyn Kernel,
        solid: SolidHandle,
    ) -> Result<MeshRef, ExportError> {
        let mesh = kernel.tessellate(&solid, self.tolerance);
        kernel.release(solid);
        Ok(stl_data_url(&mesh?))
    }
}

/// A mesh as a binary STL `data:` URI.
pub fn stl_data_url(mesh: &RenderMesh) -> MeshRef {
    let stl = render_mesh_to_stl(mesh);
    debug!(triangles = mesh.triangle_count(), bytes = stl.len(), "exported STL");
    MeshRef {
        uri: format!(
            "data:{};base64,{}",
            StlDataUrlExporter::MEDIA_TYPE,
            base64::engine::general_purpose::STANDARD.encode(&stl)
        ),
        triangle_count: mesh.triangle_count(),
    }
}

const STL_HEADER: &[u8] = b"model-pipeline binary STL";

/// Convert a `RenderMesh` to binary STL.
///
/// Layout: 80-byte header, u32 LE triangle count, then per triangle a
/// normal and three vertices (f32 LE) and a zero u16 attribute count.
/// Triangles referencing missing vertices are dropped.
pub fn render_mesh_to_stl(mesh: &RenderMesh) -> Vec<u8> {
    let vertex = |i: u32| -> Option<[f32; 3]> {
        let i = i as usize * 3;
        mesh.vertices.get(i..i + 3).map(|v| [v[0], v[1], v[2]])
    };
    let triangles: Vec<[[f32; 3]; 3]> = mesh
        .indices
        .chunks_exact(3)
        .filter_map(|t| Some([vertex(t[0])?, vertex(t[1])?, vertex(t[2])?]))
        .collect();

    let mut buf = Vec::with_capacity(84 + triangles.len() * 50);
    let mut header = [0u8; 80];
    header[..STL_HEADER.len()].copy_from_slice(STL_HEADER);
    buf.extend_from_slice(&header);
    buf.extend_from_slice(&(triangles.len() as u32).to_le_bytes());

    for [v0, v1, v2] in &triangles {
        let e1 = [v1[0] - v0[0], v1[1] - v0[1], v1[2] - v0[2]];
        let e2 = [v2[0] - v0[0], v2[1] - v0[1], v2[2] - v0[2]];
        let n = [
            e1[1] * e2[2] - e1[2] * e2[1],
            e1[2] * e2[0] - e1[0] * e2[2],
            e1[0] * e2[1] - e1[1] * e2[0],
        ];
        let len = (n[0] * n[0] + n[1] * n[1] + n[2] * n[2]).sqrt();
        let normal = if len > 1e-12 {
            [n[0] / len, n[1] / len, n[2] / len]
        } else {
            [0.0; 3]
        };

        for c in normal.iter().chain(v0).chain(v1).chain(v2) {
            buf.extend_from_slice(&c.to_le_bytes());
        }
        buf.extend_from_slice(&0u16.to_le_bytes());
    }

    buf
}

#[cfg(test)]
mod tests {
    use super::*;
    use shape_kernel::{MockKernel, MockShape};

    #[test]
    fn stl_layout() {
        let mesh = RenderMesh {
            vertices: vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0],
            indices: vec![0, 1, 2],
            ..RenderMesh::default()
        };
        let stl = render_mesh_to_stl(&mesh);
        assert_eq!(stl.len(), 84 + 50);
        assert_eq!(u32::from_le_bytes([stl[80], stl[81], stl[82], stl[83]]), 1);
        // Normal of a CCW triangle in the XY plane points up
        let nz = f32::from_le_bytes([stl[92], stl[93], stl[94], stl[95]]);
        assert_eq!(nz, 1.0);
    }

    #[test]
    fn dangling_indices_are_dropped() {
        let mesh = RenderMesh {
            vertices: vec![0.0; 9],
            indices: vec![0, 1, 2, 0, 1, 7],
            ..RenderMesh::default()
        };
        assert_eq!(render_mesh_to_stl(&mesh).len(), 84 + 50);
    }

    #[test]
    fn exporter_produces_data_uri_and_releases_solid() {
        let mut kernel = MockKernel::new();
        kernel.register_document(b"cube".to_vec(), vec![MockShape::block([0.0; 3], [1.0; 3])]);
        let solid = crate::loader::load(&mut kernel, "cube", b"cube").unwrap();

        let mesh_ref = StlDataUrlExporter::default()
            .to_displayable(&mut kernel, solid)
            .unwrap();
        assert!(mesh_ref.uri.starts_with("data:model/stl;base64,"));
        assert_eq!(mesh_ref.triangle_count, 12);
        assert_eq!(kernel.live_solids(), 0);

        let payload = mesh_ref.uri.trim_start_matches("data:model/stl;base64,");
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(payload)
            .unwrap();
        assert_eq!(bytes.len(), 84 + 12 * 50);
    }

    #[test]
    fn empty_solid_exports_empty_mesh() {
        let mut kernel = MockKernel::new();
        kernel.register_document(b"empty".to_vec(), Vec::new());
        let solid = crate::loader::load(&mut kernel, "empty", b"empty").unwrap();
        let mesh_ref = StlDataUrlExporter::default()
            .to_displayable(&mut kernel, solid)
            .unwrap();
        assert_eq!(mesh_ref.triangle_count, 0);
    }
}
