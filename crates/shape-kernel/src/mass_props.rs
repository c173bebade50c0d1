//! Mass properties of triangle meshes.
//!
//! Used by the truck backend, which measures solids through their tessellation.

use crate::types::{BoundingBox, RenderMesh};

fn triangle(mesh: &RenderMesh, tri: &[u32]) -> Option<[[f64; 3]; 3]> {
    if tri.len() < 3 {
        return None;
    }
    let verts = &mesh.vertices;
    let mut out = [[0.0; 3]; 3];
    for (k, &idx) in tri.iter().take(3).enumerate() {
        let i = idx as usize * 3;
        if i + 2 >= verts.len() {
            return None;
        }
        out[k] = [verts[i] as f64, verts[i + 1] as f64, verts[i + 2] as f64];
    }
    Some(out)
}

/// Compute the volume of a triangle mesh using the divergence theorem.
///
/// For a closed (watertight) mesh, this returns the enclosed volume.
/// For open meshes, the result may be meaningless.
pub fn mesh_volume(mesh: &RenderMesh) -> f64 {
    mesh_signed_volume(mesh).abs()
}

/// Enclosed volume, positive when triangles are wound outward.
pub fn mesh_signed_volume(mesh: &RenderMesh) -> f64 {
    let mut volume = 0.0f64;

    for tri in mesh.indices.chunks(3) {
        let Some([p0, p1, p2]) = triangle(mesh, tri) else {
            continue;
        };
        let (x0, y0, z0) = (p0[0], p0[1], p0[2]);
        let (x1, y1, z1) = (p1[0], p1[1], p1[2]);
        let (x2, y2, z2) = (p2[0], p2[1], p2[2]);

        // Signed volume of tetrahedron formed by triangle and origin
        volume += x0 * (y1 * z2 - y2 * z1) + x1 * (y2 * z0 - y0 * z2) + x2 * (y0 * z1 - y1 * z0);
    }

    volume / 6.0
}

/// Compute the total surface area of a triangle mesh.
pub fn mesh_surface_area(mesh: &RenderMesh) -> f64 {
    let mut area = 0.0f64;

    for tri in mesh.indices.chunks(3) {
        let Some([p0, p1, p2]) = triangle(mesh, tri) else {
            continue;
        };
        let a = [p1[0] - p0[0], p1[1] - p0[1], p1[2] - p0[2]];
        let b = [p2[0] - p0[0], p2[1] - p0[1], p2[2] - p0[2]];

        // Cross product magnitude / 2
        let cx = a[1] * b[2] - a[2] * b[1];
        let cy = a[2] * b[0] - a[0] * b[2];
        let cz = a[0] * b[1] - a[1] * b[0];
        area += (cx * cx + cy * cy + cz * cz).sqrt() / 2.0;
    }

    area
}

/// Axis-aligned bounds of every vertex in the mesh.
pub fn mesh_bounding_box(mesh: &RenderMesh) -> BoundingBox {
    let mut bbox = BoundingBox::empty();
    for chunk in mesh.vertices.chunks(3) {
        if chunk.len() == 3 {
            bbox.include_point([chunk[0] as f64, chunk[1] as f64, chunk[2] as f64]);
        }
    }
    bbox
}
