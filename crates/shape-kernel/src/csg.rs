//! Mesh booleans through csgrs BSP trees.
//!
//! Used by the truck backend to fuse operands that actually intersect.

use csgrs::mesh::polygon::Polygon;
use csgrs::mesh::vertex::Vertex;
use csgrs::mesh::Mesh;
use csgrs::traits::CSG;

use crate::types::{FaceRange, RenderMesh};

/// Triangles smaller than this cannot define a splitting plane.
const MIN_TRIANGLE_AREA: f64 = 1e-12;

type CsgMesh = Mesh<()>;

fn corner(mesh: &RenderMesh, index: u32) -> Option<[f64; 3]> {
    let i = index as usize * 3;
    let v = mesh.vertices.get(i..i + 3)?;
    Some([v[0] as f64, v[1] as f64, v[2] as f64])
}

fn cross(a: [f64; 3], b: [f64; 3], c: [f64; 3]) -> [f64; 3] {
    let e1 = [b[0] - a[0], b[1] - a[1], b[2] - a[2]];
    let e2 = [c[0] - a[0], c[1] - a[1], c[2] - a[2]];
    [
        e1[1] * e2[2] - e1[2] * e2[1],
        e1[2] * e2[0] - e1[0] * e2[2],
        e1[0] * e2[1] - e1[1] * e2[0],
    ]
}

fn to_csg(mesh: &RenderMesh) -> CsgMesh {
    let mut polygons = Vec::with_capacity(mesh.triangle_count());
    for tri in mesh.indices.chunks_exact(3) {
        let (Some(a), Some(b), Some(c)) =
            (corner(mesh, tri[0]), corner(mesh, tri[1]), corner(mesh, tri[2]))
        else {
            continue;
        };
        let n = cross(a, b, c);
        let len = (n[0] * n[0] + n[1] * n[1] + n[2] * n[2]).sqrt();
        if len / 2.0 < MIN_TRIANGLE_AREA {
            continue;
        }
        let normal = [n[0] / len, n[1] / len, n[2] / len];
        let vertices = [a, b, c]
            .into_iter()
            .map(|p| Vertex::new(p.into(), normal.into()))
            .collect();
        polygons.push(Polygon::new(vertices, None));
    }
    Mesh::from_polygons(&polygons, None)
}

/// Fan-triangulate the convex polygons of a BSP result.
fn from_csg(mesh: &CsgMesh) -> RenderMesh {
    let mut out = RenderMesh::default();
    for polygon in &mesh.polygons {
        let verts = &polygon.vertices;
        if verts.len() < 3 {
            continue;
        }
        let start_index = out.indices.len() as u32;
        for k in 1..verts.len() - 1 {
            for v in [&verts[0], &verts[k], &verts[k + 1]] {
                let index = (out.vertices.len() / 3) as u32;
                out.vertices
                    .extend_from_slice(&[v.pos.x as f32, v.pos.y as f32, v.pos.z as f32]);
                out.normals.extend_from_slice(&[
                    v.normal.x as f32,
                    v.normal.y as f32,
                    v.normal.z as f32,
                ]);
                out.indices.push(index);
            }
        }
        out.face_ranges.push(FaceRange {
            face_index: out.face_ranges.len() as u32,
            start_index,
            end_index: out.indices.len() as u32,
        });
    }
    out
}

/// Boolean union of two closed, outward-wound meshes.
pub fn union(a: &RenderMesh, b: &RenderMesh) -> RenderMesh {
    from_csg(&to_csg(a).union(&to_csg(b)))
}
