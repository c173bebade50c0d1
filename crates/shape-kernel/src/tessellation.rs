//! Tessellation wrapper with face-range metadata.
//!
//! Converts truck-meshalgo face meshes into a RenderMesh with FaceRange
//! entries that map triangle index ranges to the source faces.

use crate::types::{FaceRange, RenderMesh};
use truck_meshalgo::prelude::*;

/// Flatten meshed faces into one RenderMesh.
///
/// Each item is a face's mesh (absent when the face could not be meshed)
/// and its orientation flag. Vertices are emitted per triangle corner so
/// positions and normals always line up.
pub fn faces_to_render_mesh<'a>(
    faces: impl IntoIterator<Item = (Option<&'a PolygonMesh>, bool)>,
) -> RenderMesh {
    let mut mesh = RenderMesh::default();

    for (face_index, (surface, orientation)) in faces.into_iter().enumerate() {
        let Some(surface) = surface else {
            continue;
        };

        // If face is inverted, the mesh needs inversion too
        let mut face_mesh = surface.clone();
        if !orientation {
            face_mesh.invert();
        }

        let start_index = mesh.indices.len() as u32;
        let positions = face_mesh.positions();
        let normals = face_mesh.normals();

        for tri in face_mesh.tri_faces() {
            let corners = [positions[tri[0].pos], positions[tri[1].pos], positions[tri[2].pos]];
            let flat = triangle_normal(&corners);

            for (v, p) in tri.iter().zip(corners.iter()) {
                let n = v
                    .nor
                    .and_then(|i| normals.get(i))
                    .map(|n| [n[0], n[1], n[2]])
                    .unwrap_or(flat);
                let index = (mesh.vertices.len() / 3) as u32;
                mesh.vertices
                    .extend_from_slice(&[p[0] as f32, p[1] as f32, p[2] as f32]);
                mesh.normals
                    .extend_from_slice(&[n[0] as f32, n[1] as f32, n[2] as f32]);
                mesh.indices.push(index);
            }
        }

        let end_index = mesh.indices.len() as u32;
        if end_index > start_index {
            mesh.face_ranges.push(FaceRange {
                face_index: face_index as u32,
                start_index,
                end_index,
            });
        }
    }

    mesh
}

fn triangle_normal(p: &[Point3; 3]) -> [f64; 3] {
    let e1 = [p[1][0] - p[0][0], p[1][1] - p[0][1], p[1][2] - p[0][2]];
    let e2 = [p[2][0] - p[0][0], p[2][1] - p[0][1], p[2][2] - p[0][2]];
    let n = [
        e1[1] * e2[2] - e1[2] * e2[1],
        e1[2] * e2[0] - e1[0] * e2[2],
        e1[0] * e2[1] - e1[1] * e2[0],
    ];
    let len = (n[0] * n[0] + n[1] * n[1] + n[2] * n[2]).sqrt();
    if len > 1e-12 {
        [n[0] / len, n[1] / len, n[2] / len]
    } else {
        [0.0, 0.0, 1.0]
    }
}

/// UV sphere with poles at ±z, as one face.
pub fn uv_sphere(center: [f64; 3], radius: f64, stacks: u32, slices: u32) -> RenderMesh {
    let (stacks, slices) = (stacks.max(2), slices.max(3));
    let mut mesh = RenderMesh::default();
    for stack in 0..=stacks {
        let phi = std::f64::consts::PI * stack as f64 / stacks as f64;
        for slice in 0..=slices {
            let theta = 2.0 * std::f64::consts::PI * slice as f64 / slices as f64;
            let n = [phi.sin() * theta.cos(), phi.sin() * theta.sin(), phi.cos()];
            mesh.vertices.extend_from_slice(&[
                (center[0] + radius * n[0]) as f32,
                (center[1] + radius * n[1]) as f32,
                (center[2] + radius * n[2]) as f32,
            ]);
            mesh.normals
                .extend_from_slice(&[n[0] as f32, n[1] as f32, n[2] as f32]);
        }
    }
    let row = slices + 1;
    for stack in 0..stacks {
        for slice in 0..slices {
            let a = stack * row + slice;
            let b = a + row;
            if stack != 0 {
                mesh.indices.extend_from_slice(&[a, b, a + 1]);
            }
            if stack != stacks - 1 {
                mesh.indices.extend_from_slice(&[a + 1, b, b + 1]);
            }
        }
    }
    mesh.face_ranges.push(FaceRange {
        face_index: 0,
        start_index: 0,
        end_index: mesh.indices.len() as u32,
    });
    mesh
}

/// Flip every triangle and normal, turning the mesh inside out.
pub fn reverse_winding(mesh: &mut RenderMesh) {
    for tri in mesh.indices.chunks_exact_mut(3) {
        tri.swap(1, 2);
    }
    for n in &mut mesh.normals {
        *n = -*n;
    }
}

/// Translate every vertex of a mesh.
pub fn offset_mesh(mesh: &mut RenderMesh, offset: [f64; 3]) {
    if offset == [0.0; 3] {
        return;
    }
    for chunk in mesh.vertices.chunks_mut(3) {
        if chunk.len() == 3 {
            chunk[0] = (chunk[0] as f64 + offset[0]) as f32;
            chunk[1] = (chunk[1] as f64 + offset[1]) as f32;
            chunk[2] = (chunk[2] as f64 + offset[2]) as f32;
        }
    }
}
