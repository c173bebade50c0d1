//! Verification oracles: pure functions returning pass/fail verdicts.
//!
//! Each oracle returns an `OracleVerdict` with diagnostic detail, not panics.
//! This lets a test collect all failures in one pass.

use std::collections::HashMap;

use base64::Engine;
use model_pipeline::{Measurement, MeshRef};

/// The result of a single oracle check.
#[derive(Debug, Clone)]
pub struct OracleVerdict {
    pub oracle_name: String,
    pub passed: bool,
    pub detail: String,
    pub value: Option<f64>,
}

impl OracleVerdict {
    fn pass(name: &str, detail: String) -> Self {
        Self {
            oracle_name: name.to_string(),
            passed: true,
            detail,
            value: None,
        }
    }

    fn verdict_val(name: &str, passed: bool, detail: String, value: f64) -> Self {
        Self {
            oracle_name: name.to_string(),
            passed,
            detail,
            value: Some(value),
        }
    }

    fn fail(name: &str, detail: String) -> Self {
        Self {
            oracle_name: name.to_string(),
            passed: false,
            detail,
            value: None,
        }
    }
}

pub type Triangle = [[f32; 3]; 3];

// ── Mesh reference decoding ─────────────────────────────────────────────────

/// Decode the triangles of a `data:model/stl;base64,` mesh reference.
pub fn decode_stl_data_uri(mesh: &MeshRef) -> Result<Vec<Triangle>, String> {
    let payload = mesh
        .uri
        .strip_prefix("data:model/stl;base64,")
        .ok_or_else(|| format!("not an STL data URI: {:.40}", mesh.uri))?;
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(payload)
        .map_err(|e| e.to_string())?;
    if bytes.len() < 84 {
        return Err(format!("STL too short: {} bytes", bytes.len()));
    }
    let count = u32::from_le_bytes([bytes[80], bytes[81], bytes[82], bytes[83]]) as usize;
    if bytes.len() != 84 + count * 50 {
        return Err(format!(
            "STL length {} does not match {} triangles",
            bytes.len(),
            count
        ));
    }

    let f = |at: usize| f32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]]);
    Ok((0..count)
        .map(|t| {
            // Skip the 12-byte normal
            let base = 84 + t * 50 + 12;
            let mut tri = [[0.0f32; 3]; 3];
            for (v, corner) in tri.iter_mut().enumerate() {
                for (c, value) in corner.iter_mut().enumerate() {
                    *value = f(base + (v * 3 + c) * 4);
                }
            }
            tri
        })
        .collect())
}

// ── Measurement Oracles ─────────────────────────────────────────────────────

/// Check a measured quantity against an expected value within a relative tolerance.
pub fn check_close(name: &str, actual: f64, expected: f64, rel_tol: f64) -> OracleVerdict {
    let err = (actual - expected).abs() / expected.abs().max(1e-12);
    OracleVerdict::verdict_val(
        name,
        err <= rel_tol,
        format!(
            "expected {:.6}, got {:.6} (rel err {:.2e}, tol {:.2e})",
            expected, actual, err, rel_tol
        ),
        actual,
    )
}

/// Check that both readings are non-negative and finite.
pub fn check_non_negative(m: &Measurement) -> OracleVerdict {
    let ok = |v: f64| v.is_finite() && v >= 0.0;
    if ok(m.volume) && ok(m.surface_area) {
        OracleVerdict::pass("non_negative", format!("{:?}", m))
    } else {
        OracleVerdict::fail("non_negative", format!("negative or non-finite: {:?}", m))
    }
}

/// Disjoint union: volume adds up, area does not grow past the sum.
pub fn check_union_monotone(
    first: &Measurement,
    second: &Measurement,
    union: &Measurement,
    rel_tol: f64,
) -> Vec<OracleVerdict> {
    let sum_area = first.surface_area + second.surface_area;
    vec![
        check_close(
            "union_volume_additive",
            union.volume,
            first.volume + second.volume,
            rel_tol,
        ),
        OracleVerdict::verdict_val(
            "union_area_bounded",
            union.surface_area <= sum_area * (1.0 + rel_tol),
            format!("union area {:.6} vs sum {:.6}", union.surface_area, sum_area),
            union.surface_area,
        ),
    ]
}

// ── Mesh Oracles ────────────────────────────────────────────────────────────

/// Check that the reference's triangle count matches its payload.
pub fn check_mesh_ref(mesh: &MeshRef) -> OracleVerdict {
    match decode_stl_data_uri(mesh) {
        Ok(tris) if tris.len() == mesh.triangle_count => OracleVerdict::pass(
            "mesh_ref",
            format!("{} triangles", mesh.triangle_count),
        ),
        Ok(tris) => OracleVerdict::fail(
            "mesh_ref",
            format!(
                "reference claims {} triangles, payload has {}",
                mesh.triangle_count,
                tris.len()
            ),
        ),
        Err(e) => OracleVerdict::fail("mesh_ref", e),
    }
}

/// Check that every edge is shared by exactly two triangles.
pub fn check_watertight(triangles: &[Triangle]) -> OracleVerdict {
    // Quantize vertex positions to allow position-based matching
    fn quantize(p: [f32; 3]) -> (i64, i64, i64) {
        let q = |v: f32| (v as f64 * 10000.0).round() as i64;
        (q(p[0]), q(p[1]), q(p[2]))
    }

    type PosEdge = ((i64, i64, i64), (i64, i64, i64));

    fn make_edge(a: (i64, i64, i64), b: (i64, i64, i64)) -> PosEdge {
        if a <= b {
            (a, b)
        } else {
            (b, a)
        }
    }

    let mut edge_counts: HashMap<PosEdge, usize> = HashMap::new();
    for tri in triangles {
        let [a, b, c] = tri.map(quantize);
        for edge in [make_edge(a, b), make_edge(b, c), make_edge(c, a)] {
            *edge_counts.entry(edge).or_insert(0) += 1;
        }
    }

    let non_paired = edge_counts.values().filter(|&&c| c != 2).count();
    if non_paired == 0 {
        OracleVerdict::pass(
            "watertight_mesh",
            format!("all {} edges paired", edge_counts.len()),
        )
    } else {
        OracleVerdict::fail(
            "watertight_mesh",
            format!(
                "{} unpaired edges out of {} total",
                non_paired,
                edge_counts.len()
            ),
        )
    }
}

/// Check that no triangle has (near) zero area.
pub fn check_no_degenerate_triangles(triangles: &[Triangle]) -> OracleVerdict {
    let degenerate = triangles
        .iter()
        .filter(|[a, b, c]| {
            let e1 = [b[0] - a[0], b[1] - a[1], b[2] - a[2]];
            let e2 = [c[0] - a[0], c[1] - a[1], c[2] - a[2]];
            let n = [
                e1[1] * e2[2] - e1[2] * e2[1],
                e1[2] * e2[0] - e1[0] * e2[2],
                e1[0] * e2[1] - e1[1] * e2[0],
            ];
            (n[0] * n[0] + n[1] * n[1] + n[2] * n[2]).sqrt() < 1e-10
        })
        .count();
    if degenerate == 0 {
        OracleVerdict::pass("no_degenerate_triangles", format!("{} triangles", triangles.len()))
    } else {
        OracleVerdict::fail(
            "no_degenerate_triangles",
            format!("{} of {} triangles degenerate", degenerate, triangles.len()),
        )
    }
}

// ── Composite ───────────────────────────────────────────────────────────────

/// Run every mesh check on a mesh reference.
pub fn run_mesh_checks(mesh: &MeshRef) -> Vec<OracleVerdict> {
    let mut verdicts = vec![check_mesh_ref(mesh)];
    if let Ok(tris) = decode_stl_data_uri(mesh) {
        verdicts.push(check_watertight(&tris));
        verdicts.push(check_no_degenerate_triangles(&tris));
    }
    verdicts
}
