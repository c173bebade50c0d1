//! Primitive builders on top of truck's sweep API, and a STEP writer.
//!
//! truck has no built-in box or sphere, so both are successive sweeps.
//! These produce real exchange documents for fixtures and demos.

use std::f64::consts::PI;

use truck_modeling::builder;
use truck_modeling::topology::{Solid, Wire};
use truck_modeling::{Point3, Rad, Vector3};
use truck_stepio::out::{CompleteStepDisplay, StepHeaderDescriptor, StepModel};

use crate::step_records::{first_record, hash_refs, records, renumber};
use crate::types::KernelError;

/// Create a box solid via successive translational sweeps.
/// One corner at `origin`, extending by `size` along +x, +y, +z.
pub fn make_box(origin: [f64; 3], size: [f64; 3]) -> Solid {
    let v = builder::vertex(Point3::new(origin[0], origin[1], origin[2]));
    let edge = builder::tsweep(&v, Vector3::new(size[0], 0.0, 0.0));
    let face = builder::tsweep(&edge, Vector3::new(0.0, size[1], 0.0));
    builder::tsweep(&face, Vector3::new(0.0, 0.0, size[2]))
}

/// Create a sphere solid: a pole-to-pole arc revolved about the polar axis.
pub fn make_sphere(center: [f64; 3], radius: f64) -> Result<Solid, KernelError> {
    if !(radius > 0.0) {
        return Err(KernelError::Other {
            message: format!("sphere radius must be positive, got {}", radius),
        });
    }
    let c = Point3::new(center[0], center[1], center[2]);

    // Meridian in the XZ plane from the north pole through (r,0,0) to the south pole
    let north = builder::vertex(c + Vector3::new(0.0, 0.0, radius));
    let meridian: Wire = builder::rsweep(&north, c, Vector3::unit_y(), Rad(PI));

    let shell = builder::cone(&meridian, Vector3::unit_z(), Rad(2.0 * PI));
    Solid::try_new(vec![shell]).map_err(|e| KernelError::Other {
        message: format!("sphere shell is not a closed solid: {}", e),
    })
}

/// Serialize a solid as a STEP document.
pub fn step_document(solid: &Solid) -> String {
    let header = StepHeaderDescriptor {
        organization_system: "shape-kernel".to_owned(),
        ..Default::default()
    };
    CompleteStepDisplay::new(StepModel::from(&solid.compress()), header).to_string()
}

/// Serialize `outer` with each of `voids` cut out as a cavity.
///
/// truck writes one shell per solid, so the documents are merged record by
/// record and a `BREP_WITH_VOIDS` ties the outer shell to the void shells.
pub fn step_document_with_voids(outer: &Solid, voids: &[Solid]) -> Result<String, KernelError> {
    let base = step_document(outer);
    let missing = |what: &str| KernelError::Other {
        message: format!("STEP document has no {}", what),
    };
    let outer_shell = first_record(&base, "CLOSED_SHELL").ok_or_else(|| missing("closed shell"))?;
    let data_end = base.rfind("ENDSEC;").ok_or_else(|| missing("data section"))?;
    let mut next_id = records(&base)
        .flat_map(|(id, body)| std::iter::once(id).chain(hash_refs(body)))
        .max()
        .unwrap_or(0);

    let mut extra = String::new();
    let mut oriented = Vec::with_capacity(voids.len());
    for void in voids {
        let doc = step_document(void);
        let start = doc.find("DATA;").ok_or_else(|| missing("data section"))? + "DATA;".len();
        let end = doc.rfind("ENDSEC;").ok_or_else(|| missing("data section"))?;
        let data = renumber(&doc[start..end], next_id);
        let shell = first_record(&data, "CLOSED_SHELL").ok_or_else(|| missing("closed shell"))?;
        next_id = records(&data).map(|(id, _)| id).max().unwrap_or(next_id) + 1;

        extra.push_str(data.trim());
        extra.push_str(&format!(
            "\n#{} = ORIENTED_CLOSED_SHELL('', *, #{}, .F.);\n",
            next_id, shell
        ));
        oriented.push(format!("#{}", next_id));
    }
    let brep = next_id + 1;
    extra.push_str(&format!(
        "#{} = BREP_WITH_VOIDS('', #{}, ({}));\n",
        brep,
        outer_shell,
        oriented.join(", ")
    ));

    let mut out = String::with_capacity(base.len() + extra.len());
    out.push_str(&base[..data_end]);
    out.push_str(&extra);
    out.push_str(&base[data_end..]);
    Ok(out)
}
