//! CombinationEngine: preview and final unions of two solids.

use shape_kernel::{BuildStatus, Kernel, SolidHandle};
use tracing::{info, instrument, warn};

use crate::measure::measure;
use crate::transform::{Axis, SeparationInputs, SeparationPolicy, Transform};
use crate::types::{CombinationError, CombinationResult, CombinationStage, CombinedSolid};

/// Fuse `a` and `b` twice: once with `b` displaced by `separation` for
/// preview, once in place for the final result.
///
/// Both inputs are consumed and released. The preview is built first;
/// if it fails the final union is still attempted and the preview error
/// is kept on the result. A failed final union fails the whole call.
#[instrument(skip_all, fields(separation = ?separation.vector()))]
pub fn combine(
    kernel: &mut dyn Kernel,
    a: SolidHandle,
    b: SolidHandle,
    separation: &Transform,
) -> Result<CombinationResult, CombinationError> {
    let preview = build_preview(kernel, &a, &b, separation);
    let final_ = build_union(kernel, &a, &b, CombinationStage::Final);
    kernel.release(a);
    kernel.release(b);

    let final_ = match final_ {
        Ok(final_) => final_,
        Err(e) => {
            if let Ok(preview) = preview {
                kernel.release(preview.solid);
            }
            warn!(error = %e, "final union failed");
            return Err(e);
        }
    };

    let (preview, preview_error) = match preview {
        Ok(preview) => (Some(preview), None),
        Err(e) => {
            warn!(error = %e, "preview union failed; continuing with final");
            (None, Some(e))
        }
    };

    info!(
        final_volume = final_.measurement.volume,
        preview = preview.is_some(),
        "combined"
    );
    Ok(CombinationResult {
        preview,
        preview_error,
        final_,
    })
}

/// Separation for a preview of `a` and `b` under `policy`.
pub fn preview_separation(
    kernel: &dyn Kernel,
    policy: &SeparationPolicy,
    axis: Axis,
    a: &SolidHandle,
    b: &SolidHandle,
) -> Transform {
    let inputs = SeparationInputs {
        first: measure(kernel, a),
        second: measure(kernel, b),
        first_bounds: kernel
            .bounding_box(a)
            .unwrap_or_else(|_| shape_kernel::BoundingBox::empty()),
        second_bounds: kernel
            .bounding_box(b)
            .unwrap_or_else(|_| shape_kernel::BoundingBox::empty()),
    };
    policy.resolve(axis, &inputs)
}

fn build_preview(
    kernel: &mut dyn Kernel,
    a: &SolidHandle,
    b: &SolidHandle,
    separation: &Transform,
) -> Result<CombinedSolid, CombinationError> {
    let moved = kernel
        .translate(b, separation.vector())
        .map_err(|source| CombinationError::Kernel {
            stage: CombinationStage::Preview,
            source,
        })?;
    let preview = build_union(kernel, a, &moved, CombinationStage::Preview);
    kernel.release(moved);
    preview
}

fn build_union(
    kernel: &mut dyn Kernel,
    a: &SolidHandle,
    b: &SolidHandle,
    stage: CombinationStage,
) -> Result<CombinedSolid, CombinationError> {
    let build = kernel
        .boolean_union(a, b)
        .map_err(|source| CombinationError::Kernel { stage, source })?;
    if build.status != BuildStatus::Done {
        kernel.release(build.solid);
        return Err(CombinationError::NotDone { stage });
    }
    let measurement = measure(kernel, &build.solid);
    Ok(CombinedSolid {
        solid: build.solid,
        measurement,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::load;
    use crate::transform::translation_along;
    use shape_kernel::{MockKernel, MockShape};

    fn two_cubes(kernel: &mut MockKernel) -> (SolidHandle, SolidHandle) {
        kernel.register_document(b"a".to_vec(), vec![MockShape::block([0.0; 3], [1.0; 3])]);
        kernel.register_document(b"b".to_vec(), vec![MockShape::block([1.0, 0.0, 0.0], [1.0; 3])]);
        let a = load(kernel, "a", b"a").unwrap();
        let b = load(kernel, "b", b"b").unwrap();
        (a, b)
    }

    #[test]
    fn both_unions_are_built_and_measured() {
        let mut kernel = MockKernel::new();
        let (a, b) = two_cubes(&mut kernel);
        let result = combine(&mut kernel, a, b, &translation_along(Axis::X, 100.0)).unwrap();

        let preview = result.preview.unwrap();
        assert_eq!(preview.measurement.volume, 2.0);
        assert_eq!(result.final_.measurement.volume, 2.0);
        assert!(result.preview_error.is_none());
        assert_eq!(kernel.union_count(), 2);

        // Only the two results are still alive
        assert_eq!(kernel.live_solids(), 2);
        kernel.release(preview.solid);
        kernel.release(result.final_.solid);
        assert_eq!(kernel.live_solids(), 0);
    }

    #[test]
    fn preview_failure_is_not_fatal() {
        let mut kernel = MockKernel::new();
        let (a, b) = two_cubes(&mut kernel);
        kernel.queue_union_status(BuildStatus::NotDone);

        let result = combine(&mut kernel, a, b, &translation_along(Axis::X, 100.0)).unwrap();
        assert!(result.preview.is_none());
        assert_eq!(
            result.preview_error.as_ref().map(|e| e.stage()),
            Some(CombinationStage::Preview)
        );
        assert_eq!(result.final_.measurement.volume, 2.0);
        kernel.release(result.final_.solid);
        assert_eq!(kernel.live_solids(), 0);
    }

    #[test]
    fn final_failure_is_fatal_and_releases_everything() {
        let mut kernel = MockKernel::new();
        let (a, b) = two_cubes(&mut kernel);
        kernel.queue_union_status(BuildStatus::Done);
        kernel.queue_union_status(BuildStatus::NotDone);

        let err = combine(&mut kernel, a, b, &Transform::identity()).unwrap_err();
        assert_eq!(err.stage(), CombinationStage::Final);
        assert!(matches!(err, CombinationError::NotDone { .. }));
        assert_eq!(kernel.live_solids(), 0);
    }

    #[test]
    fn overlapping_inputs_fuse_below_the_sum() {
        let mut kernel = MockKernel::new();
        kernel.register_document(b"cube".to_vec(), vec![MockShape::block([0.0; 3], [1.0; 3])]);
        let a = load(&mut kernel, "a", b"cube").unwrap();
        let b = load(&mut kernel, "b", b"cube").unwrap();

        let result = combine(&mut kernel, a, b, &translation_along(Axis::Y, 3.0)).unwrap();
        let preview = result.preview.unwrap();
        assert_eq!(preview.measurement.volume, 2.0);
        assert_eq!(result.final_.measurement.volume, 1.0);
        assert_eq!(result.final_.measurement.surface_area, 6.0);
        kernel.release(preview.solid);
        kernel.release(result.final_.solid);
    }

    #[test]
    fn separation_from_bounding_extent() {
        let mut kernel = MockKernel::new();
        let (a, b) = two_cubes(&mut kernel);
        let t = preview_separation(
            &kernel,
            &SeparationPolicy::BoundingExtent { margin: 0.5 },
            Axis::X,
            &a,
            &b,
        );
        assert_eq!(t.vector(), [0.5, 0.0, 0.0]);
    }
}
