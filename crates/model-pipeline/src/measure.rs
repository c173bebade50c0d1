//! PropertyExtractor: volume and surface area of a solid.

use shape_kernel::{Kernel, KernelError, SolidHandle};
use tracing::{instrument, warn};

use crate::types::Measurement;

/// Measure a solid. Pure: the handle is only read.
///
/// Never fails. A degenerate solid, or one the kernel cannot measure,
/// reads as zero.
#[instrument(skip(kernel, solid))]
pub fn measure(kernel: &dyn Kernel, solid: &SolidHandle) -> Measurement {
    Measurement {
        volume: sanitize("volume", kernel.volume_of(solid)),
        surface_area: sanitize("surface_area", kernel.surface_area_of(solid)),
    }
}

fn sanitize(quantity: &'static str, reading: Result<f64, KernelError>) -> f64 {
    match reading {
        Ok(value) if value.is_finite() && value >= 0.0 => value,
        Ok(value) => {
            warn!(quantity, value, "kernel reading clamped to zero");
            0.0
        }
        Err(e) => {
            warn!(quantity, error = %e, "kernel could not measure solid");
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use shape_kernel::{MockKernel, MockShape};

    fn ball(kernel: &mut MockKernel) -> SolidHandle {
        kernel.register_document(b"ball".to_vec(), vec![MockShape::ball([0.0; 3], 1.0)]);
        crate::loader::load(kernel, "ball", b"ball").unwrap()
    }

    #[test]
    fn unit_ball() {
        let mut kernel = MockKernel::new();
        let solid = ball(&mut kernel);
        let m = measure(&kernel, &solid);
        assert_relative_eq!(m.volume, 4.0 / 3.0 * std::f64::consts::PI, epsilon = 1e-12);
        assert_relative_eq!(m.surface_area, 4.0 * std::f64::consts::PI, epsilon = 1e-12);
    }

    #[test]
    fn measuring_twice_is_bit_identical() {
        let mut kernel = MockKernel::new();
        let solid = ball(&mut kernel);
        let first = measure(&kernel, &solid);
        let second = measure(&kernel, &solid);
        assert_eq!(first.volume.to_bits(), second.volume.to_bits());
        assert_eq!(first.surface_area.to_bits(), second.surface_area.to_bits());
    }

    #[test]
    fn unknown_solid_reads_zero() {
        let mut kernel = MockKernel::new();
        let solid = ball(&mut kernel);
        let other = MockKernel::new();
        assert_eq!(measure(&other, &solid), Measurement::default());
    }

    #[test]
    fn bad_readings_are_clamped() {
        assert_eq!(sanitize("volume", Ok(-1.0)), 0.0);
        assert_eq!(sanitize("volume", Ok(f64::NAN)), 0.0);
        assert_eq!(sanitize("volume", Ok(f64::INFINITY)), 0.0);
        assert_eq!(sanitize("volume", Ok(2.5)), 2.5);
    }
}
