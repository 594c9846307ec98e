//! Resolution change with cubic B-spline interpolation, one slab at a time.
//!
//! The source is cut into slabs along axis 0. Slab `[a, b)` becomes output
//! rows `[round(a * f0), round(b * f0))`, so the assembled extent along axis 0
//! is exactly `round(n0 * f0)` whatever the slab thickness. Each slab is
//! zoomed independently to its output shape.

use ndarray::{Array3, ArrayBase, ArrayView3, Axis, Data, Ix3, Zip, s};
use rayon::prelude::*;
use tracing::debug;
use web_time::Instant;

use crate::Idx3d;
use crate::enums::ScaleFactor;
use crate::error::{Error, Result};
use crate::interpolator::Interpolator;
use crate::voxel::Voxel;

pub const DEFAULT_SLAB_THICKNESS: usize = 64;

/// Shape of `dim` zoomed by `factor`, rounding every axis to the nearest
/// integer.
pub fn target_shape(dim: Idx3d, factor: ScaleFactor) -> Result<Idx3d> {
    let factors = factor.factors();
    if factors.iter().any(|f| !f.is_finite() || *f <= 0.0) {
        return Err(Error::InvalidScaleFactor { factor: factors });
    }

    let scaled = |extent: usize, f: f64| (extent as f64 * f).round() as usize;
    let target = (
        scaled(dim.0, factors[0]),
        scaled(dim.1, factors[1]),
        scaled(dim.2, factors[2]),
    );

    let empty = |extent: usize, scaled: usize| extent > 0 && scaled == 0;
    if empty(dim.0, target.0) || empty(dim.1, target.1) || empty(dim.2, target.2) {
        return Err(Error::InvalidScaleFactor { factor: factors });
    }
    Ok(target)
}

/// Zoom `data` by `factor`, processing at most `slab_thickness` source rows
/// along axis 0 per work item.
///
/// A factor of exactly one on every axis returns a copy of the input without
/// interpolating.
pub fn rescale<S, T>(
    data: &ArrayBase<S, Ix3>,
    factor: ScaleFactor,
    slab_thickness: usize,
) -> Result<Array3<T>>
where
    S: Data<Elem = T>,
    T: Voxel,
{
    if factor.is_identity() {
        return Ok(data.to_owned());
    }

    let start = Instant::now();
    let source = data.view();
    let dim = source.dim();
    let target = target_shape(dim, factor)?;
    let f0 = factor.factors()[0];
    let thickness = slab_thickness.max(1);

    let slabs: Vec<(usize, usize, usize, usize)> = (0..dim.0)
        .step_by(thickness)
        .map(|begin| {
            let end = (begin + thickness).min(dim.0);
            let out_begin = ((begin as f64 * f0).round() as usize).min(target.0);
            let out_end = if end == dim.0 {
                target.0
            } else {
                ((end as f64 * f0).round() as usize).min(target.0)
            };
            (begin, end, out_begin, out_end.max(out_begin))
        })
        .filter(|&(_, _, out_begin, out_end)| out_end > out_begin)
        .collect();

    // consecutive slabs own consecutive, disjoint runs of output rows
    let mut output = Array3::<T>::default(target);
    let mut rest = output.view_mut();
    let mut work = Vec::with_capacity(slabs.len());
    for &(begin, end, out_begin, out_end) in &slabs {
        let (rows, tail) = rest.split_at(Axis(0), out_end - out_begin);
        work.push((begin..end, rows));
        rest = tail;
    }

    work.into_par_iter().for_each(|(range, mut rows)| {
        let slab = source.slice(s![range, .., ..]);
        let zoomed = zoom_to(&slab, rows.dim());
        Zip::from(&mut rows)
            .and(&zoomed)
            .for_each(|out, &value| *out = T::from_f64(value));
    });

    debug!(
        from = ?dim,
        to = ?target,
        slabs = slabs.len(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "rescaled volume"
    );
    Ok(output)
}

/// Separable cubic B-spline zoom of one slab to `shape`.
fn zoom_to<T: Voxel>(slab: &ArrayView3<T>, shape: Idx3d) -> Array3<f64> {
    let mut current = slab.mapv(|v| v.to_f64());
    for (axis, extent) in [(2, shape.2), (1, shape.1), (0, shape.0)] {
        if current.len_of(Axis(axis)) != extent {
            current = zoom_axis(&current, Axis(axis), extent);
        }
    }
    current
}

fn zoom_axis(input: &Array3<f64>, axis: Axis, extent: usize) -> Array3<f64> {
    let source_len = input.len_of(axis);
    let mut shape = input.raw_dim();
    shape[axis.index()] = extent;
    let mut output = Array3::<f64>::zeros(shape);

    let mut coefficients = vec![0.0; source_len];
    Zip::from(input.lanes(axis))
        .and(output.lanes_mut(axis))
        .for_each(|lane, mut out| {
            coefficients
                .iter_mut()
                .zip(lane.iter())
                .for_each(|(c, &v)| *c = v);
            Interpolator::bspline_coefficients(&mut coefficients);
            for (o, value) in out.iter_mut().enumerate() {
                let x = Interpolator::source_position(o, source_len, extent);
                *value = Interpolator::bspline_sample(&coefficients, x);
            }
        });
    output
}

#[cfg(test)]
mod tests {
    use ndarray::{Array3, Axis};

    use super::{rescale, target_shape};
    use crate::enums::ScaleFactor;
    use crate::error::Error;

    fn sample_volume() -> Array3<u8> {
        Array3::from_shape_fn((10, 6, 4), |(x, y, z)| (x * 10 + y * 3 + z) as u8)
    }

    #[test]
    fn test_target_shape_rounds() {
        assert_eq!(target_shape((5, 4, 3), ScaleFactor::Uniform(0.5)).unwrap(), (3, 2, 2));
        assert_eq!(
            target_shape((10, 10, 10), ScaleFactor::PerAxis([2.0, 1.0, 0.25])).unwrap(),
            (20, 10, 3)
        );
    }

    #[test]
    fn test_invalid_factors() {
        for factor in [0.0, -1.0, f64::NAN, f64::INFINITY, 0.01] {
            assert!(matches!(
                target_shape((10, 10, 10), ScaleFactor::Uniform(factor)),
                Err(Error::InvalidScaleFactor { .. })
            ));
        }
    }

    #[test]
    fn test_unit_factor_is_noop() {
        let volume = sample_volume();
        assert_eq!(rescale(&volume, ScaleFactor::Uniform(1.0), 3).unwrap(), volume);
        assert_eq!(
            rescale(&volume, ScaleFactor::PerAxis([1.0; 3]), 3).unwrap(),
            volume
        );
    }

    #[test]
    fn test_slab_assembly_extent() {
        let volume = sample_volume();
        // slabs of 3 rows at 0.55 give 2 + 1 + 2 + 1 output rows
        let scaled = rescale(&volume, ScaleFactor::Uniform(0.55), 3).unwrap();
        assert_eq!(scaled.dim(), (6, 3, 2));

        for thickness in [1, 2, 4, 7, 64] {
            let scaled = rescale(&volume, ScaleFactor::PerAxis([1.3, 1.0, 1.0]), thickness).unwrap();
            assert_eq!(scaled.len_of(Axis(0)), 13);
        }
    }

    #[test]
    fn test_slabs_land_on_their_output_rows() {
        // each slab of two source rows holds one constant value
        let volume = Array3::from_shape_fn((6, 3, 3), |(x, _, _)| (x / 2 * 10 + 1) as u8);
        let scaled = rescale(&volume, ScaleFactor::PerAxis([2.0, 1.0, 1.0]), 2).unwrap();
        assert_eq!(scaled.dim(), (12, 3, 3));
        for (row, plane) in scaled.axis_iter(Axis(0)).enumerate() {
            let expected = (row / 4 * 10 + 1) as u8;
            assert!(plane.iter().all(|&v| v == expected), "row {row}");
        }
    }

    #[test]
    fn test_constant_volume_stays_constant() {
        let volume = Array3::<u8>::from_elem((6, 5, 4), 7);
        let scaled = rescale(&volume, ScaleFactor::Uniform(2.0), 2).unwrap();
        assert_eq!(scaled.dim(), (12, 10, 8));
        assert!(scaled.iter().all(|&v| v == 7));
    }

    #[test]
    fn test_in_plane_samples_are_kept() {
        let volume = Array3::from_shape_fn((2, 3, 4), |(_, _, z)| (z * 10) as f32);
        let scaled = rescale(&volume, ScaleFactor::PerAxis([1.0, 1.0, 1.75]), 64).unwrap();
        assert_eq!(scaled.dim(), (2, 3, 7));
        for (o, expected) in [(0, 0.0), (2, 10.0), (4, 20.0), (6, 30.0)] {
            assert!((scaled[[1, 2, o]] - expected).abs() < 1e-4);
        }
    }
}
