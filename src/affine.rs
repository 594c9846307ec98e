//! Rigid reorientation of a grid around its geometric center.
//!
//! The rotation is composed as `R = Rz · Ry · Rx` from three angles given in
//! degrees. Every output voxel `o` is pulled from the source position
//! `R⁻¹ · o + offset`, where `offset = center − R⁻¹ · center` and
//! `center = shape / 2`, using trilinear interpolation. Positions outside the
//! grid produce zero.

use nalgebra::{Matrix3, Vector3};
use ndarray::{Array3, ArrayBase, Axis, Data, Ix3};
use rayon::prelude::*;
use tracing::debug;
use web_time::Instant;

use crate::Idx3d;
use crate::error::{Error, Result};
use crate::interpolator::Interpolator;
use crate::voxel::Voxel;

const SINGULAR_EPSILON: f64 = 1e-12;

/// Rotation angles in degrees around axis 0, 1 and 2.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RotationAngles {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl RotationAngles {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn is_zero(&self) -> bool {
        self.x == 0.0 && self.y == 0.0 && self.z == 0.0
    }

    pub fn matrix(&self) -> Matrix3<f64> {
        let (sx, cx) = self.x.to_radians().sin_cos();
        let (sy, cy) = self.y.to_radians().sin_cos();
        let (sz, cz) = self.z.to_radians().sin_cos();

        #[rustfmt::skip]
        let rx = Matrix3::new(
            1.0, 0.0, 0.0,
            0.0, cx, -sx,
            0.0, sx, cx,
        );
        #[rustfmt::skip]
        let ry = Matrix3::new(
            cy, 0.0, sy,
            0.0, 1.0, 0.0,
            -sy, 0.0, cy,
        );
        #[rustfmt::skip]
        let rz = Matrix3::new(
            cz, -sz, 0.0,
            sz, cz, 0.0,
            0.0, 0.0, 1.0,
        );

        rz * ry * rx
    }
}

impl From<(f64, f64, f64)> for RotationAngles {
    fn from((x, y, z): (f64, f64, f64)) -> Self {
        Self::new(x, y, z)
    }
}

impl From<[f64; 3]> for RotationAngles {
    fn from([x, y, z]: [f64; 3]) -> Self {
        Self::new(x, y, z)
    }
}

/// Inverse mapping from output to source coordinates for one resampling call.
#[derive(Clone, Debug, PartialEq)]
pub struct AffineTransform {
    matrix: Matrix3<f64>,
    inverse: Matrix3<f64>,
    offset: Vector3<f64>,
}

impl AffineTransform {
    /// Rotation by `angles` around the center of a grid of shape `dim`.
    pub fn rotation(angles: RotationAngles, dim: Idx3d) -> Result<Self> {
        let matrix = angles.matrix();
        let inverse = invert(&matrix)?;
        let center = Vector3::new(dim.0 as f64, dim.1 as f64, dim.2 as f64) / 2.0;
        let offset = center - inverse * center;
        Ok(Self {
            matrix,
            inverse,
            offset,
        })
    }

    pub fn matrix(&self) -> &Matrix3<f64> {
        &self.matrix
    }

    pub fn inverse(&self) -> &Matrix3<f64> {
        &self.inverse
    }

    pub fn offset(&self) -> Vector3<f64> {
        self.offset
    }

    #[inline]
    pub fn source_coordinate(&self, output: [f64; 3]) -> [f64; 3] {
        (self.inverse * Vector3::from(output) + self.offset).into()
    }
}

/// Rotate `data` by `angles` around its center. The result has the shape of
/// the input.
///
/// Output planes along axis 0 are computed in parallel; each voxel reads only
/// from the source grid.
pub fn rotate<S, T>(data: &ArrayBase<S, Ix3>, angles: RotationAngles) -> Result<Array3<T>>
where
    S: Data<Elem = T>,
    T: Voxel,
{
    let start = Instant::now();
    let source = data.view();
    let transform = AffineTransform::rotation(angles, source.dim())?;

    let mut output = Array3::<T>::default(source.dim());
    output
        .axis_iter_mut(Axis(0))
        .into_par_iter()
        .enumerate()
        .for_each(|(x, mut plane)| {
            for ((y, z), voxel) in plane.indexed_iter_mut() {
                let p = transform.source_coordinate([x as f64, y as f64, z as f64]);
                if let Some(value) = Interpolator::trilinear(&source, p) {
                    *voxel = T::from_f64(value);
                }
            }
        });

    debug!(
        shape = ?source.dim(),
        x = angles.x,
        y = angles.y,
        z = angles.z,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "rotated volume"
    );
    Ok(output)
}

/// Inverse of a rotation matrix.
///
/// # Errors
///
/// Returns [`Error::SingularTransform`] when the determinant vanishes.
pub fn invert(m: &Matrix3<f64>) -> Result<Matrix3<f64>> {
    let determinant = m.determinant();
    if !determinant.is_finite() || determinant.abs() < SINGULAR_EPSILON {
        return Err(Error::SingularTransform { determinant });
    }
    m.try_inverse()
        .ok_or(Error::SingularTransform { determinant })
}

#[cfg(test)]
mod tests {
    use nalgebra::{Matrix3, Vector3};
    use ndarray::Array3;

    use super::{AffineTransform, RotationAngles, invert, rotate};
    use crate::error::Error;

    fn matrix_eq(a: &Matrix3<f64>, b: &Matrix3<f64>) -> bool {
        (a - b).amax() < 1e-12
    }

    fn sample_volume() -> Array3<u8> {
        Array3::from_shape_fn((5, 6, 7), |(x, y, z)| ((x * 31 + y * 7 + z * 3) % 200) as u8)
    }

    #[test]
    fn test_zero_angles_give_identity() {
        let transform = AffineTransform::rotation(RotationAngles::default(), (4, 4, 4)).unwrap();
        assert_eq!(transform.matrix(), &Matrix3::identity());
        assert_eq!(transform.inverse(), &Matrix3::identity());
        assert_eq!(transform.offset(), Vector3::zeros());
    }

    #[test]
    fn test_matrix_composition_order() {
        // a quarter turn about axis 2 takes axis 0 onto axis 1
        let m = RotationAngles::new(0.0, 0.0, 90.0).matrix();
        let expected = Matrix3::new(0.0, -1.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0);
        assert!(matrix_eq(&m, &expected));

        let combined = RotationAngles::new(30.0, 45.0, 60.0).matrix();
        let rz = RotationAngles::new(0.0, 0.0, 60.0).matrix();
        let ry = RotationAngles::new(0.0, 45.0, 0.0).matrix();
        let rx = RotationAngles::new(30.0, 0.0, 0.0).matrix();
        assert!(matrix_eq(&combined, &(rz * ry * rx)));
        // applied right to left: x first
        assert!(!matrix_eq(&combined, &(rx * ry * rz)));
    }

    #[test]
    fn test_inverse_of_rotation() {
        let m = RotationAngles::new(90.0, 0.0, 180.0).matrix();
        let inv = invert(&m).unwrap();
        assert!(matrix_eq(&(m * inv), &Matrix3::identity()));
        assert!(matrix_eq(&inv, &m.transpose()));
    }

    #[test]
    fn test_singular_matrix_is_rejected() {
        let singular = Matrix3::new(1.0, 2.0, 3.0, 2.0, 4.0, 6.0, 0.0, 1.0, 1.0);
        assert!(matches!(
            invert(&singular),
            Err(Error::SingularTransform { .. })
        ));
    }

    #[test]
    fn test_rotate_identity() {
        let volume = sample_volume();
        let rotated = rotate(&volume, RotationAngles::default()).unwrap();
        assert_eq!(rotated, volume);
    }

    #[test]
    fn test_rotate_preserves_shape() {
        let volume = sample_volume();
        for (x, y, z) in [(90.0, 0.0, 180.0), (13.0, -47.0, 200.0), (0.0, 0.0, 45.0)] {
            let rotated = rotate(&volume, RotationAngles::new(x, y, z)).unwrap();
            assert_eq!(rotated.dim(), volume.dim());
        }
    }

    #[test]
    fn test_half_turn_about_axis_0() {
        // center (.., 2, 2): index y maps to 4 - y, so y = 0 falls outside
        let volume = Array3::from_shape_fn((2, 4, 4), |(x, y, z)| (1 + x * 16 + y * 4 + z) as u8);
        let rotated = rotate(&volume, RotationAngles::new(180.0, 0.0, 0.0)).unwrap();
        for ((x, y, z), &value) in rotated.indexed_iter() {
            if y == 0 || z == 0 {
                assert_eq!(value, 0);
            } else {
                assert_eq!(value, volume[[x, 4 - y, 4 - z]]);
            }
        }
    }

    #[test]
    fn test_rotate_float_volume_keeps_fractions() {
        let mut volume = Array3::<f32>::zeros((3, 3, 3));
        volume[[1, 1, 1]] = 1.0;
        let rotated = rotate(&volume, RotationAngles::new(0.0, 0.0, 45.0)).unwrap();
        let total: f32 = rotated.iter().sum();
        assert!(total > 0.0);
        assert!(rotated.iter().all(|&v| (0.0..=1.0).contains(&v)));
    }
}
