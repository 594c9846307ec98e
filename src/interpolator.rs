use ndarray::ArrayView3;

use crate::voxel::Voxel;

/// Tolerance for sample positions that land a rounding error outside the grid.
const EDGE_EPSILON: f64 = 1e-6;

pub(crate) struct Interpolator;

impl Interpolator {
    /// Trilinear interpolation of `data` at the continuous index `p`.
    ///
    /// Returns `None` when `p` lies outside `[0, extent - 1]` on any axis,
    /// which callers treat as zero fill.
    #[inline]
    pub(crate) fn trilinear<T: Voxel>(data: &ArrayView3<T>, p: [f64; 3]) -> Option<f64> {
        let (d0, d1, d2) = data.dim();
        let (x0, x1, xd) = Self::neighbours(p[0], d0)?;
        let (y0, y1, yd) = Self::neighbours(p[1], d1)?;
        let (z0, z1, zd) = Self::neighbours(p[2], d2)?;

        let v = |x: usize, y: usize, z: usize| data[[x, y, z]].to_f64();

        let c00 = v(x0, y0, z0).mul_add(1.0 - xd, v(x1, y0, z0) * xd);
        let c01 = v(x0, y0, z1).mul_add(1.0 - xd, v(x1, y0, z1) * xd);
        let c10 = v(x0, y1, z0).mul_add(1.0 - xd, v(x1, y1, z0) * xd);
        let c11 = v(x0, y1, z1).mul_add(1.0 - xd, v(x1, y1, z1) * xd);

        let c0 = c00.mul_add(1.0 - yd, c10 * yd);
        let c1 = c01.mul_add(1.0 - yd, c11 * yd);

        Some(c0.mul_add(1.0 - zd, c1 * zd))
    }

    /// Lower and upper sample index around `x` plus the fractional offset.
    #[inline]
    fn neighbours(x: f64, extent: usize) -> Option<(usize, usize, f64)> {
        let max = extent.checked_sub(1)? as f64;
        if !(x >= -EDGE_EPSILON && x <= max + EDGE_EPSILON) {
            return None;
        }
        let x = x.clamp(0.0, max);
        let lower = x.floor() as usize;
        let upper = (lower + 1).min(extent - 1);
        Some((lower, upper, x - lower as f64))
    }

    /// Turn samples into cubic B-spline coefficients in place, with mirror
    /// boundary conditions, so that the spline passes through every sample.
    pub(crate) fn bspline_coefficients(c: &mut [f64]) {
        let n = c.len();
        if n < 2 {
            return;
        }

        let z = 3f64.sqrt() - 2.0;
        let lambda = (1.0 - z) * (1.0 - 1.0 / z);
        c.iter_mut().for_each(|v| *v *= lambda);

        c[0] = Self::causal_initial_coefficient(c, z);
        for k in 1..n {
            c[k] += z * c[k - 1];
        }

        c[n - 1] = (z / (z * z - 1.0)) * (z * c[n - 2] + c[n - 1]);
        for k in (0..n - 1).rev() {
            c[k] = z * (c[k + 1] - c[k]);
        }
    }

    fn causal_initial_coefficient(c: &[f64], z: f64) -> f64 {
        let n = c.len();
        let horizon = (1e-12f64.ln() / z.abs().ln()).ceil() as usize;

        if horizon < n {
            let mut zn = z;
            let mut sum = c[0];
            for &value in &c[1..horizon] {
                sum += zn * value;
                zn *= z;
            }
            return sum;
        }

        let iz = 1.0 / z;
        let mut zn = z;
        let mut z2n = z.powi(n as i32 - 1);
        let mut sum = c[0] + z2n * c[n - 1];
        z2n *= z2n * iz;
        for &value in &c[1..n - 1] {
            sum += (zn + z2n) * value;
            zn *= z;
            z2n *= iz;
        }
        sum / (1.0 - zn * zn)
    }

    /// Evaluate the cubic B-spline with coefficients `c` at position `x`.
    #[inline]
    pub(crate) fn bspline_sample(c: &[f64], x: f64) -> f64 {
        let n = c.len();
        if n == 1 {
            return c[0];
        }

        let base = x.floor();
        let t = x - base;
        let base = base as isize;
        let one_minus_t = 1.0 - t;
        let t2 = t * t;
        let t3 = t2 * t;

        let weights = [
            one_minus_t * one_minus_t * one_minus_t / 6.0,
            (3.0 * t3 - 6.0 * t2 + 4.0) / 6.0,
            (-3.0 * t3 + 3.0 * t2 + 3.0 * t + 1.0) / 6.0,
            t3 / 6.0,
        ];

        weights
            .iter()
            .enumerate()
            .map(|(k, w)| w * c[Self::mirror(base - 1 + k as isize, n)])
            .sum()
    }

    #[inline]
    fn mirror(index: isize, n: usize) -> usize {
        let period = 2 * (n as isize - 1);
        let index = index.rem_euclid(period);
        if index >= n as isize {
            (period - index) as usize
        } else {
            index as usize
        }
    }

    /// Source position sampled by output index `o` when a lane of `source`
    /// samples is stretched to `target` samples, with the end points aligned.
    #[inline]
    pub(crate) fn source_position(o: usize, source: usize, target: usize) -> f64 {
        if source < 2 || target < 2 {
            return 0.0;
        }
        o as f64 * (source - 1) as f64 / (target - 1) as f64
    }
}
