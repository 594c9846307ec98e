/// Element types the resamplers can read from and write back to.
///
/// Interpolation always runs in `f64`. Integer types convert back by rounding
/// half away from zero and saturating at the type bounds; float types keep
/// the interpolated value as is.
pub trait Voxel: Copy + Default + PartialEq + Send + Sync + 'static {
    fn to_f64(self) -> f64;
    fn from_f64(value: f64) -> Self;
}

macro_rules! impl_voxel_int {
    ($($t:ty),*) => {
        $(
            impl Voxel for $t {
                #[inline]
                fn to_f64(self) -> f64 {
                    self as f64
                }

                #[inline]
                fn from_f64(value: f64) -> Self {
                    // `as` saturates and maps NaN to zero
                    value.round() as $t
                }
            }
        )*
    };
}

impl_voxel_int!(u8, u16, u32, i8, i16, i32);

impl Voxel for f32 {
    #[inline]
    fn to_f64(self) -> f64 {
        self as f64
    }

    #[inline]
    fn from_f64(value: f64) -> Self {
        value as f32
    }
}

impl Voxel for f64 {
    #[inline]
    fn to_f64(self) -> f64 {
        self
    }

    #[inline]
    fn from_f64(value: f64) -> Self {
        value
    }
}
