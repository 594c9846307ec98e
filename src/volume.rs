use crate::affine::{self, RotationAngles};
use crate::enums::{Orientation, ScaleFactor};
use crate::error::{Error, Result};
use crate::rescale;
use crate::rle::{self, Token};
use crate::{Idx3d, LabelCode};

use ndarray::{Array3, ArrayView2, Axis, s};

/// Dense grid of class codes indexed `(i, j, k)`.
///
/// `spacing` holds the physical size of a voxel along each grid axis and is
/// carried along by the geometric operations.
#[derive(Debug, Clone, PartialEq)]
pub struct Volume {
    data: Array3<LabelCode>,
    spacing: [f32; 3],
}

impl Default for Volume {
    fn default() -> Self {
        Self::new(Array3::default((0, 0, 0)))
    }
}

impl Volume {
    pub fn new(data: Array3<LabelCode>) -> Self {
        Self::with_spacing(data, [1.0; 3])
    }

    pub fn with_spacing(data: Array3<LabelCode>, spacing: [f32; 3]) -> Self {
        Self { data, spacing }
    }

    /// Volume of shape `dim` filled with `code`.
    pub fn filled(dim: Idx3d, code: LabelCode) -> Self {
        Self::new(Array3::from_elem(dim, code))
    }

    /// Get the dimensions of the volume along axis 0, 1 and 2
    pub fn dim(&self) -> Idx3d {
        self.data.dim()
    }

    pub fn spacing(&self) -> [f32; 3] {
        self.spacing
    }

    /// Get a reference to the underlying data
    pub fn data(&self) -> &Array3<LabelCode> {
        &self.data
    }

    /// Get a mutable reference to the underlying data
    pub fn data_mut(&mut self) -> &mut Array3<LabelCode> {
        &mut self.data
    }

    pub fn into_data(self) -> Array3<LabelCode> {
        self.data
    }

    pub fn max_code(&self) -> LabelCode {
        self.data.iter().copied().max().unwrap_or(0)
    }

    /// Cross-section fixing the axis of `orientation` at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IndexOutOfBounds`] if `index` is outside that axis.
    pub fn get_slice_from_axis(
        &self,
        index: usize,
        orientation: Orientation,
    ) -> Result<ArrayView2<'_, LabelCode>> {
        let axis = orientation.axis();
        let extent = self.data.len_of(Axis(axis));
        if index >= extent {
            return Err(Error::IndexOutOfBounds {
                axis,
                index,
                extent,
            });
        }
        Ok(self.data.index_axis(Axis(axis), index))
    }

    /// Rotate around the grid center, see [`affine::rotate`].
    pub fn rotate(&self, angles: RotationAngles) -> Result<Volume> {
        let data = affine::rotate(&self.data, angles)?;
        Ok(Self::with_spacing(data, self.spacing))
    }

    /// Change resolution, see [`rescale::rescale`]. Voxel spacing shrinks by
    /// the same factor.
    pub fn rescale(&self, factor: ScaleFactor, slab_thickness: usize) -> Result<Volume> {
        let data = rescale::rescale(&self.data, factor, slab_thickness)?;
        let factors = factor.factors();
        let spacing = [
            self.spacing[0] / factors[0] as f32,
            self.spacing[1] / factors[1] as f32,
            self.spacing[2] / factors[2] as f32,
        ];
        Ok(Self::with_spacing(data, spacing))
    }

    /// Smallest sub-volume enclosing every non-zero voxel, or `None` if all
    /// voxels are background.
    pub fn crop_to_content(&self) -> Option<Volume> {
        let mut low = [usize::MAX; 3];
        let mut high = [0usize; 3];
        for ((i, j, k), _) in self.data.indexed_iter().filter(|(_, code)| **code != 0) {
            for (axis, index) in [i, j, k].into_iter().enumerate() {
                low[axis] = low[axis].min(index);
                high[axis] = high[axis].max(index + 1);
            }
        }
        if low[0] == usize::MAX {
            return None;
        }

        let cropped = self
            .data
            .slice(s![low[0]..high[0], low[1]..high[1], low[2]..high[2]])
            .to_owned();
        Some(Self::with_spacing(cropped, self.spacing))
    }

    /// Run-length encode the codes in row-major order.
    pub fn encode_rle(&self) -> Vec<Token> {
        let codes: Vec<LabelCode> = self.data.iter().copied().collect();
        rle::encode(&codes)
    }

    /// Rebuild a volume of shape `dim` from [`Volume::encode_rle`] output.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedRleStream`] if the stream does not decode to
    /// exactly `dim` codes.
    pub fn decode_rle(tokens: &[Token], dim: Idx3d) -> Result<Volume> {
        let codes: Vec<LabelCode> = rle::decode_as(tokens)?;
        let expected = dim.0 * dim.1 * dim.2;
        if codes.len() != expected {
            return Err(Error::MalformedRleStream {
                position: tokens.len(),
                reason: format!("decoded {} codes, expected {expected}", codes.len()),
            });
        }
        Array3::from_shape_vec(dim, codes)
            .map(Self::new)
            .map_err(|e| Error::MalformedRleStream {
                position: tokens.len(),
                reason: e.to_string(),
            })
    }
}

impl From<Array3<LabelCode>> for Volume {
    fn from(data: Array3<LabelCode>) -> Self {
        Self::new(data)
    }
}

#[cfg(test)]
mod tests {
    use ndarray::{Array3, array};

    use super::Volume;
    use crate::affine::RotationAngles;
    use crate::enums::{Orientation, ScaleFactor};
    use crate::error::Error;

    fn sample_volume() -> Volume {
        Volume::new(Array3::from_shape_fn((3, 4, 5), |(i, j, k)| (i * 20 + j * 5 + k) as u8))
    }

    #[test]
    fn test_slices_follow_view_axes() {
        let volume = sample_volume();
        let sagittal = volume.get_slice_from_axis(1, Orientation::Sagittal).unwrap();
        assert_eq!(sagittal.dim(), (4, 5));
        assert_eq!(sagittal[[2, 3]], 33);

        let coronal = volume.get_slice_from_axis(2, Orientation::Coronal).unwrap();
        assert_eq!(coronal.dim(), (3, 5));
        assert_eq!(coronal[[1, 4]], 34);

        let axial = volume.get_slice_from_axis(4, Orientation::Axial).unwrap();
        assert_eq!(axial.dim(), (3, 4));
        assert_eq!(axial[[2, 1]], 49);
    }

    #[test]
    fn test_slice_index_out_of_bounds() {
        let volume = sample_volume();
        assert_eq!(
            volume.get_slice_from_axis(5, Orientation::Axial),
            Err(Error::IndexOutOfBounds {
                axis: 2,
                index: 5,
                extent: 5
            })
        );
        assert!(volume.get_slice_from_axis(3, Orientation::Sagittal).is_err());
    }

    #[test]
    fn test_rotate_and_rescale_keep_spacing_consistent() {
        let volume = Volume::with_spacing(Array3::from_elem((4, 4, 4), 3), [2.0, 1.0, 1.0]);
        let rotated = volume.rotate(RotationAngles::default()).unwrap();
        assert_eq!(rotated, volume);

        let scaled = volume
            .rescale(ScaleFactor::PerAxis([2.0, 1.0, 1.0]), 2)
            .unwrap();
        assert_eq!(scaled.dim(), (8, 4, 4));
        assert_eq!(scaled.spacing(), [1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_crop_to_content() {
        let mut data = Array3::<u8>::zeros((5, 5, 5));
        data[[1, 2, 3]] = 4;
        data[[3, 2, 1]] = 6;
        let cropped = Volume::new(data).crop_to_content().unwrap();
        assert_eq!(cropped.dim(), (3, 1, 3));
        assert_eq!(cropped.data()[[0, 0, 2]], 4);
        assert_eq!(cropped.data()[[2, 0, 0]], 6);

        assert_eq!(Volume::filled((2, 2, 2), 0).crop_to_content(), None);
    }

    #[test]
    fn test_rle_round_trip_through_volume() {
        let volume = Volume::new(array![[[2, 2, 2], [2, 7, 2]], [[0, 0, 0], [0, 0, 1]]]);
        let tokens = volume.encode_rle();
        assert_eq!(tokens, vec![2, -3, 7, 2, 0, -4, 1]);
        assert_eq!(Volume::decode_rle(&tokens, volume.dim()).unwrap(), volume);

        assert!(matches!(
            Volume::decode_rle(&tokens, (2, 2, 2)),
            Err(Error::MalformedRleStream { .. })
        ));
    }
}
