use image::{GrayImage, ImageBuffer, Luma};
use ndarray::{Array2, ArrayView2, Zip};
use rayon::prelude::*;

use crate::enums::Orientation;
use crate::error::{Error, Result};
use crate::volume::Volume;
use crate::{Idx3d, LabelCode};

/// Cross-sections of one orientation through the slicing index.
#[derive(Debug, Clone, PartialEq)]
pub struct SliceSet {
    pub orientation: Orientation,
    pub index: usize,
    pub base: Array2<LabelCode>,
    pub fused: Option<Array2<LabelCode>>,
    /// `fused - base`, signed so that painted-over codes stay visible.
    pub diff: Option<Array2<i16>>,
}

/// The three orthogonal [`SliceSet`]s, in the order of [`Orientation::ALL`].
#[derive(Debug, Clone, PartialEq)]
pub struct OrthogonalSlices {
    sets: [SliceSet; 3],
}

impl OrthogonalSlices {
    pub fn get(&self, orientation: Orientation) -> &SliceSet {
        &self.sets[orientation.axis()]
    }

    pub fn iter(&self) -> impl Iterator<Item = &SliceSet> {
        self.sets.iter()
    }
}

impl IntoIterator for OrthogonalSlices {
    type Item = SliceSet;
    type IntoIter = std::array::IntoIter<SliceSet, 3>;

    fn into_iter(self) -> Self::IntoIter {
        self.sets.into_iter()
    }
}

/// Index triple through the middle of a grid of shape `dim`.
pub fn midpoints(dim: Idx3d) -> Idx3d {
    (dim.0 / 2, dim.1 / 2, dim.2 / 2)
}

/// Extract the sagittal, coronal and axial cross-sections through `index`
/// from `base` and, when given, from `fused` together with their difference.
///
/// # Errors
///
/// Returns [`Error::ShapeMismatch`] if `fused` and `base` differ in shape and
/// [`Error::IndexOutOfBounds`] if a component of `index` is outside its axis.
pub fn extract_slices(
    base: &Volume,
    fused: Option<&Volume>,
    index: Idx3d,
) -> Result<OrthogonalSlices> {
    if let Some(fused) = fused {
        if fused.dim() != base.dim() {
            return Err(Error::ShapeMismatch {
                input: "fused volume".to_string(),
                expected: base.dim(),
                found: fused.dim(),
            });
        }
    }

    let indices = [index.0, index.1, index.2];
    let set = |orientation: Orientation| -> Result<SliceSet> {
        let index = indices[orientation.axis()];
        let base_slice = base.get_slice_from_axis(index, orientation)?;
        let fused_slice = fused
            .map(|fused| fused.get_slice_from_axis(index, orientation))
            .transpose()?;
        Ok(SliceSet {
            orientation,
            index,
            base: base_slice.to_owned(),
            fused: fused_slice.map(|slice| slice.to_owned()),
            diff: fused_slice.map(|slice| difference(&slice, &base_slice)),
        })
    };

    Ok(OrthogonalSlices {
        sets: [
            set(Orientation::Sagittal)?,
            set(Orientation::Coronal)?,
            set(Orientation::Axial)?,
        ],
    })
}

fn difference(fused: &ArrayView2<LabelCode>, base: &ArrayView2<LabelCode>) -> Array2<i16> {
    Zip::from(fused)
        .and(base)
        .map_collect(|&f, &b| i16::from(f) - i16::from(b))
}

impl SliceSet {
    pub fn base_image(&self, max_code: LabelCode) -> Option<GrayImage> {
        label_image(&self.base.view(), max_code)
    }

    pub fn fused_image(&self, max_code: LabelCode) -> Option<GrayImage> {
        label_image(&self.fused.as_ref()?.view(), max_code)
    }

    pub fn diff_image(&self) -> Option<GrayImage> {
        let diff = self.diff.as_ref()?;
        let peak = diff.iter().map(|d| d.unsigned_abs()).max().unwrap_or(0).max(1);
        let (height, width) = diff.dim();
        let pixel_data: Vec<u8> = diff
            .view()
            .into_par_iter()
            .map(|d| normalize_to_u8(u32::from(d.unsigned_abs()), u32::from(peak)))
            .collect();
        ImageBuffer::from_raw(width as u32, height as u32, pixel_data)
    }
}

/// Grayscale rendering of a label slice, with `max_code` mapped to white.
pub fn label_image(slice: &ArrayView2<'_, LabelCode>, max_code: LabelCode) -> Option<GrayImage> {
    let (height, width) = slice.dim();
    let max_code = u32::from(max_code.max(1));
    let pixel_data: Vec<u8> = slice
        .into_par_iter()
        .map(|&code| normalize_to_u8(u32::from(code), max_code))
        .collect();
    ImageBuffer::<Luma<u8>, Vec<u8>>::from_raw(width as u32, height as u32, pixel_data)
}

#[inline]
fn normalize_to_u8(value: u32, max: u32) -> u8 {
    (value.min(max) * 255 / max) as u8
}
