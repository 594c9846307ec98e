use crate::affine::RotationAngles;
use crate::classifier::ClassRangeTable;
use crate::error::{Error, Result};
use crate::fusion::LabelPolicy;
use crate::rescale::DEFAULT_SLAB_THICKNESS;

/// Geometry that brings a segmentation into the frame of the scan.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OverlayOptions {
    /// Source axis for each output axis, as for `permuted_axes`.
    pub permutation: [usize; 3],
    pub rotation: RotationAngles,
    /// Voxel value marking the segmented structure. `None` selects every
    /// non-zero voxel.
    pub label_value: Option<f64>,
}

impl Default for OverlayOptions {
    fn default() -> Self {
        Self {
            permutation: [2, 0, 1],
            rotation: RotationAngles::new(90.0, 0.0, 180.0),
            label_value: Some(1.0),
        }
    }
}

impl OverlayOptions {
    pub fn validate(&self) -> Result<()> {
        let mut seen = [false; 3];
        for &axis in &self.permutation {
            if axis >= 3 || seen[axis] {
                return Err(Error::InvalidPermutation {
                    permutation: self.permutation,
                });
            }
            seen[axis] = true;
        }
        Ok(())
    }
}

/// Everything the fusion pipeline needs besides the volumes themselves.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PipelineConfig {
    pub ranges: ClassRangeTable,
    pub labels: LabelPolicy,
    pub slab_thickness: usize,
    pub overlay: OverlayOptions,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            ranges: ClassRangeTable::ct_tissue(),
            // the tissue table uses codes 0 to 5
            labels: LabelPolicy::with_overlay_min(6),
            slab_thickness: DEFAULT_SLAB_THICKNESS,
            overlay: OverlayOptions::default(),
        }
    }
}

impl PipelineConfig {
    /// Check that the label policy is consistent and that no tissue code can
    /// be mistaken for an overlay.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CodeCollision`] for overlapping codes and
    /// [`Error::InvalidPermutation`] for an invalid axis permutation.
    pub fn validate(&self) -> Result<()> {
        self.labels.validate()?;
        self.overlay.validate()?;
        if let Some(code) = self.ranges.codes().find(|&c| c >= self.labels.overlay_min) {
            return Err(Error::CodeCollision {
                code,
                reason: format!(
                    "the overlay range starting at {}",
                    self.labels.overlay_min
                ),
            });
        }
        Ok(())
    }
}
