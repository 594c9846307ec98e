use ndarray::{Array3, ArrayBase, Data, Ix3, Zip};
use tracing::debug;

use crate::error::{Error, Result};
use crate::voxel::Voxel;
use crate::volume::Volume;
use crate::{Idx3d, LabelCode};

/// Reserved label codes.
///
/// Overlays may only paint codes at or above `overlay_min`, which keeps them
/// apart from background and from unlabeled tissue.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LabelPolicy {
    pub background: LabelCode,
    pub unlabeled: LabelCode,
    pub overlay_min: LabelCode,
}

impl Default for LabelPolicy {
    fn default() -> Self {
        Self {
            background: 0,
            unlabeled: 1,
            overlay_min: 2,
        }
    }
}

impl LabelPolicy {
    pub fn with_overlay_min(overlay_min: LabelCode) -> Self {
        Self {
            overlay_min,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.background == self.unlabeled {
            return Err(Error::CodeCollision {
                code: self.background,
                reason: "the unlabeled code".to_string(),
            });
        }
        for (code, name) in [(self.background, "background"), (self.unlabeled, "unlabeled")] {
            if code >= self.overlay_min {
                return Err(Error::CodeCollision {
                    code,
                    reason: format!(
                        "the overlay range starting at {} (used as {name} code)",
                        self.overlay_min
                    ),
                });
            }
        }
        Ok(())
    }

    pub fn check_overlay_code(&self, code: LabelCode) -> Result<()> {
        if code < self.overlay_min {
            return Err(Error::InvalidOverlayCode {
                code,
                minimum: self.overlay_min,
            });
        }
        Ok(())
    }

    /// Codes for `count` overlays, assigned in order from `overlay_min`.
    pub fn overlay_codes(&self, count: usize) -> Result<Vec<LabelCode>> {
        (0..count)
            .map(|i| {
                LabelCode::try_from(self.overlay_min as usize + i).map_err(|_| {
                    Error::InvalidOverlayCode {
                        code: LabelCode::MAX,
                        minimum: self.overlay_min,
                    }
                })
            })
            .collect()
    }
}

/// Indicator grid of one segmentation plus the code it paints.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayMask {
    name: String,
    mask: Array3<bool>,
    code: LabelCode,
}

impl OverlayMask {
    pub fn new(name: impl Into<String>, mask: Array3<bool>, code: LabelCode) -> Self {
        Self {
            name: name.into(),
            mask,
            code,
        }
    }

    /// Mask of every non-zero voxel of `data`.
    pub fn from_nonzero<S, T>(
        name: impl Into<String>,
        data: &ArrayBase<S, Ix3>,
        code: LabelCode,
    ) -> Self
    where
        S: Data<Elem = T>,
        T: Voxel,
    {
        let mask = Zip::from(data).par_map_collect(|v| v.to_f64() != 0.0);
        Self::new(name, mask, code)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mask(&self) -> &Array3<bool> {
        &self.mask
    }

    pub fn code(&self) -> LabelCode {
        self.code
    }

    pub fn dim(&self) -> Idx3d {
        self.mask.dim()
    }

    pub fn voxel_count(&self) -> usize {
        self.mask.iter().filter(|&&set| set).count()
    }
}

/// Paint `overlays` onto a copy of `base`, in order. A later overlay
/// overwrites both the base and every earlier overlay where its mask is set.
///
/// # Errors
///
/// Returns [`Error::ShapeMismatch`] naming the first overlay whose shape
/// differs from the base, or [`Error::InvalidOverlayCode`] if an overlay
/// paints a reserved code. Nothing is painted in either case.
pub fn fuse(base: &Volume, overlays: &[OverlayMask], policy: &LabelPolicy) -> Result<Volume> {
    for (i, overlay) in overlays.iter().enumerate() {
        if overlay.dim() != base.dim() {
            return Err(Error::ShapeMismatch {
                input: format!("overlay #{i} ({})", overlay.name),
                expected: base.dim(),
                found: overlay.dim(),
            });
        }
        policy.check_overlay_code(overlay.code)?;
    }

    let mut fused = base.clone();
    for overlay in overlays {
        let code = overlay.code;
        Zip::from(fused.data_mut())
            .and(&overlay.mask)
            .par_for_each(|voxel, &set| {
                if set {
                    *voxel = code;
                }
            });
        debug!(
            overlay = overlay.name(),
            code,
            voxels = overlay.voxel_count(),
            "painted overlay"
        );
    }
    Ok(fused)
}

#[cfg(test)]
mod tests {
    use ndarray::Array3;

    use super::{LabelPolicy, OverlayMask, fuse};
    use crate::Idx3d;
    use crate::error::Error;
    use crate::volume::Volume;

    fn single_voxel(dim: Idx3d, at: Idx3d, code: u8) -> OverlayMask {
        let mut mask = Array3::from_elem(dim, false);
        mask[at] = true;
        OverlayMask::new(format!("voxel {at:?}"), mask, code)
    }

    #[test]
    fn test_overlay_paints_only_its_mask() {
        let base = Volume::filled((4, 4, 4), 2);
        let overlay = single_voxel((4, 4, 4), (1, 1, 1), 7);
        let fused = fuse(&base, &[overlay], &LabelPolicy::default()).unwrap();
        for (index, &code) in fused.data().indexed_iter() {
            assert_eq!(code, if index == (1, 1, 1) { 7 } else { 2 });
        }
        // the base is left untouched
        assert!(base.data().iter().all(|&code| code == 2));
    }

    #[test]
    fn test_last_overlay_wins() {
        let base = Volume::filled((3, 3, 3), 3);
        let first = OverlayMask::new("first", Array3::from_elem((3, 3, 3), true), 5);
        let second = single_voxel((3, 3, 3), (2, 0, 1), 9);
        let policy = LabelPolicy::default();

        let fused = fuse(&base, &[first.clone(), second.clone()], &policy).unwrap();
        assert_eq!(fused.data()[[2, 0, 1]], 9);
        assert_eq!(fused.data()[[0, 0, 0]], 5);

        let fused = fuse(&base, &[second, first], &policy).unwrap();
        assert_eq!(fused.data()[[2, 0, 1]], 5);
    }

    #[test]
    fn test_no_overlays_copies_base() {
        let base = Volume::filled((2, 3, 4), 4);
        assert_eq!(fuse(&base, &[], &LabelPolicy::default()).unwrap(), base);
    }

    #[test]
    fn test_shape_mismatch_names_overlay() {
        let base = Volume::filled((4, 4, 4), 2);
        let overlays = [
            single_voxel((4, 4, 4), (0, 0, 0), 3),
            single_voxel((4, 4, 5), (0, 0, 0), 4),
        ];
        match fuse(&base, &overlays, &LabelPolicy::default()) {
            Err(Error::ShapeMismatch {
                input,
                expected,
                found,
            }) => {
                assert!(input.starts_with("overlay #1"));
                assert_eq!(expected, (4, 4, 4));
                assert_eq!(found, (4, 4, 5));
            }
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[test]
    fn test_reserved_codes_are_rejected() {
        let base = Volume::filled((2, 2, 2), 0);
        for code in [0, 1] {
            let overlay = single_voxel((2, 2, 2), (0, 0, 0), code);
            assert!(matches!(
                fuse(&base, &[overlay], &LabelPolicy::default()),
                Err(Error::InvalidOverlayCode { .. })
            ));
        }
        let strict = LabelPolicy::with_overlay_min(6);
        assert!(fuse(&base, &[single_voxel((2, 2, 2), (0, 0, 0), 5)], &strict).is_err());
    }

    #[test]
    fn test_policy_validation() {
        assert!(LabelPolicy::default().validate().is_ok());
        assert!(LabelPolicy::with_overlay_min(1).validate().is_err());
        let same = LabelPolicy {
            background: 0,
            unlabeled: 0,
            overlay_min: 2,
        };
        assert!(same.validate().is_err());
    }

    #[test]
    fn test_overlay_codes_are_sequential() {
        let policy = LabelPolicy::with_overlay_min(6);
        assert_eq!(policy.overlay_codes(3).unwrap(), vec![6, 7, 8]);
        assert!(LabelPolicy::with_overlay_min(254).overlay_codes(3).is_err());
    }

    #[test]
    fn test_mask_from_nonzero() {
        let mut data = Array3::<f32>::zeros((2, 2, 2));
        data[[0, 1, 1]] = 0.25;
        data[[1, 0, 0]] = -3.0;
        let overlay = OverlayMask::from_nonzero("liver", &data, 4);
        assert_eq!(overlay.voxel_count(), 2);
        assert!(overlay.mask()[[0, 1, 1]]);
        assert_eq!(overlay.code(), 4);
        assert_eq!(overlay.name(), "liver");
    }
}
