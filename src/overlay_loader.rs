use std::{
    fs,
    path::{Path, PathBuf},
};

use ndarray::{Array3, ArrayBase, Data, Ix3};
use nifti::{IntoNdArray, NiftiObject, ReaderOptions};
use thiserror::Error;
use tracing::{debug, info};

use crate::LabelCode;
use crate::affine;
use crate::config::OverlayOptions;
use crate::fusion::{LabelPolicy, OverlayMask};

#[derive(Debug, Error)]
pub enum OverlayLoaderError {
    #[error("No NIfTI files found")]
    NoOverlays,

    #[error("Expected a 3D volume, found dimensions {0:?}")]
    NotVolumetric(Vec<usize>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("NIfTI error: {0}")]
    Nifti(#[from] nifti::NiftiError),

    #[error(transparent)]
    Core(#[from] crate::Error),
}

/// Reads segmentation volumes and brings them into the frame of the scan.
#[derive(Debug, Clone, Default)]
pub struct OverlayLoader {
    options: OverlayOptions,
}

impl OverlayLoader {
    pub fn new(options: OverlayOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &OverlayOptions {
        &self.options
    }

    /// Indicator grid of a `.nii` or `.nii.gz` file in file axis order: 1 for
    /// selected voxels and 0 elsewhere.
    pub fn indicator_from_file(
        &self,
        path: impl AsRef<Path>,
    ) -> Result<Array3<f32>, OverlayLoaderError> {
        let obj = ReaderOptions::new().read_file(path.as_ref())?;
        let data = obj.into_volume().into_ndarray::<f32>()?;
        let dim = data.shape().to_vec();
        if dim.len() < 3 || dim[3..].iter().any(|&d| d != 1) {
            return Err(OverlayLoaderError::NotVolumetric(dim));
        }

        // [x, y, z] with x varying fastest -> [z, y, x] in standard layout
        let reversed: Vec<usize> = (0..dim.len()).rev().collect();
        let samples = data
            .permuted_axes(reversed.as_slice())
            .as_standard_layout()
            .into_owned()
            .into_raw_vec();

        let indicator = Array3::from_shape_vec((dim[2], dim[1], dim[0]), samples)
            .map_err(|_| OverlayLoaderError::NotVolumetric(dim.clone()))?
            .permuted_axes([2, 1, 0])
            .mapv(|sample| self.indicator_value(f64::from(sample)));
        Ok(indicator)
    }

    #[inline]
    fn indicator_value(&self, sample: f64) -> f32 {
        let selected = match self.options.label_value {
            Some(label) => sample == label,
            None => sample != 0.0,
        };
        if selected { 1.0 } else { 0.0 }
    }

    /// Permute and rotate an indicator grid, then keep every voxel that
    /// received any weight.
    pub fn prepare<S>(
        &self,
        name: impl Into<String>,
        indicator: &ArrayBase<S, Ix3>,
        code: LabelCode,
    ) -> Result<OverlayMask, OverlayLoaderError>
    where
        S: Data<Elem = f32>,
    {
        self.options.validate()?;
        let permuted = indicator.view().permuted_axes(self.options.permutation);
        let rotated = affine::rotate(&permuted, self.options.rotation)?;
        Ok(OverlayMask::from_nonzero(name, &rotated, code))
    }

    /// Load one overlay painting `code`, named after its file.
    pub fn load(
        &self,
        path: impl AsRef<Path>,
        code: LabelCode,
    ) -> Result<OverlayMask, OverlayLoaderError> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        let indicator = self.indicator_from_file(path)?;
        let overlay = self.prepare(name, &indicator, code)?;
        debug!(
            overlay = overlay.name(),
            code,
            shape = ?overlay.dim(),
            voxels = overlay.voxel_count(),
            "loaded overlay"
        );
        Ok(overlay)
    }

    /// Load every `.nii` / `.nii.gz` file of `path` in file name order,
    /// assigning codes upwards from the policy's overlay minimum.
    pub fn load_directory(
        &self,
        path: impl AsRef<Path>,
        policy: &LabelPolicy,
    ) -> Result<Vec<OverlayMask>, OverlayLoaderError> {
        let mut paths: Vec<PathBuf> = fs::read_dir(path.as_ref())?
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| is_nifti(path))
            .collect();

        if paths.is_empty() {
            return Err(OverlayLoaderError::NoOverlays);
        }
        paths.sort();

        let codes = policy.overlay_codes(paths.len())?;
        info!(count = paths.len(), first_code = codes[0], "loading overlays");
        paths
            .iter()
            .zip(codes)
            .map(|(path, code)| self.load(path, code))
            .collect()
    }
}

fn is_nifti(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(|name| name.to_ascii_lowercase())
        .is_some_and(|name| name.ends_with(".nii") || name.ends_with(".nii.gz"))
}
