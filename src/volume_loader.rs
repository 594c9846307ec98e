use crate::{
    classifier::{Calibration, ClassRangeTable},
    enums::SortBy,
    volume::Volume,
};

use dicom::{
    object::{FileDicomObject, InMemDicomObject, open_file},
    pixeldata::{ConvertOptions, ModalityLutOption, PixelDecoder, VoiLutOption},
};
use dicom_dictionary_std::tags;
use ndarray::{Array2, Array3, s};
use std::{fs, path::Path};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum VolumeLoaderError {
    #[error("No valid DICOM images found")]
    NoValidImages,

    #[error("Inconsistent image dimensions")]
    InconsistentDimensions,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("DICOM error: {0}")]
    Dicom(#[from] dicom::object::ReadError),
}

/// Stored samples of one image together with the calibration that turns
/// them into Hounsfield units.
#[derive(Debug, Clone, PartialEq)]
pub struct RawSlice {
    pub samples: Array2<f32>,
    pub calibration: Calibration,
}

impl RawSlice {
    pub fn new(samples: Array2<f32>, calibration: Calibration) -> Self {
        Self {
            samples,
            calibration,
        }
    }
}

/// Ordered stack of [`RawSlice`]s of equal size.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanStack {
    slices: Vec<RawSlice>,
    spacing: [f32; 3],
}

impl ScanStack {
    /// # Errors
    ///
    /// Returns an error if `slices` is empty or the slices differ in size.
    pub fn new(slices: Vec<RawSlice>, spacing: [f32; 3]) -> Result<Self, VolumeLoaderError> {
        let first_dim = slices
            .first()
            .ok_or(VolumeLoaderError::NoValidImages)?
            .samples
            .dim();
        if slices.iter().any(|slice| slice.samples.dim() != first_dim) {
            return Err(VolumeLoaderError::InconsistentDimensions);
        }
        Ok(Self { slices, spacing })
    }

    pub fn slices(&self) -> &[RawSlice] {
        &self.slices
    }

    pub fn spacing(&self) -> [f32; 3] {
        self.spacing
    }

    /// Get the dimensions of the stack: slice count, rows and columns
    pub fn dim(&self) -> (usize, usize, usize) {
        let (rows, columns) = self.slices[0].samples.dim();
        (self.slices.len(), rows, columns)
    }

    /// Classify every slice with its own calibration into a label volume.
    pub fn classify(&self, table: &ClassRangeTable) -> Volume {
        let mut data = Array3::zeros(self.dim());
        for (i, slice) in self.slices.iter().enumerate() {
            data.slice_mut(s![i, .., ..])
                .assign(&table.classify(&slice.samples, slice.calibration));
        }
        Volume::with_spacing(data, self.spacing)
    }
}

pub struct VolumeLoader;

impl VolumeLoader {
    /// Load a scan stack from DICOM objects
    ///
    /// # Arguments
    ///
    /// * `dicom_objects` - Slice of DICOM file objects
    /// * `sort_by` - Method to sort the slices
    ///
    /// # Errors
    ///
    /// Returns error if no valid images found or dimensions are inconsistent
    pub fn load_from_dicom_objects(
        dicom_objects: &[FileDicomObject<InMemDicomObject>],
        sort_by: SortBy,
    ) -> Result<ScanStack, VolumeLoaderError> {
        let mut slices_with_order: Vec<_> = dicom_objects
            .iter()
            .filter_map(|dicom_object| Self::extract_slice_with_order(dicom_object, &sort_by))
            .collect();

        if slices_with_order.len() < dicom_objects.len() {
            warn!(
                skipped = dicom_objects.len() - slices_with_order.len(),
                "skipped DICOM objects without decodable pixel data"
            );
        }

        Self::sort_slices(&mut slices_with_order, sort_by);

        let slices: Vec<_> = slices_with_order
            .into_iter()
            .map(|(_, slice)| slice)
            .collect();

        let spacing = Self::get_spacing(dicom_objects).unwrap_or_else(|| {
            warn!("missing spacing information, assuming unit voxels");
            [1.0; 3]
        });

        let stack = ScanStack::new(slices, spacing)?;
        debug!(shape = ?stack.dim(), spacing = ?spacing, "loaded scan stack");
        Ok(stack)
    }

    /// Load a scan stack from file paths
    pub fn load_from_file_paths(
        paths: &[impl AsRef<Path>],
        sort_by: SortBy,
    ) -> Result<ScanStack, VolumeLoaderError> {
        let objects: Result<Vec<_>, _> =
            paths.iter().map(|path| open_file(path.as_ref())).collect();

        Self::load_from_dicom_objects(&objects?, sort_by)
    }

    /// Load a scan stack from a directory containing .dcm files
    pub fn load_from_directory(
        path: impl AsRef<Path>,
        sort_by: SortBy,
    ) -> Result<ScanStack, VolumeLoaderError> {
        let mut paths: Vec<_> = fs::read_dir(path.as_ref())?
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| {
                path.extension()
                    .and_then(|s| s.to_str())
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("dcm"))
            })
            .collect();

        if paths.is_empty() {
            return Err(VolumeLoaderError::NoValidImages);
        }
        paths.sort();

        Self::load_from_file_paths(&paths, sort_by)
    }

    fn extract_slice_with_order(
        dicom_object: &FileDicomObject<InMemDicomObject>,
        sort_by: &SortBy,
    ) -> Option<(Option<f32>, RawSlice)> {
        let order = Self::get_sort_order(dicom_object, sort_by)?;
        let samples = Self::decode_samples(dicom_object)?;
        let calibration = Self::get_calibration(dicom_object);
        Some((order, RawSlice::new(samples, calibration)))
    }

    fn get_sort_order(
        dicom_object: &FileDicomObject<InMemDicomObject>,
        sort_by: &SortBy,
    ) -> Option<Option<f32>> {
        match sort_by {
            SortBy::ImagePositionPatient => {
                let pos = dicom_object
                    .element(tags::IMAGE_POSITION_PATIENT)
                    .ok()?
                    .to_multi_float32()
                    .ok()?;
                Some(pos.get(2).copied())
            }
            SortBy::TablePosition => {
                let pos = dicom_object
                    .element(tags::TABLE_POSITION)
                    .ok()?
                    .to_float32()
                    .ok();
                Some(pos)
            }
            SortBy::InstanceNumber => {
                let num = dicom_object
                    .element(tags::INSTANCE_NUMBER)
                    .ok()?
                    .to_int::<i32>()
                    .ok()
                    .map(|n| n as f32);
                Some(num)
            }
            SortBy::None => Some(Some(0.0)),
        }
    }

    /// Stored sample values of the first frame, without any LUT applied.
    fn decode_samples(dicom_object: &FileDicomObject<InMemDicomObject>) -> Option<Array2<f32>> {
        let pixel_data = dicom_object.decode_pixel_data().ok()?;
        let options = ConvertOptions::new()
            .with_modality_lut(ModalityLutOption::None)
            .with_voi_lut(VoiLutOption::Identity);
        pixel_data
            .to_ndarray_with_options::<f32>(&options)
            .ok()
            .map(|arr| arr.slice_move(s![0, .., .., 0]))
    }

    fn get_calibration(dicom_object: &FileDicomObject<InMemDicomObject>) -> Calibration {
        let read = |tag, default: f64| {
            dicom_object
                .element(tag)
                .ok()
                .and_then(|element| element.to_float64().ok())
                .unwrap_or(default)
        };
        Calibration::new(
            read(tags::RESCALE_SLOPE, 1.0),
            read(tags::RESCALE_INTERCEPT, 0.0),
        )
    }

    fn sort_slices(slices_with_order: &mut [(Option<f32>, RawSlice)], sort_by: SortBy) {
        if !matches!(sort_by, SortBy::None) {
            slices_with_order
                .sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
        }
    }

    /// Voxel spacing along slice, row and column axes.
    fn get_spacing(dicom_objects: &[FileDicomObject<InMemDicomObject>]) -> Option<[f32; 3]> {
        dicom_objects.iter().find_map(|dicom_object| {
            let pixel_spacing = dicom_object
                .element(tags::PIXEL_SPACING)
                .ok()?
                .to_multi_float32()
                .ok()?;

            let slice_thickness = dicom_object
                .element(tags::SLICE_THICKNESS)
                .ok()?
                .to_float32()
                .ok()?;

            Some([slice_thickness, *pixel_spacing.first()?, *pixel_spacing.get(1)?])
        })
    }
}
