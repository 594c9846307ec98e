//! # label-fusion
//!
//! This crate turns a CT scan and a set of organ segmentations into a single
//! labeled 3D grid that can be inspected slice by slice or shipped as a
//! compact run-length stream.
//!
//! The scan is loaded from DICOM files, each sample is calibrated to
//! Hounsfield units with the slice's rescale slope and intercept, and is then
//! quantized into tissue classes through a [`ClassRangeTable`]. Segmentations
//! are read from NIfTI files, reoriented into the frame of the scan and
//! painted onto the tissue grid with codes reserved by a [`LabelPolicy`].
//! The grids can be sliced along the three medical axes:
//!  - Sagittal (axis 0)
//!  - Coronal (axis 1)
//!  - Axial (axis 2)
//!
//! The heavy kernels (classification, rotation with trilinear interpolation,
//! cubic B-spline rescaling and painting) run in parallel using rayon.
//! DICOM files are assumed to have the following attributes:
//!   - No multiframe (always the first frame is used)
//!   - Images from the same series and acquisition
//!
//! # Examples
//!
//! ## Fusing a scan with its segmentations
//!
//! ```no_run
//! # use label_fusion::{FusionPipeline, PipelineConfig, SortBy, VolumeLoader};
//! let pipeline = FusionPipeline::new(PipelineConfig::default())
//!     .expect("default configuration should be valid");
//! let stack = VolumeLoader::load_from_directory("dicom", SortBy::ImagePositionPatient)
//!     .expect("should have loaded files from directory");
//! let base = pipeline.classify(&stack);
//! let overlays = pipeline
//!     .overlay_loader()
//!     .load_directory("nifti", &pipeline.config().labels)
//!     .expect("should have loaded segmentations");
//! let output = pipeline
//!     .run(&base, &overlays, None)
//!     .expect("segmentations should match the scan");
//! let bytes = pipeline.export(&output.fused);
//! ```
//!
//! ## Working on label grids directly
//!
//! ```
//! # use label_fusion::{fuse, extract_slices, LabelPolicy, OverlayMask, Orientation, Volume};
//! # use ndarray::Array3;
//! let base = Volume::filled((4, 4, 4), 2);
//! let mut mask = Array3::from_elem((4, 4, 4), false);
//! mask[[1, 1, 1]] = true;
//! let overlay = OverlayMask::new("lesion", mask, 7);
//!
//! let fused = fuse(&base, &[overlay], &LabelPolicy::default()).unwrap();
//! let slices = extract_slices(&base, Some(&fused), (1, 1, 1)).unwrap();
//! let sagittal = slices.get(Orientation::Sagittal);
//! assert_eq!(sagittal.fused.as_ref().unwrap()[[1, 1]], 7);
//! ```

pub mod affine;
pub mod classifier;
pub mod config;
pub mod enums;
pub mod error;
pub mod fusion;
mod interpolator;
pub mod overlay_loader;
pub mod pipeline;
pub mod rescale;
pub mod rle;
pub mod slices;
pub mod volume;
pub mod volume_loader;
pub mod voxel;

/// Index triple `(i, j, k)` into a 3D grid.
pub type Idx3d = (usize, usize, usize);

/// Class code stored in a label volume.
pub type LabelCode = u8;

pub use affine::{AffineTransform, RotationAngles, rotate};
pub use classifier::{Calibration, ClassRange, ClassRangeTable};
pub use config::{OverlayOptions, PipelineConfig};
pub use enums::{Orientation, ScaleFactor, SortBy};
pub use error::{Error, Result};
pub use fusion::{LabelPolicy, OverlayMask, fuse};
pub use overlay_loader::{OverlayLoader, OverlayLoaderError};
pub use pipeline::{FusionOutput, FusionPipeline};
pub use rescale::rescale;
pub use slices::{OrthogonalSlices, SliceSet, extract_slices};
pub use volume::Volume;
pub use volume_loader::{RawSlice, ScanStack, VolumeLoader, VolumeLoaderError};
pub use voxel::Voxel;
