//! End-to-end fusion of a classified scan with its segmentations.

use tracing::{info, info_span};
use web_time::Instant;

use crate::config::PipelineConfig;
use crate::enums::ScaleFactor;
use crate::error::Result;
use crate::fusion::{self, OverlayMask};
use crate::overlay_loader::OverlayLoader;
use crate::rle;
use crate::slices::{self, OrthogonalSlices};
use crate::volume::Volume;
use crate::volume_loader::ScanStack;
use crate::Idx3d;

/// Result of [`FusionPipeline::run`].
#[derive(Debug, Clone, PartialEq)]
pub struct FusionOutput {
    pub fused: Volume,
    /// Index triple the slices were taken through.
    pub index: Idx3d,
    pub slices: OrthogonalSlices,
}

#[derive(Debug, Clone)]
pub struct FusionPipeline {
    config: PipelineConfig,
}

impl FusionPipeline {
    /// # Errors
    ///
    /// Returns the first inconsistency found by [`PipelineConfig::validate`].
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Loader that reorients overlays the way this pipeline expects them.
    pub fn overlay_loader(&self) -> OverlayLoader {
        OverlayLoader::new(self.config.overlay)
    }

    pub fn classify(&self, stack: &ScanStack) -> Volume {
        let _span = info_span!("classify", shape = ?stack.dim()).entered();
        stack.classify(&self.config.ranges)
    }

    /// Rescale with the configured slab thickness.
    pub fn rescale(&self, volume: &Volume, factor: ScaleFactor) -> Result<Volume> {
        volume.rescale(factor, self.config.slab_thickness)
    }

    /// Fuse `overlays` onto `base` and slice both grids through `index`, or
    /// through the grid midpoints when no index is given.
    pub fn run(
        &self,
        base: &Volume,
        overlays: &[OverlayMask],
        index: Option<Idx3d>,
    ) -> Result<FusionOutput> {
        let _span = info_span!("fusion", overlays = overlays.len()).entered();
        let start = Instant::now();

        let fused = fusion::fuse(base, overlays, &self.config.labels)?;
        let index = index.unwrap_or_else(|| slices::midpoints(base.dim()));
        let slices = slices::extract_slices(base, Some(&fused), index)?;

        info!(
            shape = ?base.dim(),
            index = ?index,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "fused volume"
        );
        Ok(FusionOutput {
            fused,
            index,
            slices,
        })
    }

    /// Run-length encoded codes of `volume` as little-endian bytes.
    pub fn export(&self, volume: &Volume) -> Vec<u8> {
        rle::to_bytes(&volume.encode_rle())
    }
}

#[cfg(test)]
mod tests {
    use ndarray::Array3;

    use super::FusionPipeline;
    use crate::config::PipelineConfig;
    use crate::enums::Orientation;
    use crate::error::Error;
    use crate::fusion::{LabelPolicy, OverlayMask};
    use crate::rle;
    use crate::volume::Volume;

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = PipelineConfig {
            labels: LabelPolicy::default(),
            ..PipelineConfig::default()
        };
        assert!(matches!(
            FusionPipeline::new(config),
            Err(Error::CodeCollision { .. })
        ));
    }

    #[test]
    fn test_run_defaults_to_midpoints() {
        let pipeline = FusionPipeline::new(PipelineConfig::default()).unwrap();
        let base = Volume::filled((4, 6, 8), 3);
        let mut mask = Array3::from_elem((4, 6, 8), false);
        mask[[2, 3, 4]] = true;
        let overlay = OverlayMask::new("tumor", mask, 6);

        let output = pipeline.run(&base, &[overlay], None).unwrap();
        assert_eq!(output.index, (2, 3, 4));
        for set in output.slices.iter() {
            let diff = set.diff.as_ref().unwrap();
            assert_eq!(diff.iter().filter(|&&d| d == 3).count(), 1);
        }
        let axial = output.slices.get(Orientation::Axial);
        assert_eq!(axial.fused.as_ref().unwrap()[[2, 3]], 6);
    }

    #[test]
    fn test_export_round_trips() {
        let pipeline = FusionPipeline::new(PipelineConfig::default()).unwrap();
        let volume = Volume::new(Array3::from_shape_fn((2, 3, 4), |(i, j, _)| (i + j) as u8));
        let bytes = pipeline.export(&volume);
        let tokens = rle::from_bytes(&bytes).unwrap();
        assert_eq!(Volume::decode_rle(&tokens, volume.dim()).unwrap(), volume);
    }
}
