use std::{fs, path::PathBuf};

use label_fusion::{FusionPipeline, PipelineConfig, SortBy, VolumeLoader};
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = tracing_subscriber::fmt::layer().with_target(true);
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}

/// Usage: `label-fusion [dicom-dir] [nifti-dir] [out-dir]`
fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let mut args = std::env::args().skip(1).map(PathBuf::from);
    let dicom_dir = args.next().unwrap_or_else(|| PathBuf::from("dicom"));
    let nifti_dir = args.next().unwrap_or_else(|| PathBuf::from("nifti"));
    let out_dir = args.next().unwrap_or_else(|| PathBuf::from("."));
    fs::create_dir_all(&out_dir)?;

    let pipeline = FusionPipeline::new(PipelineConfig::default())?;
    let stack = VolumeLoader::load_from_directory(&dicom_dir, SortBy::ImagePositionPatient)?;
    let base = pipeline.classify(&stack);
    let overlays = pipeline
        .overlay_loader()
        .load_directory(&nifti_dir, &pipeline.config().labels)?;

    let output = pipeline.run(&base, &overlays, None)?;
    let max_code = output.fused.max_code();

    for set in output.slices.iter() {
        let name = set.orientation.name();
        let images = [
            ("base", set.base_image(max_code)),
            ("fused", set.fused_image(max_code)),
            ("diff", set.diff_image()),
        ];
        for (kind, image) in images {
            if let Some(image) = image {
                let path = out_dir.join(format!("{name}_{kind}.png"));
                image.save(&path)?;
                info!(path = %path.display(), "wrote slice");
            }
        }
    }

    let rle_path = out_dir.join("fused.rle");
    fs::write(&rle_path, pipeline.export(&output.fused))?;
    info!(path = %rle_path.display(), shape = ?output.fused.dim(), "wrote run-length stream");

    Ok(())
}
