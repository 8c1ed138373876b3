use figma_bridge::figma::ImageFormat;
use figma_bridge::thumbnails::ThumbnailOptions;
use figma_bridge::{FigmaDataService, Result};

use crate::formatting::write_output;

/// Run the thumbnails command.
pub async fn run_thumbnails(
    service: &FigmaDataService,
    key: &str,
    ids: &[String],
    format: ImageFormat,
    scale: f32,
    batch_size: usize,
) -> Result<()> {
    let options = ThumbnailOptions {
        format,
        scale,
        batch_size,
        ..ThumbnailOptions::default()
    };

    let result = service.get_thumbnails(key, ids, options).await?;
    if !result.errors.is_empty() {
        eprintln!(
            "{} of {} node(s) failed; see \"errors\"",
            result.errors.len(),
            result.errors.len() + result.images.len()
        );
    }
    write_output(&result)
}
