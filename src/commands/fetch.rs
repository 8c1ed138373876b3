use std::sync::Arc;

use figma_bridge::aggregate::{FetchProgress, ProgressCallback};
use figma_bridge::{FigmaDataService, Result};

use crate::formatting::write_output;

/// Run the file command.
pub async fn run_file(service: &FigmaDataService, key: &str) -> Result<()> {
    let file = service.get_file(key).await?;
    if file.is_mock() {
        eprintln!("Warning: all transports failed; showing placeholder data");
    }
    write_output(&file)
}

/// Run the all command.
pub async fn run_all(service: &FigmaDataService, key: &str, verbose: bool) -> Result<()> {
    let progress: Option<ProgressCallback> = if verbose {
        Some(Arc::new(|p: &FetchProgress| {
            eprintln!("[{:>3}%] {}/{} resources", p.percent(), p.completed(), FetchProgress::TOTAL)
        }))
    } else {
        None
    };

    let result = service.get_all_figma_data(key, progress).await?;
    write_output(&result)
}
