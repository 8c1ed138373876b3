use serde::Serialize;
use tracing::warn;

use figma_bridge::cache::CacheStats;
use figma_bridge::service::{ConfigSummary, ConnectionReport};
use figma_bridge::{FigmaDataService, Result};

use crate::formatting::write_output;

#[derive(Serialize)]
struct StatusOutput {
    config: ConfigSummary,
    connection: ConnectionReport,
    cache: CacheStats,
}

/// Run the status command.
pub async fn run_status(service: &FigmaDataService, connect: bool) -> Result<()> {
    if connect {
        if let Err(err) = service.connect().await {
            warn!(error = %err, "broker connection failed");
        }
    }

    write_output(&StatusOutput {
        config: service.config_summary(),
        connection: service.connection_status(),
        cache: service.cache_stats(),
    })
}
