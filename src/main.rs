mod cli;
mod commands;
mod formatting;

use std::process::ExitCode;

use cli::Commands;
use commands::{run_all, run_file, run_status, run_thumbnails};
use figma_bridge::config::BridgeConfig;
use figma_bridge::figma::FigmaAuth;
use figma_bridge::logging::init_tracing;
use figma_bridge::FigmaDataService;
use formatting::render_error;

#[tokio::main]
async fn main() -> ExitCode {
    run().await
}

async fn run() -> ExitCode {
    let args = cli::parse();

    let (mut config, warnings) = match BridgeConfig::load_with_warnings(args.config.as_deref()) {
        Ok(loaded) => loaded,
        Err(err) => return render_error(&err),
    };
    if let Some(transport) = args.transport {
        config.service.transport = Some(transport);
    }

    let level = if args.verbose {
        "debug"
    } else {
        config.broker.log_level.as_str()
    };
    init_tracing(level);
    for warning in warnings {
        tracing::warn!(%warning, "ignoring environment override");
    }

    let service = match FigmaDataService::from_bridge_config(&config, FigmaAuth::from_env()) {
        Ok(service) => service,
        Err(err) => return render_error(&err),
    };

    let outcome = match args.command {
        Commands::Status { connect } => run_status(&service, connect).await,
        Commands::File { key } => run_file(&service, &key).await,
        Commands::Thumbnails {
            key,
            ids,
            format,
            scale,
            batch_size,
        } => run_thumbnails(&service, &key, &ids, format, scale, batch_size).await,
        Commands::All { key } => run_all(&service, &key, args.verbose).await,
    };
    service.disconnect();

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => render_error(&err),
    }
}
