//! figma-bridge
//!
//! Client-side access to Figma file data through two interchangeable
//! transports: the Figma REST API directly, or a local broker process that
//! exposes the same operations as tools. Reads go through one façade that
//! caches responses, falls back from the broker to the direct API, and makes
//! degraded results explicit.
//!
//! # Module Overview
//!
//! - [`service`] - the unified data service ([`FigmaDataService`])
//! - [`figma`] - direct REST transport and API types
//! - [`broker`] - broker transport, connection state machine and tool routing
//! - [`thumbnails`] - batched, retrying thumbnail export
//! - [`aggregate`] - one-call fetch of everything about a file
//! - [`cache`] - TTL response cache
//! - [`config`] - TOML/env configuration
//! - [`error`] - error taxonomy and user-facing payloads
//!
//! # Example
//!
//! ```no_run
//! use figma_bridge::{BridgeConfig, FigmaAuth, FigmaDataService};
//!
//! # async fn example() -> figma_bridge::Result<()> {
//! let config = BridgeConfig::load(None)?;
//! let service = FigmaDataService::from_bridge_config(&config, FigmaAuth::from_env())?;
//!
//! let file = service.get_file("FILE_KEY").await?;
//! if file.is_mock() {
//!     eprintln!("showing placeholder data");
//! }
//!
//! let thumbs = service
//!     .get_thumbnails("FILE_KEY", &["1:2", "3:4"], Default::default())
//!     .await?;
//! println!("{} images, {} errors", thumbs.images.len(), thumbs.errors.len());
//! # Ok(())
//! # }
//! ```

pub mod aggregate;
pub mod broker;
pub mod cache;
pub mod config;
pub mod error;
pub mod figma;
pub mod logging;
pub mod mock_data;
pub mod service;
pub mod thumbnails;

pub use aggregate::{ComprehensiveResult, FetchProgress, OrganizedView, ProgressCallback};
pub use broker::{BrokerClient, ConnectionState, ConnectionStatus};
pub use cache::{QueryParams, RequestFingerprint, ResponseCache};
pub use config::{BridgeConfig, BrokerConfig, TransportMethod};
pub use error::{BridgeError, ErrorPayload, Result};
pub use figma::{FigmaAuth, FigmaClient};
pub use service::{DataSource, FigmaDataService, ServiceConfig, Sourced};
pub use thumbnails::{ThumbnailFetcher, ThumbnailOptions, ThumbnailResult};
