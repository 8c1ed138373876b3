//! Unified data service over the direct and broker transports.
//!
//! [`FigmaDataService::request`] is the single read path: response cache
//! first, then the broker when it is the selected transport, then the direct
//! REST client. Broker problems of any kind are logged, reported to the
//! observer and answered by going direct; only the direct transport's error
//! reaches the caller.
//!
//! The per-resource helpers come in two flavours. `get_file`, `get_comments`,
//! `get_versions`, `get_file_components`, `get_file_styles` and `get_user`
//! substitute placeholder data when everything failed and say so through
//! [`Sourced`]. The `fetch_*` variants and the remaining lookups return the
//! error instead.

pub mod observer;
pub mod transport;

pub use observer::{DataSource, ServiceEvent, ServiceObserver, Sourced};
pub use transport::{
    detect_default_transport, DefaultTransportStrategy, EnvironmentSignals, TransportStrategy,
};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::broker::{resolve_tool, translate_payload, BrokerClient, ConnectionState, ConnectionStatus};
use crate::cache::{CacheStats, QueryParams, RequestFingerprint, ResponseCache};
use crate::config::{BridgeConfig, BrokerConfig, TransportMethod};
use crate::error::{BridgeError, Result};
use crate::figma::api_types::{
    CommentsResponse, ComponentResponse, ComponentsResponse, FigmaComment, FigmaComponent,
    FigmaFile, FigmaImageResponse, FigmaNodesResponse, FigmaProject, FigmaProjectFile, FigmaStyle,
    FigmaUser, FigmaVersion, ImageFormat, ProjectFilesResponse, StyleResponse, StylesResponse,
    TeamProjectsResponse, VersionsResponse,
};
use crate::figma::{validate_node_ids, FigmaAuth, FigmaClient, DEFAULT_BASE_URL, DEFAULT_REQUEST_TIMEOUT};
use crate::mock_data;
use crate::thumbnails::{ImageExporter, ThumbnailFetcher, ThumbnailOptions, ThumbnailResult};

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub transport: TransportMethod,
    pub auth: Option<FigmaAuth>,
    pub broker: BrokerConfig,
    pub api_base_url: String,
    pub request_timeout: Duration,
}

impl ServiceConfig {
    pub fn direct(auth: Option<FigmaAuth>) -> Self {
        Self {
            transport: TransportMethod::Direct,
            auth,
            broker: BrokerConfig::default(),
            api_base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Resolve the transport: configured value, else detected from
    /// `signals`. A disabled broker always means direct.
    pub fn from_bridge_config(
        config: &BridgeConfig,
        auth: Option<FigmaAuth>,
        signals: &EnvironmentSignals,
    ) -> Self {
        let mut transport = config
            .service
            .transport
            .unwrap_or_else(|| detect_default_transport(signals, &DefaultTransportStrategy));
        if transport == TransportMethod::Broker && !config.broker.enabled {
            debug!("broker disabled in configuration; using direct transport");
            transport = TransportMethod::Direct;
        }

        Self {
            transport,
            auth,
            broker: config.broker.clone(),
            api_base_url: config.service.api_base_url.clone(),
            request_timeout: config.service.request_timeout,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionReport {
    pub transport: TransportMethod,
    pub is_connected: bool,
    pub broker_url: String,
    pub state: ConnectionState,
}

/// Read-only view of the active configuration. Never carries the token.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigSummary {
    pub transport: TransportMethod,
    pub auth: Option<&'static str>,
    pub broker_url: String,
    pub broker_enabled: bool,
    pub api_base_url: String,
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
    #[serde(with = "humantime_serde")]
    pub cache_ttl: Duration,
}

pub struct FigmaDataService {
    config: ServiceConfig,
    direct: FigmaClient,
    broker: BrokerClient,
    cache: Arc<ResponseCache>,
    observer: Option<Arc<dyn ServiceObserver>>,
    connect_attempted: AtomicBool,
}

impl FigmaDataService {
    pub fn new(config: ServiceConfig, cache: Arc<ResponseCache>) -> Result<Self> {
        let direct =
            FigmaClient::with_base_url_and_timeout(&config.api_base_url, config.request_timeout)?;
        let broker = BrokerClient::new(config.broker.clone())?;
        info!(
            transport = config.transport.as_str(),
            auth = ?config.auth.as_ref().map(FigmaAuth::kind),
            "figma data service ready"
        );

        Ok(Self {
            config,
            direct,
            broker,
            cache,
            observer: None,
            connect_attempted: AtomicBool::new(false),
        })
    }

    /// Build from loaded configuration, logging any validation warnings.
    pub fn from_bridge_config(config: &BridgeConfig, auth: Option<FigmaAuth>) -> Result<Self> {
        for warning in config.validate() {
            warn!(%warning, "configuration warning");
        }
        let service_config =
            ServiceConfig::from_bridge_config(config, auth, &EnvironmentSignals::from_env());
        Self::new(
            service_config,
            Arc::new(ResponseCache::new(config.service.cache_ttl)),
        )
    }

    pub fn with_observer(mut self, observer: Arc<dyn ServiceObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn broker(&self) -> &BrokerClient {
        &self.broker
    }

    /// Connect the broker when it is the selected transport.
    pub async fn connect(&self) -> Result<()> {
        if self.config.transport != TransportMethod::Broker {
            return Ok(());
        }
        self.connect_attempted.store(true, Ordering::SeqCst);
        self.broker.connect().await
    }

    /// Tear down the broker session and drop every cached response.
    pub fn disconnect(&self) {
        self.broker.disconnect();
        self.cache.clear();
    }

    pub fn connection_status(&self) -> ConnectionReport {
        let state = self.broker.status();
        ConnectionReport {
            transport: self.config.transport,
            is_connected: state.is_connected(),
            broker_url: self.broker.server_url().to_string(),
            state,
        }
    }

    pub fn config_summary(&self) -> ConfigSummary {
        ConfigSummary {
            transport: self.config.transport,
            auth: self.config.auth.as_ref().map(FigmaAuth::kind),
            broker_url: self.config.broker.url.clone(),
            broker_enabled: self.config.broker.enabled,
            api_base_url: self.config.api_base_url.clone(),
            request_timeout: self.config.request_timeout,
            cache_ttl: self.cache.stats().ttl,
        }
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Cached GET of a REST path (without the `/v1` prefix).
    pub async fn request(&self, path: &str, params: &QueryParams) -> Result<Value> {
        self.request_inner(path, params, None, true).await
    }

    /// Cache, then broker, then direct. An answer only counts once it decodes
    /// as `T`, and only decoded answers are cached.
    async fn request_inner<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &QueryParams,
        timeout: Option<Duration>,
        use_cache: bool,
    ) -> Result<T> {
        let fingerprint = RequestFingerprint::new(path, params);
        if use_cache {
            if let Some(hit) = self.cache.get(&fingerprint) {
                match serde_json::from_value(hit) {
                    Ok(data) => {
                        debug!(%fingerprint, "cache hit");
                        self.notify(ServiceEvent::CacheHit {
                            path: path.to_string(),
                        });
                        return Ok(data);
                    }
                    Err(err) => debug!(%fingerprint, error = %err, "cached response has another shape"),
                }
            }
        }

        let (value, data, transport) = match self.try_broker(path, params, timeout).await {
            Some((value, data)) => (value, data, TransportMethod::Broker),
            None => {
                let value = self
                    .direct
                    .request(path, params, self.config.auth.as_ref(), timeout)
                    .await?;
                let data = serde_json::from_value(value.clone()).map_err(|e| {
                    BridgeError::unexpected(format!("unexpected response shape for {path}: {e}"))
                })?;
                (value, data, TransportMethod::Direct)
            }
        };

        if use_cache {
            self.cache.set(fingerprint, value);
        }
        self.notify(ServiceEvent::RequestSucceeded {
            path: path.to_string(),
            transport,
        });
        Ok(data)
    }

    /// `None` means "go direct", either by configuration or after a failure.
    async fn try_broker<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &QueryParams,
        timeout: Option<Duration>,
    ) -> Option<(Value, T)> {
        if self.config.transport != TransportMethod::Broker {
            return None;
        }
        match self.request_via_broker(path, params, timeout).await {
            Ok(answer) => Some(answer),
            Err(err) => {
                warn!(path, error = %err, "broker request failed; falling back to direct API");
                self.notify(ServiceEvent::BrokerFallback {
                    path: path.to_string(),
                    reason: err.to_string(),
                });
                None
            }
        }
    }

    async fn request_via_broker<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &QueryParams,
        timeout: Option<Duration>,
    ) -> Result<(Value, T)> {
        let route = resolve_tool(path)?;
        self.ensure_connect_attempted().await;

        let token = self
            .config
            .auth
            .as_ref()
            .map(FigmaAuth::token)
            .unwrap_or_default();
        let tool = route.tool.name();
        let invalid = |message: String| BridgeError::Broker {
            tool: tool.to_string(),
            source: Box::new(BridgeError::invalid_response(message)),
        };

        let result = self
            .broker
            .call_tool_with_timeout(tool, route.arguments(params, token), timeout)
            .await?;
        if result.is_error {
            return Err(invalid(
                result.text().unwrap_or("tool reported an error").to_string(),
            ));
        }
        let value = translate_payload(route.tool, result.parse_json()?);
        let data = serde_json::from_value(value.clone())
            .map_err(|e| invalid(format!("unexpected payload shape: {e}")))?;
        Ok((value, data))
    }

    /// One lazy connect for a broker nobody has connected yet.
    async fn ensure_connect_attempted(&self) {
        if self.broker.status().status != ConnectionStatus::Disconnected {
            return;
        }
        if self.connect_attempted.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Err(err) = self.broker.connect().await {
            debug!(error = %err, "lazy broker connect failed");
        }
    }

    fn notify(&self, event: ServiceEvent) {
        if let Some(observer) = &self.observer {
            observer.record(&event);
        }
    }

    async fn fetch<T: DeserializeOwned>(&self, path: &str, params: &QueryParams) -> Result<T> {
        self.request_inner(path, params, None, true).await
    }

    fn live_or_mock<T>(
        &self,
        resource: &'static str,
        outcome: Result<T>,
        mock: impl FnOnce() -> T,
    ) -> Result<Sourced<T>> {
        match outcome {
            Ok(data) => Ok(Sourced::live(data)),
            Err(err @ BridgeError::Validation(_)) => Err(err),
            Err(err) => {
                warn!(resource, error = %err, "all transports failed; substituting mock data");
                self.notify(ServiceEvent::MockSubstituted {
                    resource,
                    reason: err.to_string(),
                });
                Ok(Sourced::mock(mock()))
            }
        }
    }

    pub async fn fetch_file(&self, file_id: &str) -> Result<FigmaFile> {
        let file_id = require_id("file id", file_id)?;
        self.fetch(&format!("/files/{file_id}"), &QueryParams::new())
            .await
    }

    pub async fn fetch_comments(&self, file_id: &str) -> Result<Vec<FigmaComment>> {
        let file_id = require_id("file id", file_id)?;
        let response: CommentsResponse = self
            .fetch(&format!("/files/{file_id}/comments"), &QueryParams::new())
            .await?;
        Ok(response.comments)
    }

    pub async fn fetch_versions(&self, file_id: &str) -> Result<Vec<FigmaVersion>> {
        let file_id = require_id("file id", file_id)?;
        let response: VersionsResponse = self
            .fetch(&format!("/files/{file_id}/versions"), &QueryParams::new())
            .await?;
        Ok(response.versions)
    }

    pub async fn fetch_file_components(&self, file_id: &str) -> Result<Vec<FigmaComponent>> {
        let file_id = require_id("file id", file_id)?;
        let response: ComponentsResponse = self
            .fetch(&format!("/files/{file_id}/components"), &QueryParams::new())
            .await?;
        Ok(response.meta.components)
    }

    pub async fn fetch_file_styles(&self, file_id: &str) -> Result<Vec<FigmaStyle>> {
        let file_id = require_id("file id", file_id)?;
        let response: StylesResponse = self
            .fetch(&format!("/files/{file_id}/styles"), &QueryParams::new())
            .await?;
        Ok(response.meta.styles)
    }

    pub async fn fetch_user(&self) -> Result<FigmaUser> {
        self.fetch("/me", &QueryParams::new()).await
    }

    pub async fn get_file(&self, file_id: &str) -> Result<Sourced<FigmaFile>> {
        let outcome = self.fetch_file(file_id).await;
        self.live_or_mock("file", outcome, || mock_data::file(file_id))
    }

    pub async fn get_comments(&self, file_id: &str) -> Result<Sourced<Vec<FigmaComment>>> {
        let outcome = self.fetch_comments(file_id).await;
        self.live_or_mock("comments", outcome, mock_data::comments)
    }

    pub async fn get_versions(&self, file_id: &str) -> Result<Sourced<Vec<FigmaVersion>>> {
        let outcome = self.fetch_versions(file_id).await;
        self.live_or_mock("versions", outcome, mock_data::versions)
    }

    pub async fn get_file_components(
        &self,
        file_id: &str,
    ) -> Result<Sourced<Vec<FigmaComponent>>> {
        let outcome = self.fetch_file_components(file_id).await;
        self.live_or_mock("components", outcome, mock_data::components)
    }

    pub async fn get_file_styles(&self, file_id: &str) -> Result<Sourced<Vec<FigmaStyle>>> {
        let outcome = self.fetch_file_styles(file_id).await;
        self.live_or_mock("styles", outcome, mock_data::styles)
    }

    pub async fn get_user(&self) -> Result<Sourced<FigmaUser>> {
        let outcome = self.fetch_user().await;
        self.live_or_mock("user", outcome, mock_data::user)
    }

    /// Subtrees for `node_ids`. Malformed ids are rejected before any call.
    pub async fn get_file_nodes<S: AsRef<str>>(
        &self,
        file_id: &str,
        node_ids: &[S],
    ) -> Result<FigmaNodesResponse> {
        let file_id = require_id("file id", file_id)?;
        let params = QueryParams::new().with("ids", node_ids_param(node_ids)?);
        self.fetch(&format!("/files/{file_id}/nodes"), &params).await
    }

    /// One image-export call. Not cached: export URLs are short-lived.
    pub async fn get_image_urls<S: AsRef<str>>(
        &self,
        file_id: &str,
        node_ids: &[S],
        format: ImageFormat,
        scale: f32,
    ) -> Result<FigmaImageResponse> {
        let file_id = require_id("file id", file_id)?;
        let ids: Vec<String> = node_ids_param(node_ids)?
            .split(',')
            .map(str::to_owned)
            .collect();
        self.export_images(file_id, &ids, format, scale, self.config.request_timeout)
            .await
    }

    pub async fn get_team_projects(&self, team_id: &str) -> Result<Vec<FigmaProject>> {
        let team_id = require_id("team id", team_id)?;
        let response: TeamProjectsResponse = self
            .fetch(&format!("/teams/{team_id}/projects"), &QueryParams::new())
            .await?;
        Ok(response.projects)
    }

    pub async fn get_project_files(&self, project_id: &str) -> Result<Vec<FigmaProjectFile>> {
        let project_id = require_id("project id", project_id)?;
        let response: ProjectFilesResponse = self
            .fetch(&format!("/projects/{project_id}/files"), &QueryParams::new())
            .await?;
        Ok(response.files)
    }

    pub async fn get_team_components(&self, team_id: &str) -> Result<Vec<FigmaComponent>> {
        let team_id = require_id("team id", team_id)?;
        let response: ComponentsResponse = self
            .fetch(&format!("/teams/{team_id}/components"), &QueryParams::new())
            .await?;
        Ok(response.meta.components)
    }

    pub async fn get_team_styles(&self, team_id: &str) -> Result<Vec<FigmaStyle>> {
        let team_id = require_id("team id", team_id)?;
        let response: StylesResponse = self
            .fetch(&format!("/teams/{team_id}/styles"), &QueryParams::new())
            .await?;
        Ok(response.meta.styles)
    }

    pub async fn get_component(&self, key: &str) -> Result<FigmaComponent> {
        let key = require_id("component key", key)?;
        let response: ComponentResponse = self
            .fetch(&format!("/components/{key}"), &QueryParams::new())
            .await?;
        Ok(response.meta)
    }

    pub async fn get_style(&self, key: &str) -> Result<FigmaStyle> {
        let key = require_id("style key", key)?;
        let response: StyleResponse = self
            .fetch(&format!("/styles/{key}"), &QueryParams::new())
            .await?;
        Ok(response.meta)
    }

    /// Batched thumbnail fetch through this service's transports.
    pub async fn get_thumbnails<S: AsRef<str>>(
        &self,
        file_id: &str,
        node_ids: &[S],
        options: ThumbnailOptions,
    ) -> Result<ThumbnailResult> {
        let file_id = require_id("file id", file_id)?;
        ThumbnailFetcher::new(self, options)
            .fetch(file_id, node_ids)
            .await
    }
}

#[async_trait]
impl ImageExporter for FigmaDataService {
    async fn export_images(
        &self,
        file_id: &str,
        node_ids: &[String],
        format: ImageFormat,
        scale: f32,
        timeout: Duration,
    ) -> Result<FigmaImageResponse> {
        let file_id = require_id("file id", file_id)?;
        let params = QueryParams::new()
            .with("ids", node_ids.join(","))
            .with("format", format.as_str())
            .with("scale", scale);
        self.request_inner(&format!("/images/{file_id}"), &params, Some(timeout), false)
            .await
    }
}

/// Identifiers are spliced into the request path, so they must be one segment.
pub(crate) fn require_id<'a>(what: &str, value: &'a str) -> Result<&'a str> {
    let value = value.trim();
    if value.is_empty() {
        return Err(BridgeError::validation(format!("{what} is required")));
    }
    if value.contains(['/', '?', '#']) {
        return Err(BridgeError::validation(format!(
            "{what} contains invalid characters: {value}"
        )));
    }
    Ok(value)
}

fn node_ids_param<S: AsRef<str>>(node_ids: &[S]) -> Result<String> {
    let (valid, invalid) = validate_node_ids(node_ids);
    if let Some(bad) = invalid.into_iter().next() {
        return Err(BridgeError::Validation(bad.reason));
    }
    if valid.is_empty() {
        return Err(BridgeError::validation("at least one node id is required"));
    }
    Ok(valid.join(","))
}
