//! Broker transport: forwards tool calls to an intermediary process over HTTP.
//!
//! Each connection session owns one supervisor task. It runs the periodic
//! health check while connected and the backoff timer while reconnecting, and
//! it is cancelled by [`BrokerClient::disconnect`] or when the last client
//! handle is dropped.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::state::{ConnectionState, ConnectionStatus, Transition};
use super::tools::BrokerTool;
use crate::config::BrokerConfig;
use crate::error::{BridgeError, Result};

pub const HEALTH_PATH: &str = "/health";
pub const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ToolContent {
    Text { text: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResult {
    pub content: Vec<ToolContent>,
    #[serde(default)]
    pub is_error: bool,
}

impl ToolResult {
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ToolContent::Text { text: text.into() }],
            is_error: false,
        }
    }

    /// Interpret a raw response body. Bodies already shaped as a tool result
    /// are taken as-is; anything else becomes a single text item.
    fn from_body(body: String) -> Self {
        match serde_json::from_str::<ToolResult>(&body) {
            Ok(result) if !result.content.is_empty() => result,
            _ => Self::from_text(body),
        }
    }

    pub fn text(&self) -> Option<&str> {
        self.content.iter().map(|c| match c {
            ToolContent::Text { text } => text.as_str(),
        }).next()
    }

    /// Parse the first text item as JSON.
    pub fn parse_json(&self) -> Result<Value> {
        let text = self
            .text()
            .ok_or_else(|| BridgeError::invalid_response("tool result has no text content"))?;
        serde_json::from_str(text)
            .map_err(|e| BridgeError::invalid_response(format!("tool payload is not JSON: {e}")))
    }
}

#[derive(Debug, Clone)]
pub struct BrokerClient {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    config: BrokerConfig,
    server_url: String,
    http: Client,
    state: Mutex<ConnectionState>,
    supervisor: Mutex<Option<Supervisor>>,
    wake: Arc<Notify>,
}

#[derive(Debug)]
struct Supervisor {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl Supervisor {
    fn stop(self) {
        self.cancel.cancel();
        self.handle.abort();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Monitor,
    Reconnect,
}

/// Why monitoring stopped.
enum Interruption {
    Cancelled,
    HealthCheckFailed,
    ToolCallFailed,
}

impl BrokerClient {
    pub fn new(config: BrokerConfig) -> Result<Self> {
        let http = Client::builder()
            .no_proxy()
            .build()
            .map_err(BridgeError::from_reqwest)?;
        let server_url = config.url.trim_end_matches('/').to_string();

        Ok(Self {
            inner: Arc::new(Inner {
                config,
                server_url,
                http,
                state: Mutex::new(ConnectionState::default()),
                supervisor: Mutex::new(None),
                wake: Arc::new(Notify::new()),
            }),
        })
    }

    pub fn config(&self) -> &BrokerConfig {
        &self.inner.config
    }

    pub fn server_url(&self) -> &str {
        &self.inner.server_url
    }

    /// Snapshot of the connection state.
    pub fn status(&self) -> ConnectionState {
        self.inner.lock_state().clone()
    }

    pub fn is_connected(&self) -> bool {
        self.inner.lock_state().is_connected()
    }

    /// Connect to the broker. A no-op while connected or connecting.
    ///
    /// On failure the client is left in `error` and, when reconnect is
    /// enabled, a backoff reconnect is scheduled in the background.
    pub async fn connect(&self) -> Result<()> {
        {
            let mut state = self.inner.lock_state();
            if state.is_busy() {
                return Ok(());
            }
            state.apply(Transition::BeginConnect);
        }
        self.inner.stop_supervisor();
        info!(url = %self.inner.server_url, "connecting to broker");

        match self.inner.attempt_connect(None).await {
            Ok(()) => {
                Inner::start_supervisor(&self.inner, Mode::Monitor);
                Ok(())
            }
            Err(err) => {
                if self.inner.config.reconnect {
                    Inner::start_supervisor(&self.inner, Mode::Reconnect);
                }
                Err(err)
            }
        }
    }

    /// Stop background work and return to `disconnected`. Safe from any state.
    pub fn disconnect(&self) {
        self.inner.stop_supervisor();
        let mut state = self.inner.lock_state();
        if state.status != ConnectionStatus::Disconnected {
            info!(url = %self.inner.server_url, "disconnected from broker");
        }
        state.apply(Transition::Reset);
    }

    /// `GET {url}/health`. Never fails; any problem reads as unhealthy.
    pub async fn health_check(&self) -> bool {
        self.inner.health_check().await
    }

    /// Invoke a broker tool. Requires a live connection.
    pub async fn call_tool(&self, name: &str, args: Value) -> Result<ToolResult> {
        self.call_tool_with_timeout(name, args, None).await
    }

    /// [`call_tool`](Self::call_tool) with a per-call timeout in place of the
    /// configured one.
    pub async fn call_tool_with_timeout(
        &self,
        name: &str,
        args: Value,
        timeout: Option<Duration>,
    ) -> Result<ToolResult> {
        let status = self.inner.lock_state().status;
        if status != ConnectionStatus::Connected {
            return Err(BridgeError::NotConnected { state: status });
        }

        let token = args
            .get("token")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let url = format!("{}/tools/{}", self.inner.server_url, name);
        debug!(tool = name, "calling broker tool");

        let mut request = self
            .inner
            .http
            .post(&url)
            .json(&args)
            .timeout(timeout.unwrap_or(self.inner.config.timeout));
        if !token.is_empty() {
            request = request.bearer_auth(&token);
        }

        match send_tool_request(request).await {
            Ok(body) => Ok(ToolResult::from_body(body)),
            Err(err) => {
                if breaks_connection(&err) {
                    warn!(tool = name, error = %err, "broker call failed; marking connection as errored");
                    self.inner.fail_from_call(err.to_string());
                }
                Err(BridgeError::Broker {
                    tool: name.to_string(),
                    source: Box::new(err),
                })
            }
        }
    }
}

async fn send_tool_request(request: reqwest::RequestBuilder) -> Result<String> {
    let response = request.send().await.map_err(BridgeError::from_reqwest)?;
    let status = response.status();
    let body = response.text().await.map_err(BridgeError::from_reqwest)?;
    if status.is_success() {
        return Ok(body);
    }
    let message = serde_json::from_str::<Value>(&body)
        .ok()
        .and_then(|v| v.get("error").and_then(Value::as_str).map(str::to_owned))
        .unwrap_or_else(|| format!("broker returned status {}", status.as_u16()));
    Err(BridgeError::from_status(status, message))
}

/// Network failures, timeouts and 5xx mean the broker itself is unwell.
fn breaks_connection(err: &BridgeError) -> bool {
    match err {
        BridgeError::Network { .. } => true,
        BridgeError::RateLimitOrServer { status, .. } => status.is_server_error(),
        _ => false,
    }
}

impl Inner {
    fn lock_state(&self) -> MutexGuard<'_, ConnectionState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Apply a transition unless the session was cancelled meanwhile.
    fn transition(&self, cancel: Option<&CancellationToken>, transition: Transition) -> bool {
        let mut state = self.lock_state();
        if cancel.is_some_and(CancellationToken::is_cancelled) {
            return false;
        }
        state.apply(transition);
        true
    }

    async fn health_check(&self) -> bool {
        let url = format!("{}{}", self.server_url, HEALTH_PATH);
        match self
            .http
            .get(&url)
            .timeout(HEALTH_CHECK_TIMEOUT)
            .send()
            .await
        {
            Ok(response) if response.status().is_success() => true,
            Ok(response) => {
                warn!(status = response.status().as_u16(), "broker health check failed");
                false
            }
            Err(err) => {
                warn!(error = %BridgeError::from_reqwest(err), "broker health check failed");
                false
            }
        }
    }

    /// One connection attempt; the caller has already moved to `connecting`.
    async fn attempt_connect(&self, cancel: Option<&CancellationToken>) -> Result<()> {
        if self.health_check().await {
            let tools = BrokerTool::ALL.iter().map(|t| t.name().to_string()).collect();
            self.transition(
                cancel,
                Transition::Connected {
                    capabilities: vec!["tools".to_string()],
                    tools,
                },
            );
            info!(url = %self.server_url, "connected to broker");
            Ok(())
        } else {
            let reason = format!("broker at {} failed its health check", self.server_url);
            self.transition(cancel, Transition::Failed(reason.clone()));
            Err(BridgeError::Network {
                message: reason,
                timed_out: false,
            })
        }
    }

    fn fail_from_call(&self, reason: String) {
        {
            let mut state = self.lock_state();
            // A concurrent health check may already be handling it.
            if state.status != ConnectionStatus::Connected {
                return;
            }
            state.apply(Transition::Failed(reason));
        }
        self.wake.notify_one();
    }

    fn stop_supervisor(&self) {
        let previous = self
            .supervisor
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(supervisor) = previous {
            supervisor.stop();
        }
    }

    fn start_supervisor(this: &Arc<Self>, mode: Mode) {
        this.stop_supervisor();
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(supervise(
            Arc::downgrade(this),
            Arc::clone(&this.wake),
            cancel.clone(),
            this.config.clone(),
            mode,
        ));
        *this.supervisor.lock().unwrap_or_else(|e| e.into_inner()) =
            Some(Supervisor { cancel, handle });
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        let supervisor = self
            .supervisor
            .get_mut()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(supervisor) = supervisor {
            supervisor.stop();
        }
    }
}

async fn supervise(
    inner: Weak<Inner>,
    wake: Arc<Notify>,
    cancel: CancellationToken,
    config: BrokerConfig,
    mut mode: Mode,
) {
    loop {
        match mode {
            Mode::Monitor => {
                match monitor(&inner, &wake, &cancel, &config).await {
                    Interruption::Cancelled => return,
                    Interruption::HealthCheckFailed => {
                        let Some(strong) = inner.upgrade() else { return };
                        strong.transition(
                            Some(&cancel),
                            Transition::Failed("periodic health check failed".to_string()),
                        );
                    }
                    Interruption::ToolCallFailed => {}
                }
                if !config.reconnect {
                    return;
                }
                mode = Mode::Reconnect;
            }
            Mode::Reconnect => {
                let delay = {
                    let Some(strong) = inner.upgrade() else { return };
                    let mut state = strong.lock_state();
                    if cancel.is_cancelled() {
                        return;
                    }
                    let claimed = state.claim_reconnect(config.retry_delay, config.retry_attempts);
                    if let Some(delay) = claimed {
                        info!(
                            attempt = state.reconnect_attempts,
                            delay_ms = delay.as_millis() as u64,
                            "scheduling broker reconnect"
                        );
                    }
                    claimed
                };
                let Some(delay) = delay else {
                    warn!(
                        attempts = config.retry_attempts,
                        "broker reconnect attempts exhausted; staying in error state"
                    );
                    return;
                };

                tokio::select! {
                    _ = cancel.cancelled() => return,
                    _ = tokio::time::sleep(delay) => {}
                }

                let Some(strong) = inner.upgrade() else { return };
                if !strong.transition(Some(&cancel), Transition::BeginConnect) {
                    return;
                }
                if strong.attempt_connect(Some(&cancel)).await.is_ok() {
                    mode = Mode::Monitor;
                }
            }
        }
    }
}

async fn monitor(
    inner: &Weak<Inner>,
    wake: &Notify,
    cancel: &CancellationToken,
    config: &BrokerConfig,
) -> Interruption {
    let period = config.health_check_interval.max(Duration::from_millis(10));
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => return Interruption::Cancelled,
            _ = wake.notified() => {
                let Some(strong) = inner.upgrade() else { return Interruption::Cancelled };
                let status = strong.lock_state().status;
                if status == ConnectionStatus::Error {
                    return Interruption::ToolCallFailed;
                }
            }
            _ = ticker.tick(), if config.health_check => {
                let Some(strong) = inner.upgrade() else { return Interruption::Cancelled };
                if !strong.health_check().await {
                    return Interruption::HealthCheckFailed;
                }
            }
        }
    }
}
