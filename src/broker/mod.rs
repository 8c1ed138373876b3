//! Broker transport.
//!
//! - [`client`] - connection lifecycle, health checks and tool calls
//! - [`state`] - the connection state machine
//! - [`tools`] - mapping of REST-style paths onto broker tools

pub mod client;
pub mod state;
pub mod tools;

pub use client::{BrokerClient, ToolContent, ToolResult, HEALTH_CHECK_TIMEOUT, HEALTH_PATH};
pub use state::{reconnect_delay, ConnectionState, ConnectionStatus};
pub use tools::{resolve_tool, translate_payload, BrokerTool, ToolRoute};
