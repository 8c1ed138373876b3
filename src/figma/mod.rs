//! Figma REST integration.
//!
//! This module provides:
//! - [`FigmaClient`] - the direct transport to the Figma REST API
//! - [`FigmaAuth`] - personal access token / OAuth credentials
//! - [`node_id`] - node identifier validation
//! - API types for parsing Figma JSON responses

pub mod api_types;
pub mod client;
pub mod node_id;

pub use client::{FigmaAuth, FigmaClient, DEFAULT_BASE_URL, DEFAULT_REQUEST_TIMEOUT};
pub use node_id::{is_valid_node_id, validate_node_ids, InvalidNodeId};

pub use api_types::{
    CommentsResponse, ComponentResponse, ComponentsResponse, FigmaComment, FigmaComponent,
    FigmaFile, FigmaImageResponse, FigmaNode, FigmaNodesResponse, FigmaProject,
    FigmaProjectFile, FigmaStyle, FigmaUser, FigmaVersion, ImageFormat, ProjectFilesResponse,
    StyleResponse, StyleType, StylesResponse, TeamProjectsResponse, VersionsResponse,
};
