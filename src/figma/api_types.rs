//! Figma API response types for parsing JSON from the Figma REST API.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Supported image export formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    #[default]
    Png,
    Jpg,
    Svg,
    Pdf,
}

impl ImageFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Jpg => "jpg",
            ImageFormat::Svg => "svg",
            ImageFormat::Pdf => "pdf",
        }
    }
}

impl std::str::FromStr for ImageFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "png" => Ok(ImageFormat::Png),
            "jpg" | "jpeg" => Ok(ImageFormat::Jpg),
            "svg" => Ok(ImageFormat::Svg),
            "pdf" => Ok(ImageFormat::Pdf),
            other => Err(format!("unsupported image format '{other}'")),
        }
    }
}

/// A Figma file response from the files endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FigmaFile {
    pub name: String,
    #[serde(default)]
    pub last_modified: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    pub document: FigmaNode,
    #[serde(default)]
    pub components: HashMap<String, Value>,
    #[serde(default)]
    pub styles: HashMap<String, Value>,
}

/// A node of the document tree; only the fields the organizer needs are typed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FigmaNode {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type")]
    pub node_type: String,
    #[serde(default)]
    pub children: Vec<FigmaNode>,
}

/// Response from the nodes endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FigmaNodesResponse {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub nodes: HashMap<String, Option<FigmaNodeContainer>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FigmaNodeContainer {
    pub document: Value,
    #[serde(default)]
    pub components: Option<Value>,
    #[serde(default)]
    pub styles: Option<Value>,
}

/// Response from the images export endpoint.
///
/// Figma reports a render failure for a single node as a `null` URL.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FigmaImageResponse {
    #[serde(default)]
    pub images: HashMap<String, Option<String>>,
    #[serde(default)]
    pub err: Option<String>,
}

impl FigmaImageResponse {
    pub fn url_for(&self, node_id: &str) -> Option<&str> {
        self.images
            .get(node_id)
            .and_then(|url| url.as_deref())
            .filter(|url| !url.is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FigmaUser {
    pub id: String,
    pub handle: String,
    #[serde(default)]
    pub img_url: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FigmaComment {
    pub id: String,
    pub message: String,
    #[serde(default)]
    pub file_key: Option<String>,
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub user: Option<FigmaUser>,
    pub created_at: String,
    #[serde(default)]
    pub resolved_at: Option<String>,
    #[serde(default)]
    pub client_meta: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentsResponse {
    #[serde(default)]
    pub comments: Vec<FigmaComment>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FigmaVersion {
    pub id: String,
    pub created_at: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub user: Option<FigmaUser>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionsResponse {
    #[serde(default)]
    pub versions: Vec<FigmaVersion>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContainingFrame {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, rename = "nodeId")]
    pub node_id: Option<String>,
    #[serde(default, rename = "containingComponentSet")]
    pub containing_component_set: Option<Value>,
}

/// Published component metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FigmaComponent {
    pub key: String,
    #[serde(default)]
    pub file_key: Option<String>,
    #[serde(default)]
    pub node_id: Option<String>,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub containing_frame: Option<ContainingFrame>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StyleType {
    Fill,
    Text,
    Effect,
    Grid,
}

/// Published style metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FigmaStyle {
    pub key: String,
    #[serde(default)]
    pub file_key: Option<String>,
    #[serde(default)]
    pub node_id: Option<String>,
    pub style_type: StyleType,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentsMeta {
    #[serde(default)]
    pub components: Vec<FigmaComponent>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentsResponse {
    pub meta: ComponentsMeta,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StylesMeta {
    #[serde(default)]
    pub styles: Vec<FigmaStyle>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StylesResponse {
    pub meta: StylesMeta,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentResponse {
    pub meta: FigmaComponent,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StyleResponse {
    pub meta: FigmaStyle,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FigmaProject {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamProjectsResponse {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub projects: Vec<FigmaProject>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FigmaProjectFile {
    pub key: String,
    pub name: String,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
    #[serde(default)]
    pub last_modified: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectFilesResponse {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub files: Vec<FigmaProjectFile>,
}
