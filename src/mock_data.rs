//! Static placeholder dataset.
//!
//! Substituted by [`crate::service::FigmaDataService`] when every transport
//! failed for one of the primary resources. Results built from here are
//! always tagged [`crate::service::DataSource::Mock`].

use std::collections::HashMap;

use crate::figma::api_types::{
    ContainingFrame, FigmaComment, FigmaComponent, FigmaFile, FigmaNode, FigmaStyle, FigmaUser,
    FigmaVersion, StyleType,
};

const MOCK_TIMESTAMP: &str = "2024-01-15T10:30:00Z";

pub fn user() -> FigmaUser {
    FigmaUser {
        id: "mock-user".to_string(),
        handle: "Design Team".to_string(),
        img_url: None,
        email: Some("design@example.com".to_string()),
    }
}

fn node(id: &str, name: &str, node_type: &str, children: Vec<FigmaNode>) -> FigmaNode {
    FigmaNode {
        id: id.to_string(),
        name: name.to_string(),
        node_type: node_type.to_string(),
        children,
    }
}

/// A two-page document named after `file_id`.
pub fn file(file_id: &str) -> FigmaFile {
    let document = node(
        "0:0",
        "Document",
        "DOCUMENT",
        vec![
            node(
                "0:1",
                "Design System",
                "CANVAS",
                vec![
                    node("1:2", "Button/Primary", "COMPONENT", Vec::new()),
                    node("1:3", "Button/Secondary", "COMPONENT", Vec::new()),
                    node("1:4", "Input/Text", "COMPONENT", Vec::new()),
                ],
            ),
            node(
                "0:2",
                "Screens",
                "CANVAS",
                vec![node("2:1", "Home", "FRAME", Vec::new())],
            ),
        ],
    );

    FigmaFile {
        name: format!("Sample file ({file_id})"),
        last_modified: Some(MOCK_TIMESTAMP.to_string()),
        version: Some("1".to_string()),
        thumbnail_url: None,
        role: Some("viewer".to_string()),
        document,
        components: HashMap::new(),
        styles: HashMap::new(),
    }
}

pub fn comments() -> Vec<FigmaComment> {
    vec![
        FigmaComment {
            id: "mock-comment-1".to_string(),
            message: "Can we bump the button contrast?".to_string(),
            file_key: None,
            parent_id: None,
            user: Some(user()),
            created_at: "2024-01-14T09:00:00Z".to_string(),
            resolved_at: None,
            client_meta: None,
        },
        FigmaComment {
            id: "mock-comment-2".to_string(),
            message: "Spacing fixed on the home screen.".to_string(),
            file_key: None,
            parent_id: None,
            user: Some(user()),
            created_at: "2024-01-12T16:45:00Z".to_string(),
            resolved_at: Some("2024-01-13T08:00:00Z".to_string()),
            client_meta: None,
        },
    ]
}

pub fn versions() -> Vec<FigmaVersion> {
    vec![
        FigmaVersion {
            id: "mock-version-2".to_string(),
            created_at: MOCK_TIMESTAMP.to_string(),
            label: Some("Design review".to_string()),
            description: None,
            user: Some(user()),
        },
        FigmaVersion {
            id: "mock-version-1".to_string(),
            created_at: "2024-01-10T12:00:00Z".to_string(),
            label: Some("Initial".to_string()),
            description: Some("First pass".to_string()),
            user: Some(user()),
        },
    ]
}

fn component(key: &str, node_id: &str, name: &str) -> FigmaComponent {
    FigmaComponent {
        key: key.to_string(),
        file_key: None,
        node_id: Some(node_id.to_string()),
        thumbnail_url: None,
        name: name.to_string(),
        description: None,
        created_at: Some(MOCK_TIMESTAMP.to_string()),
        updated_at: Some(MOCK_TIMESTAMP.to_string()),
        containing_frame: Some(ContainingFrame {
            name: Some("Design System".to_string()),
            node_id: Some("0:1".to_string()),
            containing_component_set: None,
        }),
    }
}

pub fn components() -> Vec<FigmaComponent> {
    vec![
        component("mock-component-1", "1:2", "Button/Primary"),
        component("mock-component-2", "1:3", "Button/Secondary"),
        component("mock-component-3", "1:4", "Input/Text"),
    ]
}

fn style(key: &str, name: &str, style_type: StyleType) -> FigmaStyle {
    FigmaStyle {
        key: key.to_string(),
        file_key: None,
        node_id: None,
        style_type,
        thumbnail_url: None,
        name: name.to_string(),
        description: None,
    }
}

pub fn styles() -> Vec<FigmaStyle> {
    vec![
        style("mock-style-1", "Brand/Primary", StyleType::Fill),
        style("mock-style-2", "Heading/H1", StyleType::Text),
        style("mock-style-3", "Shadow/Card", StyleType::Effect),
    ]
}
