//! Endpoint-to-tool routing for the broker.
//!
//! Routes are evaluated top to bottom and the first match wins. A path with
//! no route is an error, raised before any network call.

use serde_json::{Map, Value};

use crate::cache::QueryParams;
use crate::error::{BridgeError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrokerTool {
    GetFile,
    GetComments,
    GetVersions,
    GetComponents,
    GetStyles,
    GetUser,
    GetImages,
    GetNodes,
}

impl BrokerTool {
    pub const ALL: [BrokerTool; 8] = [
        BrokerTool::GetFile,
        BrokerTool::GetComments,
        BrokerTool::GetVersions,
        BrokerTool::GetComponents,
        BrokerTool::GetStyles,
        BrokerTool::GetUser,
        BrokerTool::GetImages,
        BrokerTool::GetNodes,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            BrokerTool::GetFile => "get_file",
            BrokerTool::GetComments => "get_comments",
            BrokerTool::GetVersions => "get_versions",
            BrokerTool::GetComponents => "get_components",
            BrokerTool::GetStyles => "get_styles",
            BrokerTool::GetUser => "get_user",
            BrokerTool::GetImages => "get_images",
            BrokerTool::GetNodes => "get_nodes",
        }
    }
}

/// Segment template; `:name` segments capture into a call argument.
const ROUTES: &[(&str, BrokerTool)] = &[
    ("files/:file_id/comments", BrokerTool::GetComments),
    ("files/:file_id/versions", BrokerTool::GetVersions),
    ("files/:file_id/components", BrokerTool::GetComponents),
    ("files/:file_id/styles", BrokerTool::GetStyles),
    ("files/:file_id/nodes", BrokerTool::GetNodes),
    ("files/:file_id", BrokerTool::GetFile),
    ("images/:file_id", BrokerTool::GetImages),
    ("me", BrokerTool::GetUser),
];

/// A resolved broker call: which tool, and the arguments taken from the path.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolRoute {
    pub tool: BrokerTool,
    pub captures: Vec<(String, String)>,
}

impl ToolRoute {
    /// Build the JSON arguments: path captures, then query params, then the token.
    pub fn arguments(&self, params: &QueryParams, token: &str) -> Value {
        let mut args = Map::new();
        for (name, value) in &self.captures {
            args.insert(name.clone(), Value::String(value.clone()));
        }
        for (key, value) in params.iter() {
            args.insert(key.to_string(), Value::String(value.to_string()));
        }
        args.insert("token".to_string(), Value::String(token.to_string()));
        Value::Object(args)
    }
}

pub fn resolve_tool(path: &str) -> Result<ToolRoute> {
    let segments: Vec<&str> = path
        .split('?')
        .next()
        .unwrap_or_default()
        .split('/')
        .filter(|s| !s.is_empty())
        .collect();

    ROUTES
        .iter()
        .find_map(|(pattern, tool)| {
            match_template(pattern, &segments).map(|captures| ToolRoute {
                tool: *tool,
                captures,
            })
        })
        .ok_or_else(|| BridgeError::NoToolMapping {
            path: path.to_string(),
        })
}

fn match_template(pattern: &str, segments: &[&str]) -> Option<Vec<(String, String)>> {
    let parts: Vec<&str> = pattern.split('/').collect();
    if parts.len() != segments.len() {
        return None;
    }

    let mut captures = Vec::new();
    for (part, segment) in parts.iter().zip(segments) {
        match part.strip_prefix(':') {
            Some(name) => captures.push((name.to_string(), segment.to_string())),
            None if part == segment => {}
            None => return None,
        }
    }
    Some(captures)
}

/// Reshape a broker payload into the REST response shape for `tool`.
pub fn translate_payload(tool: BrokerTool, payload: Value) -> Value {
    let payload = match payload {
        Value::Object(mut map) if map.len() == 1 && map.contains_key("data") => {
            map.remove("data").unwrap_or(Value::Null)
        }
        other => other,
    };

    match (tool, payload) {
        (BrokerTool::GetComments, Value::Array(items)) => wrap("comments", Value::Array(items)),
        (BrokerTool::GetVersions, Value::Array(items)) => wrap("versions", Value::Array(items)),
        (BrokerTool::GetImages, Value::Object(map))
            if !map.contains_key("images")
                && !map.contains_key("err")
                && map.values().all(|v| v.is_string() || v.is_null()) =>
        {
            wrap("images", Value::Object(map))
        }
        (_, other) => other,
    }
}

fn wrap(key: &str, value: Value) -> Value {
    let mut map = Map::new();
    map.insert(key.to_string(), value);
    Value::Object(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sub_resources_win_over_file() {
        let route = resolve_tool("/files/ABC/comments").expect("route");
        assert_eq!(route.tool, BrokerTool::GetComments);
        assert_eq!(
            route.captures,
            vec![("file_id".to_string(), "ABC".to_string())]
        );

        assert_eq!(resolve_tool("/files/ABC").unwrap().tool, BrokerTool::GetFile);
        assert_eq!(resolve_tool("/files/ABC/nodes").unwrap().tool, BrokerTool::GetNodes);
        assert_eq!(resolve_tool("/images/ABC").unwrap().tool, BrokerTool::GetImages);
        assert_eq!(resolve_tool("/me").unwrap().tool, BrokerTool::GetUser);
    }

    #[test]
    fn unmapped_path_is_an_error() {
        let err = resolve_tool("/teams/123/projects").unwrap_err();
        assert!(matches!(err, BridgeError::NoToolMapping { path } if path == "/teams/123/projects"));
        assert!(resolve_tool("/files").is_err());
        assert!(resolve_tool("/files/A/comments/extra").is_err());
    }

    #[test]
    fn arguments_merge_captures_params_and_token() {
        let route = resolve_tool("/images/FILE").unwrap();
        let params = QueryParams::new().with("ids", "1:2,3:4").with("scale", 2);
        let args = route.arguments(&params, "tok");

        assert_eq!(
            args,
            json!({"file_id": "FILE", "ids": "1:2,3:4", "scale": "2", "token": "tok"})
        );
    }

    #[test]
    fn bare_payloads_are_wrapped() {
        assert_eq!(
            translate_payload(BrokerTool::GetComments, json!([{"id": "1"}])),
            json!({"comments": [{"id": "1"}]})
        );
        assert_eq!(
            translate_payload(BrokerTool::GetImages, json!({"1:2": "https://x", "3:4": null})),
            json!({"images": {"1:2": "https://x", "3:4": null}})
        );
        assert_eq!(
            translate_payload(BrokerTool::GetVersions, json!({"data": [{"id": "v"}]})),
            json!({"versions": [{"id": "v"}]})
        );
    }

    #[test]
    fn rest_shaped_payloads_pass_through() {
        let images = json!({"images": {"1:2": "u"}, "err": null});
        assert_eq!(translate_payload(BrokerTool::GetImages, images.clone()), images);

        let file = json!({"name": "F", "document": {}});
        assert_eq!(translate_payload(BrokerTool::GetFile, file.clone()), file);
    }
}
