//! Node identifier well-formedness.
//!
//! Figma node ids look like `123:45`; instance sublayers chain several of
//! them with `;` (`I1:2;3:4`). Anything else is rejected before it can reach
//! the network.

use serde::Serialize;

const SEPARATOR: char = ':';

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvalidNodeId {
    pub id: String,
    pub reason: String,
}

pub fn is_valid_node_id(id: &str) -> bool {
    !id.is_empty()
        && id.contains(SEPARATOR)
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, ':' | ';' | '-' | '_'))
}

pub fn invalid_reason(id: &str) -> String {
    format!("Invalid node ID format: {id}")
}

/// Split ids into well-formed ones (input order, duplicates removed) and rejects.
pub fn validate_node_ids<S: AsRef<str>>(ids: &[S]) -> (Vec<String>, Vec<InvalidNodeId>) {
    let mut valid: Vec<String> = Vec::new();
    let mut invalid: Vec<InvalidNodeId> = Vec::new();

    for id in ids.iter().map(AsRef::as_ref) {
        if is_valid_node_id(id) {
            if !valid.iter().any(|v| v == id) {
                valid.push(id.to_string());
            }
        } else if !invalid.iter().any(|entry| entry.id == id) {
            invalid.push(InvalidNodeId {
                id: id.to_string(),
                reason: invalid_reason(id),
            });
        }
    }

    (valid, invalid)
}
