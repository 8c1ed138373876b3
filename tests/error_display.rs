use figma_bridge::error::ErrorCategory;
use figma_bridge::{BridgeError, ConnectionStatus};
use reqwest::StatusCode;

#[test]
fn config_error_display_includes_message() {
    let err = BridgeError::Config("broker url missing".to_string());

    assert_eq!(format!("{}", err), "Configuration error: broker url missing");
}

#[test]
fn status_helper_includes_status_and_message() {
    let err = BridgeError::from_status(StatusCode::NOT_FOUND, "File not found");

    assert_eq!(
        format!("{}", err),
        "Not found (status: Some(404)): File not found"
    );
}

#[test]
fn server_errors_render_numeric_status() {
    let err = BridgeError::from_status(StatusCode::TOO_MANY_REQUESTS, "slow down");

    assert_eq!(
        format!("{}", err),
        "Figma API unavailable (status: 429): slow down"
    );
}

#[test]
fn missing_credentials_has_no_status() {
    let rendered = BridgeError::missing_credentials().to_string();

    assert!(rendered.starts_with("Authentication error (status: None)"));
    assert!(rendered.contains("FIGMA_TOKEN"));
}

#[test]
fn broker_wrapper_names_tool_and_cause() {
    let err = BridgeError::Broker {
        tool: "get_images".into(),
        source: Box::new(BridgeError::Network {
            message: "connection refused".into(),
            timed_out: false,
        }),
    };
    let rendered = err.to_string();

    assert!(rendered.starts_with("Broker tool 'get_images' failed: "));
    assert!(rendered.contains("connection refused"));
    assert!(std::error::Error::source(&err).is_some());
}

#[test]
fn not_connected_reports_state() {
    let err = BridgeError::NotConnected {
        state: ConnectionStatus::Error,
    };

    assert_eq!(err.to_string(), "Broker not connected (state: error)");
}

#[test]
fn payload_serializes_lowercase_category() {
    let payload = BridgeError::validation("Invalid node ID format: x").to_payload();
    assert_eq!(payload.category, ErrorCategory::Validation);

    let json = serde_json::to_value(&payload).expect("serialize");
    assert_eq!(json["category"], "validation");
    assert!(json["remediation"].is_string());
}
