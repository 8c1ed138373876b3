use serde::Serialize;
use std::process::ExitCode;

use figma_bridge::{BridgeError, Result};

/// Print `body` as one JSON document on stdout.
pub fn write_output<T: Serialize>(body: &T) -> Result<()> {
    let content = serde_json::to_string_pretty(body)?;
    println!("{content}");
    Ok(())
}

/// Print the error payload on stderr and return the failure exit code.
pub fn render_error(err: &BridgeError) -> ExitCode {
    let payload = err.to_payload();
    let content = serde_json::to_string(&payload)
        .unwrap_or_else(|_| format!("{{\"category\":\"unknown\",\"message\":{:?}}}", err.to_string()));
    eprintln!("{content}");

    // Exit code 2 is reserved for errors.
    ExitCode::from(2)
}
