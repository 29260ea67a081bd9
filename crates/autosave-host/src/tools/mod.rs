//! Request handlers
//!
//! One module per concern; each `execute_*` returns the response body or a
//! [`DispatchError`](crate::server::DispatchError) for the dispatcher to render.

pub mod cleanup;
pub mod maintenance;
pub mod records;

use chrono::Local;

use crate::protocol::types::Response;

/// Liveness check
pub fn execute_ping() -> Response {
    Response::with_data(serde_json::json!({
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": Local::now().to_rfc3339(),
    }))
    .with_message("pong")
}
