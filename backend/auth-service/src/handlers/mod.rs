//! HTTP request handlers (REST API)

pub mod auth;
pub mod health;
pub mod oauth;

pub use auth::{login, logout, logout_device, refresh, REFRESH_COOKIE};
pub use health::health_check;
pub use oauth::token;

use serde::Serialize;
use serde_json::{json, Value};

/// `{ "success": true, "data", "message", "timestamp" }`
pub(crate) fn success<T: Serialize>(data: T, message: Option<&str>) -> Value {
    json!({
        "success": true,
        "data": data,
        "message": message,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    })
}
