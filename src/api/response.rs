//! API response types for consistent JSON responses
//!
//! Every endpoint answers with the same `{ success, message, data }` envelope.

use serde::Serialize;

/// Standard API response wrapper
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    /// Whether the request was successful
    pub success: bool,
    /// Response message
    pub message: String,
    /// Response data (if any)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    /// Create a successful response with data
    pub fn success(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
        }
    }
}

/// Returned by a successful login; the client presents `session_id` as the
/// first message on its game stream.
#[derive(Debug, Clone, Serialize)]
pub struct LoginData {
    pub session_id: String,
}

/// Server liveness and occupancy
#[derive(Debug, Clone, Serialize)]
pub struct HealthData {
    pub active: bool,
    pub uptime_secs: u64,
    pub active_users: usize,
    pub pending_users: usize,
    pub capacity: usize,
    pub version: &'static str,
}
