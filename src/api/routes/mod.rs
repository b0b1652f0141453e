//! API route handlers

pub mod markets;
pub mod notifications;
pub mod whales;

use serde::Serialize;

/// Error response body shared by all routes
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self { error: error.into() }
    }
}
