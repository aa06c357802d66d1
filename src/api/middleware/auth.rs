//! API Key Authentication
//!
//! Extracts API keys from the X-API-Key header or Authorization: Bearer token
//! and maps authentication failures to HTTP responses. Authenticated key info
//! is stored in request extensions for downstream handlers.

use actix_web::{
    dev::ServiceRequest,
    http::header::AUTHORIZATION,
    HttpMessage, HttpResponse,
};

use crate::db::ApiKeyRecord;
use crate::metering::{AuthError, Authorization};
use super::rate_limit::rate_limit_exceeded_response;

/// Header name for API key
pub const API_KEY_HEADER: &str = "X-API-Key";

/// Extension type for the authenticated caller
#[derive(Debug, Clone)]
pub struct AuthenticatedKey {
    pub key: String,
    pub owner: String,
}

impl From<&ApiKeyRecord> for AuthenticatedKey {
    fn from(record: &ApiKeyRecord) -> Self {
        Self {
            key: record.key.clone(),
            owner: record.owner.clone(),
        }
    }
}

impl From<&Authorization> for AuthenticatedKey {
    fn from(auth: &Authorization) -> Self {
        Self {
            key: auth.key.clone(),
            owner: auth.owner.clone(),
        }
    }
}

/// Extract API key from request headers.
///
/// A blank header counts as absent, so the next source is still consulted.
pub fn extract_api_key(req: &ServiceRequest) -> Option<String> {
    // First try X-API-Key header
    if let Some(key) = req.headers().get(API_KEY_HEADER) {
        if let Ok(key_str) = key.to_str() {
            let key_str = key_str.trim();
            if !key_str.is_empty() {
                return Some(key_str.to_string());
            }
        }
    }

    // Then try Authorization: Bearer <key>
    if let Some(auth) = req.headers().get(AUTHORIZATION) {
        if let Ok(auth_str) = auth.to_str() {
            if let Some(token) = auth_str.strip_prefix("Bearer ") {
                let token = token.trim();
                if !token.is_empty() {
                    return Some(token.to_string());
                }
            }
        }
    }

    None
}

/// Map an authentication failure to its HTTP response
pub fn auth_error_response(err: &AuthError) -> HttpResponse {
    match err {
        AuthError::MissingKey | AuthError::InvalidKey => {
            HttpResponse::Unauthorized().json(serde_json::json!({
                "error": "unauthorized",
                "message": err.to_string()
            }))
        }
        AuthError::RateLimited(status) => rate_limit_exceeded_response(status),
        AuthError::Storage(_) => HttpResponse::InternalServerError().json(serde_json::json!({
            "error": "internal_error",
            "message": "Usage store unavailable"
        })),
    }
}

/// Trait for reading the authenticated key from request extensions
pub trait ApiKeyExt {
    fn api_key(&self) -> Option<AuthenticatedKey>;
}

impl<T: HttpMessage> ApiKeyExt for T {
    fn api_key(&self) -> Option<AuthenticatedKey> {
        self.extensions().get::<AuthenticatedKey>().cloned()
    }
}
