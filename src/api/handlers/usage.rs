//! Usage Handler
//!
//! Reports the billable request count for the calling API key. Reading usage
//! is not itself billed and does not consume the rate limit.

use actix_web::{web, HttpRequest, HttpResponse};
use serde::Serialize;
use tracing::{error, warn};
use utoipa::ToSchema;

use crate::api::middleware::ApiKeyExt;
use crate::db::StoreError;
use crate::AppState;

/// Usage response
#[derive(Debug, Serialize, ToSchema)]
pub struct UsageResponse {
    pub api_key: String,
    pub owner: String,
    pub total_requests: u64,
}

/// GET /v1/usage - Billable request count for the calling key
#[utoipa::path(
    get,
    path = "/v1/usage",
    tag = "usage",
    responses(
        (status = 200, description = "Current usage", body = UsageResponse),
        (status = 401, description = "Missing or invalid API key")
    ),
    security(("api_key" = []))
)]
pub async fn get_usage(req: HttpRequest, state: web::Data<AppState>) -> HttpResponse {
    let auth = match req.api_key() {
        Some(auth) => auth,
        None => {
            return HttpResponse::Unauthorized().json(serde_json::json!({
                "error": "unauthorized",
                "message": "Missing API key"
            }));
        }
    };

    match state.store.get_total(&auth.key).await {
        Ok(total_requests) => HttpResponse::Ok().json(UsageResponse {
            api_key: auth.key,
            owner: auth.owner,
            total_requests,
        }),
        Err(StoreError::NotFound) => {
            warn!(owner = %auth.owner, "API key disappeared between auth and usage lookup");
            HttpResponse::Unauthorized().json(serde_json::json!({
                "error": "unauthorized",
                "message": "Invalid API key"
            }))
        }
        Err(StoreError::Storage(e)) => {
            error!(error = %e, "Failed to get usage");
            HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "internal_error",
                "message": "Failed to get usage"
            }))
        }
    }
}
