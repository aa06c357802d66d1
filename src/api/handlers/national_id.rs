//! National ID inspection endpoint

use actix_web::{web, HttpMessage, HttpRequest, HttpResponse};
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;

use crate::domain::{self, NationalIdDetails};
use crate::metering::Authorization;

/// Request body for National ID inspection
#[derive(Debug, Deserialize, ToSchema)]
pub struct InspectRequest {
    #[schema(example = "29001011234567")]
    pub national_id: String,
}

/// Response for a valid National ID
#[derive(Debug, Serialize, ToSchema)]
pub struct InspectResponse {
    pub national_id: String,
    pub valid: bool,
    pub details: NationalIdDetails,
}

/// Response for an invalid National ID
#[derive(Debug, Serialize, ToSchema)]
pub struct InspectErrorResponse {
    pub national_id: String,
    pub valid: bool,
    pub error: String,
}

/// POST /v1/national-ids/inspect - Validate a National ID and extract its details
#[utoipa::path(
    post,
    path = "/v1/national-ids/inspect",
    tag = "national-ids",
    request_body = InspectRequest,
    responses(
        (status = 200, description = "National ID is valid", body = InspectResponse),
        (status = 400, description = "National ID is invalid", body = InspectErrorResponse),
        (status = 401, description = "Missing or invalid API key"),
        (status = 429, description = "Rate limit exceeded")
    ),
    security(("api_key" = []))
)]
pub async fn inspect_national_id(
    req: HttpRequest,
    body: web::Json<InspectRequest>,
) -> HttpResponse {
    let InspectRequest { national_id } = body.into_inner();

    match domain::validate(&national_id) {
        Ok(details) => {
            if let Some(auth) = req.extensions().get::<Authorization>() {
                info!(
                    owner = %auth.owner,
                    total_requests = auth.total_requests,
                    governorate = %details.governorate_code,
                    gender = details.gender.as_str(),
                    "National ID inspected"
                );
            }

            HttpResponse::Ok().json(InspectResponse {
                national_id,
                valid: true,
                details,
            })
        }
        Err(e) => {
            info!(error = %e, "National ID rejected");
            HttpResponse::BadRequest().json(InspectErrorResponse {
                national_id,
                valid: false,
                error: e.to_string(),
            })
        }
    }
}
