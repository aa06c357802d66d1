//! OpenAPI 3.0 specification definition

use utoipa::openapi::security::{ApiKey, ApiKeyValue, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::api::handlers::{
    health::HealthResponse,
    national_id::{InspectErrorResponse, InspectRequest, InspectResponse},
    usage::UsageResponse,
};
use crate::api::middleware::API_KEY_HEADER;
use crate::domain::{Gender, NationalIdDetails};

/// Registers the `X-API-Key` header scheme referenced by protected paths
struct ApiKeySecurity;

impl Modify for ApiKeySecurity {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "api_key",
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new(API_KEY_HEADER))),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Egyptian National ID Service",
        version = "1.0.0",
        description = "Validate Egyptian National ID numbers and extract birth date, gender and governorate",
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    ),
    servers(
        (url = "/", description = "Current server")
    ),
    tags(
        (name = "system", description = "System health and status endpoints"),
        (name = "national-ids", description = "National ID validation endpoints"),
        (name = "usage", description = "Billable usage per API key")
    ),
    paths(
        crate::api::handlers::health::health_check,
        crate::api::handlers::national_id::inspect_national_id,
        crate::api::handlers::usage::get_usage,
    ),
    components(
        schemas(
            HealthResponse,
            InspectRequest,
            InspectResponse,
            InspectErrorResponse,
            NationalIdDetails,
            Gender,
            UsageResponse,
        )
    ),
    modifiers(&ApiKeySecurity)
)]
pub struct ApiDoc;
