//! API module - HTTP routes and handlers

pub mod handlers;
pub mod middleware;
pub mod openapi;

use actix_web::{error::InternalError, web, HttpResponse};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::api::openapi::ApiDoc;

/// Malformed or missing JSON bodies get a 422 in the API's error shape
fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _req| {
        let response = HttpResponse::UnprocessableEntity().json(serde_json::json!({
            "error": "invalid_request",
            "message": err.to_string()
        }));
        InternalError::from_response(err, response).into()
    })
}

/// Configure all API routes
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.app_data(json_config())
        .service(
            web::scope("/v1")
                .route(
                    "/national-ids/inspect",
                    web::post().to(handlers::national_id::inspect_national_id),
                )
                .route("/usage", web::get().to(handlers::usage::get_usage)),
        )
        .route("/health", web::get().to(handlers::health::health_check))
        // Swagger UI and OpenAPI spec
        .service(
            SwaggerUi::new("/swagger-ui/{_:.*}")
                .url("/api-docs/openapi.json", ApiDoc::openapi()),
        );
}
