//! API Middleware Service
//!
//! Actix-web middleware that combines authentication, rate limiting,
//! and usage metering into a single service wrapper.

use actix_web::{
    body::{BoxBody, EitherBody},
    dev::{Service, ServiceRequest, ServiceResponse, Transform},
    http::Method,
    Error, HttpMessage,
};
use futures::future::{ok, Ready, LocalBoxFuture};
use std::rc::Rc;

use crate::metering::Authenticator;
use super::auth::{auth_error_response, extract_api_key, AuthenticatedKey};
use super::rate_limit::add_rate_limit_headers;

/// How a path is guarded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Access {
    /// No key needed
    Public,
    /// Key must resolve, nothing is metered
    Authenticated,
    /// Key must resolve, request is rate limited and billed
    Metered,
}

/// Exact method and path of a guarded endpoint
#[derive(Debug, Clone)]
struct Endpoint {
    method: Method,
    path: &'static str,
}

impl Endpoint {
    fn new(method: Method, path: &'static str) -> Self {
        Self { method, path }
    }

    fn matches(&self, method: &Method, path: &str) -> bool {
        self.method == *method && self.path == path
    }
}

/// Anything that is not an exact match falls through to the router
/// unguarded, so a 404 or 405 is never billed.
#[derive(Clone)]
struct AccessRules {
    metered: Vec<Endpoint>,
    authenticated: Vec<Endpoint>,
}

impl AccessRules {
    fn access_for(&self, method: &Method, path: &str) -> Access {
        if self.metered.iter().any(|e| e.matches(method, path)) {
            Access::Metered
        } else if self.authenticated.iter().any(|e| e.matches(method, path)) {
            Access::Authenticated
        } else {
            Access::Public
        }
    }
}

impl Default for AccessRules {
    fn default() -> Self {
        Self {
            metered: vec![Endpoint::new(Method::POST, "/v1/national-ids/inspect")],
            // Checking usage must never cost a billable request
            authenticated: vec![Endpoint::new(Method::GET, "/v1/usage")],
        }
    }
}

/// Middleware factory for API authentication and metering
pub struct ApiMiddleware {
    authenticator: Authenticator,
    rules: AccessRules,
}

impl ApiMiddleware {
    pub fn new(authenticator: Authenticator) -> Self {
        Self {
            authenticator,
            rules: AccessRules::default(),
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for ApiMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B, BoxBody>>;
    type Error = Error;
    type Transform = ApiMiddlewareService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(ApiMiddlewareService {
            service: Rc::new(service),
            authenticator: self.authenticator.clone(),
            rules: self.rules.clone(),
        })
    }
}

/// The actual middleware service
pub struct ApiMiddlewareService<S> {
    service: Rc<S>,
    authenticator: Authenticator,
    rules: AccessRules,
}

impl<S, B> Service<ServiceRequest> for ApiMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B, BoxBody>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&self, ctx: &mut core::task::Context<'_>) -> core::task::Poll<Result<(), Self::Error>> {
        self.service.poll_ready(ctx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();
        let authenticator = self.authenticator.clone();
        let access = self.rules.access_for(req.method(), req.path());

        Box::pin(async move {
            if access == Access::Public {
                let res = service.call(req).await?;
                return Ok(res.map_into_left_body());
            }

            let api_key = extract_api_key(&req).unwrap_or_default();

            if access == Access::Authenticated {
                let record = match authenticator.authenticate(&api_key).await {
                    Ok(record) => record,
                    Err(e) => {
                        let response = auth_error_response(&e);
                        return Ok(req.into_response(response).map_into_right_body());
                    }
                };

                req.extensions_mut().insert(AuthenticatedKey::from(&record));
                let res = service.call(req).await?;
                return Ok(res.map_into_left_body());
            }

            // Rate limit check and usage increment happen together
            let authorization = match authenticator.authorize(&api_key).await {
                Ok(authorization) => authorization,
                Err(e) => {
                    let response = auth_error_response(&e);
                    return Ok(req.into_response(response).map_into_right_body());
                }
            };

            let rate_status = authorization.rate_limit.clone();
            req.extensions_mut().insert(AuthenticatedKey::from(&authorization));
            req.extensions_mut().insert(authorization);

            let mut res = service.call(req).await?.map_into_left_body();
            add_rate_limit_headers(res.headers_mut(), &rate_status);

            Ok(res)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_rules() {
        let rules = AccessRules::default();
        assert_eq!(rules.access_for(&Method::POST, "/v1/national-ids/inspect"), Access::Metered);
        assert_eq!(rules.access_for(&Method::GET, "/v1/usage"), Access::Authenticated);
        assert_eq!(rules.access_for(&Method::GET, "/health"), Access::Public);
        assert_eq!(rules.access_for(&Method::GET, "/swagger-ui/index.html"), Access::Public);
        assert_eq!(rules.access_for(&Method::GET, "/api-docs/openapi.json"), Access::Public);
    }

    #[test]
    fn test_only_exact_routes_are_guarded() {
        let rules = AccessRules::default();
        assert_eq!(rules.access_for(&Method::GET, "/v1/national-ids/inspect"), Access::Public);
        assert_eq!(rules.access_for(&Method::POST, "/v1/national-ids"), Access::Public);
        assert_eq!(rules.access_for(&Method::POST, "/v1/national-idsXYZ"), Access::Public);
        assert_eq!(rules.access_for(&Method::POST, "/v1/national-ids/inspect/"), Access::Public);
        assert_eq!(rules.access_for(&Method::POST, "/v1/usage"), Access::Public);
    }
}
