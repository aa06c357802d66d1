//! Rate limit response headers and the 429 response

use actix_web::{
    http::header::{HeaderMap, HeaderName, HeaderValue},
    HttpResponse,
};

use crate::db::RateLimitStatus;

/// Rate limit headers
pub const RATE_LIMIT_LIMIT: &str = "X-RateLimit-Limit";
pub const RATE_LIMIT_REMAINING: &str = "X-RateLimit-Remaining";
pub const RATE_LIMIT_RESET: &str = "X-RateLimit-Reset";
pub const RETRY_AFTER: &str = "Retry-After";

/// Add rate limit headers to a successful response
pub fn add_rate_limit_headers(headers: &mut HeaderMap, status: &RateLimitStatus) {
    // X-RateLimit-Limit: Maximum requests per window
    headers.insert(
        HeaderName::from_static("x-ratelimit-limit"),
        HeaderValue::from(status.limit),
    );

    // X-RateLimit-Remaining: Requests remaining in window
    headers.insert(
        HeaderName::from_static("x-ratelimit-remaining"),
        HeaderValue::from(status.remaining()),
    );

    // X-RateLimit-Reset: Unix timestamp when window resets
    headers.insert(
        HeaderName::from_static("x-ratelimit-reset"),
        HeaderValue::from(status.reset_at.timestamp()),
    );
}

/// Create rate limit exceeded response with proper headers
pub fn rate_limit_exceeded_response(status: &RateLimitStatus) -> HttpResponse {
    let seconds_until_reset = (status.reset_at - chrono::Utc::now()).num_seconds().max(1);

    HttpResponse::TooManyRequests()
        .insert_header((RATE_LIMIT_LIMIT, status.limit.to_string()))
        .insert_header((RATE_LIMIT_REMAINING, "0"))
        .insert_header((RATE_LIMIT_RESET, status.reset_at.timestamp().to_string()))
        .insert_header((RETRY_AFTER, seconds_until_reset.to_string()))
        .json(serde_json::json!({
            "error": "rate_limit_exceeded",
            "message": format!("Rate limit exceeded. Maximum {} requests per minute.", status.limit),
            "limit": status.limit,
            "reset_at": status.reset_at.to_rfc3339(),
            "retry_after_seconds": seconds_until_reset
        }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::StatusCode;
    use chrono::{Duration, Utc};

    fn status(allowed: bool, current_count: u32) -> RateLimitStatus {
        RateLimitStatus {
            allowed,
            current_count,
            limit: 60,
            reset_at: Utc::now() + Duration::seconds(30),
        }
    }

    #[test]
    fn test_headers_on_success() {
        let status = status(true, 10);
        let mut headers = HeaderMap::new();
        add_rate_limit_headers(&mut headers, &status);

        assert_eq!(headers.get(RATE_LIMIT_LIMIT).unwrap(), "60");
        assert_eq!(headers.get(RATE_LIMIT_REMAINING).unwrap(), "50");
        assert_eq!(
            headers.get(RATE_LIMIT_RESET).unwrap().to_str().unwrap(),
            status.reset_at.timestamp().to_string()
        );
    }

    #[test]
    fn test_exceeded_response() {
        let response = rate_limit_exceeded_response(&status(false, 60));
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers().get(RATE_LIMIT_REMAINING).unwrap(), "0");

        let retry_after: i64 = response
            .headers()
            .get(RETRY_AFTER)
            .unwrap()
            .to_str()
            .unwrap()
            .parse()
            .unwrap();
        assert!((1..=30).contains(&retry_after));
    }
}
