//! Resource handlers.
//!
//! Handlers assume their interceptor chain already ran: identity comes from
//! [`CurrentUser`](crate::auth::CurrentUser), never from the request body.

pub(crate) mod bookings;
pub(crate) mod places;
pub(crate) mod users;

use std::str::FromStr;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::error::ApiError;

/// Handler result.
pub(crate) type ApiResult<T> = Result<T, ApiError>;

/// Liveness probe.
pub(crate) async fn health() -> &'static str {
    "OK"
}

/// JSON 404 for unrouted paths.
pub(crate) async fn fallback() -> ApiError {
    ApiError::NotFound("Route not found".to_string())
}

/// JSON 405 for a known path with an unsupported method.
pub(crate) async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed
}

/// Give the timeout layer's bare 408 the usual error body.
pub(crate) async fn timeout_as_json(response: Response) -> Response {
    if response.status() == StatusCode::REQUEST_TIMEOUT {
        return ApiError::Timeout.into_response();
    }
    response
}

/// Parse a path segment into an id, reporting a 400 on failure.
pub(crate) fn parse_id<T>(raw: &str) -> ApiResult<T>
where
    T: FromStr<Err = placebook_core::ValidationError>,
{
    Ok(raw.parse()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header::CONTENT_TYPE;
    use placebook_core::PlaceId;

    #[tokio::test]
    async fn test_timeout_gets_json_body() {
        let response = timeout_as_json(StatusCode::REQUEST_TIMEOUT.into_response()).await;
        assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);
        assert_eq!(response.headers()[CONTENT_TYPE], "application/json");

        let untouched = timeout_as_json(StatusCode::NO_CONTENT.into_response()).await;
        assert_eq!(untouched.status(), StatusCode::NO_CONTENT);
        assert!(untouched.headers().get(CONTENT_TYPE).is_none());
    }

    #[test]
    fn test_parse_id() {
        assert_eq!(parse_id::<PlaceId>("42").unwrap(), PlaceId(42));
        for bad in ["", "abc", "-1", "1.5"] {
            let err = parse_id::<PlaceId>(bad).unwrap_err();
            assert_eq!(err.status(), StatusCode::BAD_REQUEST, "{bad:?}");
        }
    }
}
