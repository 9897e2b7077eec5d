use actix_web::http::header::{HeaderValue, WWW_AUTHENTICATE};
use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use jwt_security::AuthError;
use serde_json::json;
use thiserror::Error;

/// An authentication failure rendered as the standard error envelope:
/// `{ "success": false, "error": { "code", "message" }, "timestamp" }`
#[derive(Debug, Error)]
#[error(transparent)]
pub struct AuthRejection(pub AuthError);

impl From<AuthError> for AuthRejection {
    fn from(err: AuthError) -> Self {
        Self(err)
    }
}

impl ResponseError for AuthRejection {
    fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.0.http_status()).unwrap_or(StatusCode::UNAUTHORIZED)
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let mut response = HttpResponse::build(status);
        if status == StatusCode::UNAUTHORIZED {
            response.insert_header((WWW_AUTHENTICATE, HeaderValue::from_static("Bearer")));
        }

        response.json(json!({
            "success": false,
            "error": {
                "code": self.0.code(),
                "message": self.0.public_message(),
            },
            "timestamp": chrono::Utc::now().to_rfc3339(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::to_bytes;

    #[actix_web::test]
    async fn test_envelope_shape() {
        let response = AuthRejection(AuthError::TokenRevoked).error_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.headers().get(WWW_AUTHENTICATE).unwrap(), "Bearer");

        let body = to_bytes(response.into_body()).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["error"]["code"], "TOKEN_REVOKED");
        assert!(json["timestamp"].is_string());
    }

    #[test]
    fn test_status_follows_error_kind() {
        assert_eq!(
            AuthRejection(AuthError::ScopeNotAllowed("x".into())).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            AuthRejection(AuthError::ServiceTokenUnavailable("x".into())).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }
}
