use crate::error::OAuthError;
use crate::models::OAuthTokenRequest;
use crate::AppState;
use actix_web::http::header::{CacheControl, CacheDirective};
use actix_web::{web, HttpResponse};

/// POST /oauth/token
///
/// Client-credentials grant. Accepts form or JSON bodies.
pub async fn token(
    state: web::Data<AppState>,
    payload: web::Either<web::Form<OAuthTokenRequest>, web::Json<OAuthTokenRequest>>,
) -> Result<HttpResponse, OAuthError> {
    let request = match payload {
        web::Either::Left(form) => form.into_inner(),
        web::Either::Right(json) => json.into_inner(),
    };

    let response = state.client_credentials.exchange(&request).await?;

    Ok(HttpResponse::Ok()
        .insert_header(CacheControl(vec![CacheDirective::NoStore]))
        .json(response))
}
