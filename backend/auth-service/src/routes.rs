//! Route table for the auth service

use crate::handlers;
use crate::AppState;
use actix_middleware::ServiceIdentity;
use actix_web::web;

pub fn configure(cfg: &mut web::ServiceConfig, state: &web::Data<AppState>) {
    let identity = || {
        ServiceIdentity::new(state.codec.clone()).with_blacklist(state.blacklist.clone())
    };

    cfg.route("/health", web::get().to(handlers::health_check))
        .route("/oauth/token", web::post().to(handlers::token))
        .service(
            web::scope("/auth")
                .route("/login", web::post().to(handlers::login))
                .route("/refresh", web::post().to(handlers::refresh))
                .service(
                    web::resource("/logout")
                        .wrap(identity())
                        .route(web::post().to(handlers::logout)),
                )
                .service(
                    web::resource("/logout-device")
                        .wrap(identity())
                        .route(web::post().to(handlers::logout_device)),
                ),
        );
}
