pub mod auth;
pub mod comments;
pub mod config;
pub mod core;
pub mod likes;
pub mod models;
pub mod posts;
pub mod users;

use actix_cors::Cors;
use actix_web::http::{header, Method};
use actix_web::web;
use sqlx::SqlitePool;

use crate::auth::CredentialService;
use crate::config::Config;
use crate::core::errors::ApiError;

/// Shared by every handler through `web::Data`.
#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub credentials: CredentialService,
}

impl AppState {
    pub fn new(pool: SqlitePool, config: &Config) -> Self {
        Self {
            pool,
            credentials: CredentialService::new(&config.jwt_secret, config.token_expiration_hours),
        }
    }
}

/// Registers the `/api` routes and the JSON body error handling.
pub fn configure(cfg: &mut web::ServiceConfig) {
    let json_config = web::JsonConfig::default().error_handler(|err, _req| {
        ApiError::BadRequest(format!("Error decoding json request: {}", err)).into()
    });

    cfg.app_data(json_config).service(
        web::scope("/api")
            .service(
                web::scope("/auth")
                    .route("/register", web::post().to(auth::register_user))
                    .route("/login", web::post().to(auth::login_user))
                    .route("/logout", web::post().to(auth::logout_user)),
            )
            .service(
                web::resource("/posts")
                    .route(web::get().to(posts::list_posts_handler))
                    .route(web::post().to(posts::create_post_handler)),
            )
            .service(web::resource("/post/{post_id}").route(web::get().to(posts::get_post_handler)))
            .service(
                web::resource("/posts/user/{username}")
                    .route(web::get().to(posts::list_user_posts_handler)),
            )
            .service(
                web::resource("/posts/{post_id}")
                    .route(web::put().to(posts::update_post_handler))
                    .route(web::delete().to(posts::delete_post_handler)),
            )
            .service(
                web::resource("/comments/by-user/{user_id}")
                    .route(web::get().to(comments::list_user_comments_handler)),
            )
            .service(
                web::resource("/comments/{id}")
                    .route(web::get().to(comments::list_post_comments_handler))
                    .route(web::post().to(comments::create_comment_handler))
                    .route(web::delete().to(comments::delete_comment_handler)),
            )
            .service(
                web::resource("/likes/by-user/{user_id}")
                    .route(web::get().to(likes::liked_posts_handler)),
            )
            .service(web::resource("/likes/{post_id}").route(web::get().to(likes::post_likers_handler)))
            .service(web::resource("/likes/{post_id}/like").route(web::put().to(likes::like_handler)))
            .service(
                web::resource("/likes/{post_id}/dislike").route(web::put().to(likes::dislike_handler)),
            )
            .service(web::resource("/users/{username}").route(web::get().to(users::get_user_profile))),
    );
}

/// Browser clients send the session cookie cross-origin, so credentials are allowed
/// for the configured origins only.
pub fn cors(allowed_origins: &[String]) -> Cors {
    allowed_origins
        .iter()
        .fold(Cors::default(), |cors, origin| cors.allowed_origin(origin))
        .allowed_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allowed_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .supports_credentials()
        .max_age(3600)
}
