use std::future::Future;
use std::pin::Pin;

use actix_web::cookie::time::{Duration as CookieDuration, OffsetDateTime};
use actix_web::cookie::{Cookie, SameSite};
use actix_web::{dev::Payload, web, FromRequest, HttpRequest, HttpResponse};
use chrono::Duration;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};

use crate::config::*;
use crate::core::errors::{ApiError, ApiResult};
use crate::core::helpers::{
    dummy_password_hash, hash_password, is_valid_email, now_utc, sanitize_text, verify_password,
};
use crate::models::models::{Claims, LoginRequest, Register, User};
use crate::users;
use crate::AppState;

/// Hashes credentials and issues/validates the signed session token.
///
/// The token is the whole session: there is no server-side session store, so
/// logging out only clears the cookie on the client.
#[derive(Clone)]
pub struct CredentialService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    token_ttl_hours: i64,
}

impl CredentialService {
    pub fn new(secret: &str, token_ttl_hours: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            token_ttl_hours,
        }
    }

    pub async fn register(&self, pool: &sqlx::SqlitePool, candidate: Register) -> ApiResult<i64> {
        let candidate = validate_registration(candidate)?;

        if users::find_by_email(pool, &candidate.email).await?.is_some() {
            return Err(ApiError::Conflict("email already exists".to_string()));
        }

        let password = candidate.password;
        let hashed = tokio::task::spawn_blocking(move || hash_password(&password))
            .await
            .map_err(|e| anyhow::anyhow!("password hashing task failed: {}", e))??;

        let id = users::insert_user(
            pool,
            &candidate.username,
            &candidate.email,
            &hashed,
            candidate.photo_url.as_deref(),
        )
        .await
        .map_err(|err| match err {
            ApiError::Conflict(_) => ApiError::Conflict("username or email already exists".to_string()),
            other => other,
        })?;

        tracing::info!(user_id = id, "registered user");
        Ok(id)
    }

    /// Unknown email and wrong password are indistinguishable to the caller.
    pub async fn login(
        &self,
        pool: &sqlx::SqlitePool,
        email: &str,
        password: &str,
    ) -> ApiResult<(User, String)> {
        let found = users::find_by_email(pool, email).await?;
        let stored_hash = match &found {
            Some(user) => user.password.clone(),
            None => dummy_password_hash().to_string(),
        };

        let candidate = password.to_string();
        let matches = tokio::task::spawn_blocking(move || verify_password(&candidate, &stored_hash))
            .await
            .map_err(|e| anyhow::anyhow!("password verification task failed: {}", e))?;

        let mut user = match found {
            Some(user) if matches => user,
            _ => {
                tracing::info!("rejected login attempt");
                return Err(ApiError::invalid_credentials());
            }
        };

        let token = self.issue_token(&user.email)?;
        user.password.clear();

        tracing::info!(user_id = user.id, "user logged in");
        Ok((user, token))
    }

    pub fn issue_token(&self, email: &str) -> ApiResult<String> {
        let claims = Claims {
            email: email.to_string(),
            exp: (now_utc() + Duration::hours(self.token_ttl_hours)).timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| anyhow::anyhow!("failed to sign session token: {}", e).into())
    }

    pub fn decode_token(&self, token: &str) -> ApiResult<Claims> {
        let validation = Validation::new(Algorithm::HS256);
        let data = decode::<Claims>(token, &self.decoding_key, &validation)?;
        Ok(data.claims)
    }

    /// Checks signature and expiry, then re-resolves the embedded email so a
    /// removed account invalidates its outstanding tokens.
    pub async fn verify_session(&self, pool: &sqlx::SqlitePool, token: &str) -> ApiResult<User> {
        let claims = self.decode_token(token)?;

        match users::find_by_email(pool, &claims.email).await? {
            Some(mut user) => {
                user.password.clear();
                Ok(user)
            }
            None => {
                tracing::warn!("session token names an unknown user");
                Err(ApiError::Unauthorized("session user not found".to_string()))
            }
        }
    }

    pub fn session_cookie(&self, token: String) -> Cookie<'static> {
        Cookie::build(SESSION_COOKIE_NAME, token)
            .path("/")
            .same_site(SameSite::Lax)
            .http_only(true)
            .expires(OffsetDateTime::now_utc() + CookieDuration::hours(self.token_ttl_hours))
            .finish()
    }

    pub fn cleared_cookie(&self) -> Cookie<'static> {
        Cookie::build(SESSION_COOKIE_NAME, "")
            .path("/")
            .same_site(SameSite::Lax)
            .http_only(true)
            .expires(OffsetDateTime::now_utc() - CookieDuration::days(1))
            .finish()
    }
}

fn validate_registration(candidate: Register) -> ApiResult<Register> {
    let username = candidate.username.trim().to_string();
    let email = candidate.email.trim().to_lowercase();

    let length = username.chars().count();
    if length < MIN_USERNAME_LENGTH || length > MAX_USERNAME_LENGTH {
        return Err(ApiError::BadRequest("Username must be 3-50 characters".to_string()));
    }
    // Usernames are lookup keys, so they must already be plain text.
    if sanitize_text(&username) != username {
        return Err(ApiError::BadRequest("Username must not contain markup".to_string()));
    }
    if !is_valid_email(&email) {
        return Err(ApiError::BadRequest("Email is not valid".to_string()));
    }
    if candidate.password.len() < MIN_PASSWORD_LENGTH {
        return Err(ApiError::BadRequest("Password must be at least 8 characters".to_string()));
    }

    let photo_url = candidate
        .photo_url
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty());

    Ok(Register {
        username,
        email,
        password: candidate.password,
        photo_url,
    })
}

/// The user behind the request's session cookie.
pub struct SessionUser(pub User);

impl FromRequest for SessionUser {
    type Error = ApiError;
    type Future = Pin<Box<dyn Future<Output = Result<Self, Self::Error>>>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let state = req.app_data::<web::Data<AppState>>().cloned();
        let token = req.cookie(SESSION_COOKIE_NAME).map(|c| c.value().to_string());

        Box::pin(async move {
            let state = state.ok_or_else(|| {
                ApiError::Internal("application state is not configured".to_string())
            })?;
            let token = token
                .filter(|t| !t.is_empty())
                .ok_or_else(ApiError::invalid_session)?;

            let user = state.credentials.verify_session(&state.pool, &token).await?;
            Ok(SessionUser(user))
        })
    }
}

// === HTTP Handlers ===

pub async fn register_user(
    state: web::Data<AppState>,
    body: web::Json<Register>,
) -> ApiResult<HttpResponse> {
    let id = state.credentials.register(&state.pool, body.into_inner()).await?;
    Ok(HttpResponse::Created().json(id))
}

pub async fn login_user(
    state: web::Data<AppState>,
    body: web::Json<LoginRequest>,
) -> ApiResult<HttpResponse> {
    let creds = body.into_inner();
    let email = creds.email.trim().to_lowercase();
    let (user, token) = state.credentials.login(&state.pool, &email, &creds.password).await?;

    Ok(HttpResponse::Ok()
        .cookie(state.credentials.session_cookie(token))
        .json(user))
}

pub async fn logout_user(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok()
        .cookie(state.credentials.cleared_cookie())
        .json(serde_json::json!({ "message": "Logged out successfully" }))
}
