use actix_web::{web, HttpResponse};
use sqlx::SqlitePool;

use crate::core::errors::{ApiError, ApiResult};
use crate::models::models::{User, UserProfile};
use crate::AppState;

pub async fn find_by_id(pool: &SqlitePool, id: i64) -> ApiResult<User> {
    sqlx::query_as::<_, User>(
        r#"
        SELECT id, username, email, '' AS password, photo_url
        FROM users
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| ApiError::NotFound("User not found".to_string()))
}

pub async fn find_by_username(pool: &SqlitePool, username: &str) -> ApiResult<User> {
    sqlx::query_as::<_, User>(
        r#"
        SELECT id, username, email, '' AS password, photo_url
        FROM users
        WHERE username = ?
        "#,
    )
    .bind(username)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| ApiError::NotFound("User not found".to_string()))
}

/// The only lookup that carries the stored password hash; used by login
/// and session checks.
pub async fn find_by_email(pool: &SqlitePool, email: &str) -> ApiResult<Option<User>> {
    let user = sqlx::query_as::<_, User>(
        r#"
        SELECT id, username, email, password, photo_url
        FROM users
        WHERE email = ?
        "#,
    )
    .bind(email)
    .fetch_optional(pool)
    .await?;

    Ok(user)
}

pub async fn profile_by_id(pool: &SqlitePool, id: i64) -> ApiResult<UserProfile> {
    sqlx::query_as::<_, UserProfile>(
        r#"
        SELECT username, COALESCE(photo_url, '') AS photo_url
        FROM users
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| ApiError::NotFound("User not found".to_string()))
}

pub async fn insert_user(
    pool: &SqlitePool,
    username: &str,
    email: &str,
    password_hash: &str,
    photo_url: Option<&str>,
) -> ApiResult<i64> {
    let result = sqlx::query(
        r#"
        INSERT INTO users (username, email, password, photo_url)
        VALUES (?, ?, ?, ?)
        "#,
    )
    .bind(username)
    .bind(email)
    .bind(password_hash)
    .bind(photo_url)
    .execute(pool)
    .await?;

    Ok(result.last_insert_rowid())
}

// === HTTP Handlers ===

pub async fn get_user_profile(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let user = find_by_username(&state.pool, &path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(user))
}
