use actix_web::{web, HttpResponse};
use sqlx::SqlitePool;

use crate::auth::SessionUser;
use crate::core::errors::{ApiError, ApiResult};
use crate::core::helpers::parse_id;
use crate::models::models::PostView;
use crate::{posts, users, AppState};

/// `liked = true` inserts the (user, post) pair and fails with `Conflict` when
/// it already exists. `liked = false` removes it; removing an absent pair is
/// a no-op.
pub async fn set_like(pool: &SqlitePool, user_id: i64, post_id: i64, liked: bool) -> ApiResult<()> {
    if liked {
        sqlx::query("INSERT INTO post_likes (user_id, post_id) VALUES (?, ?)")
            .bind(user_id)
            .bind(post_id)
            .execute(pool)
            .await
            .map_err(|err| match ApiError::from(err) {
                ApiError::Conflict(_) => ApiError::Conflict("Post already liked".to_string()),
                ApiError::NotFound(_) => ApiError::NotFound("Post not found".to_string()),
                other => other,
            })?;
    } else {
        sqlx::query("DELETE FROM post_likes WHERE user_id = ? AND post_id = ?")
            .bind(user_id)
            .bind(post_id)
            .execute(pool)
            .await?;
    }

    tracing::info!(user_id, post_id, liked, "changed post like");
    Ok(())
}

pub async fn list_likers(pool: &SqlitePool, post_id: i64) -> ApiResult<Vec<i64>> {
    let likers = sqlx::query_scalar::<_, i64>("SELECT user_id FROM post_likes WHERE post_id = ?")
        .bind(post_id)
        .fetch_all(pool)
        .await?;
    Ok(likers)
}

pub async fn list_liked_post_ids(pool: &SqlitePool, user_id: i64) -> ApiResult<Vec<i64>> {
    let ids = sqlx::query_scalar::<_, i64>("SELECT post_id FROM post_likes WHERE user_id = ?")
        .bind(user_id)
        .fetch_all(pool)
        .await?;
    Ok(ids)
}

// TODO: one query per liked post; page this once liked lists get long.
pub async fn list_liked_posts(pool: &SqlitePool, user_id: i64) -> ApiResult<Vec<PostView>> {
    let ids = list_liked_post_ids(pool, user_id).await?;

    let mut views = Vec::with_capacity(ids.len());
    for id in ids {
        views.push(posts::get_post(pool, id).await?);
    }
    Ok(views)
}

// === HTTP Handlers ===

pub async fn liked_posts_handler(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let user = users::find_by_id(&state.pool, parse_id(&path)?).await?;
    let liked = list_liked_posts(&state.pool, user.id).await?;
    Ok(HttpResponse::Ok().json(liked))
}

pub async fn post_likers_handler(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let post_id = parse_id(&path)?;
    let likers = list_likers(&state.pool, post_id).await?;
    Ok(HttpResponse::Ok().json(likers))
}

pub async fn like_handler(
    state: web::Data<AppState>,
    session: SessionUser,
    path: web::Path<String>,
) -> ApiResult<HttpResponse> {
    modify_like(state, session, path, true).await
}

pub async fn dislike_handler(
    state: web::Data<AppState>,
    session: SessionUser,
    path: web::Path<String>,
) -> ApiResult<HttpResponse> {
    modify_like(state, session, path, false).await
}

async fn modify_like(
    state: web::Data<AppState>,
    session: SessionUser,
    path: web::Path<String>,
    liked: bool,
) -> ApiResult<HttpResponse> {
    let post_id = parse_id(&path)?;
    set_like(&state.pool, session.0.id, post_id, liked).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "message": "Post like modified successfully" })))
}
