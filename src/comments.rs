use actix_web::{web, HttpResponse};
use sqlx::SqlitePool;

use crate::auth::SessionUser;
use crate::config::MAX_COMMENT_LENGTH;
use crate::core::errors::{ApiError, ApiResult};
use crate::core::helpers::{now_utc, parse_id, sanitize_text};
use crate::models::models::{Comment, CommentView, CreateCommentRequest};
use crate::{users, AppState};

pub async fn create_comment(
    pool: &SqlitePool,
    post_id: i64,
    author_id: i64,
    content: &str,
) -> ApiResult<Comment> {
    let content = sanitize_text(content.trim());
    if content.is_empty() || content.chars().count() > MAX_COMMENT_LENGTH {
        return Err(ApiError::BadRequest("Invalid comment content".to_string()));
    }

    let created_at = now_utc();
    let result = sqlx::query(
        r#"
        INSERT INTO comments (content, created_at, user_id, post_id)
        VALUES (?, ?, ?, ?)
        "#,
    )
    .bind(&content)
    .bind(created_at)
    .bind(author_id)
    .bind(post_id)
    .execute(pool)
    .await
    .map_err(|err| match ApiError::from(err) {
        ApiError::NotFound(_) => ApiError::NotFound("Post not found".to_string()),
        other => other,
    })?;

    let id = result.last_insert_rowid();
    tracing::info!(comment_id = id, post_id, author_id, "created comment");

    Ok(Comment {
        id,
        content,
        created_at,
        user_id: author_id,
        post_id,
    })
}

/// Deletes by id alone; callers decide who may do so.
pub async fn delete_comment(pool: &SqlitePool, comment_id: i64) -> ApiResult<()> {
    sqlx::query("DELETE FROM comments WHERE id = ?")
        .bind(comment_id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn comment_author(pool: &SqlitePool, comment_id: i64) -> ApiResult<i64> {
    sqlx::query_scalar::<_, i64>("SELECT user_id FROM comments WHERE id = ?")
        .bind(comment_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ApiError::NotFound("Comment not found".to_string()))
}

pub async fn list_by_post(pool: &SqlitePool, post_id: i64) -> ApiResult<Vec<CommentView>> {
    let rows = sqlx::query_as::<_, Comment>(
        r#"
        SELECT id, content, created_at, user_id, post_id
        FROM comments
        WHERE post_id = ?
        ORDER BY created_at DESC, id DESC
        "#,
    )
    .bind(post_id)
    .fetch_all(pool)
    .await?;

    with_authors(pool, rows).await
}

pub async fn list_by_user(pool: &SqlitePool, user_id: i64) -> ApiResult<Vec<CommentView>> {
    let rows = sqlx::query_as::<_, Comment>(
        r#"
        SELECT id, content, created_at, user_id, post_id
        FROM comments
        WHERE user_id = ?
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    with_authors(pool, rows).await
}

async fn with_authors(pool: &SqlitePool, rows: Vec<Comment>) -> ApiResult<Vec<CommentView>> {
    let mut views = Vec::with_capacity(rows.len());
    for comment in rows {
        let author = users::profile_by_id(pool, comment.user_id).await?;
        views.push(CommentView::new(comment, author));
    }
    Ok(views)
}

// === HTTP Handlers ===

pub async fn create_comment_handler(
    state: web::Data<AppState>,
    session: SessionUser,
    path: web::Path<String>,
    body: web::Json<CreateCommentRequest>,
) -> ApiResult<HttpResponse> {
    let post_id = parse_id(&path)?;
    let comment = create_comment(&state.pool, post_id, session.0.id, &body.content).await?;
    Ok(HttpResponse::Ok().json(comment))
}

pub async fn delete_comment_handler(
    state: web::Data<AppState>,
    session: SessionUser,
    path: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let comment_id = parse_id(&path)?;
    if comment_author(&state.pool, comment_id).await? != session.0.id {
        return Err(ApiError::Forbidden);
    }

    delete_comment(&state.pool, comment_id).await?;
    Ok(HttpResponse::NoContent().finish())
}

pub async fn list_post_comments_handler(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let post_id = parse_id(&path)?;
    let comments = list_by_post(&state.pool, post_id).await?;
    Ok(HttpResponse::Ok().json(comments))
}

pub async fn list_user_comments_handler(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let user = users::find_by_id(&state.pool, parse_id(&path)?).await?;
    let comments = list_by_user(&state.pool, user.id).await?;
    Ok(HttpResponse::Ok().json(comments))
}
