use std::collections::HashMap;

use actix_web::{web, HttpResponse};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, QueryBuilder, Sqlite, SqliteConnection, SqlitePool};

use crate::auth::SessionUser;
use crate::config::*;
use crate::core::errors::{ApiError, ApiResult};
use crate::core::helpers::{now_utc, parse_id, sanitize_text};
use crate::models::models::{CreatePostRequest, PostView};
use crate::{likes, users, AppState};

/// Base columns of a post plus its live comment count.
const POST_SELECT: &str = r#"
    SELECT p.id, p.title, p.content, p.created_at, p.user_id,
           (SELECT COUNT(*) FROM comments c WHERE c.post_id = p.id) AS comment_count
    FROM posts p
"#;

#[derive(FromRow)]
struct PostRow {
    id: i64,
    title: String,
    content: String,
    created_at: DateTime<Utc>,
    user_id: i64,
    comment_count: i64,
}

pub async fn list_posts(pool: &SqlitePool) -> ApiResult<Vec<PostView>> {
    let rows = sqlx::query_as::<_, PostRow>(&format!(
        "{} ORDER BY p.created_at DESC, p.id DESC",
        POST_SELECT
    ))
    .fetch_all(pool)
    .await?;

    assemble(pool, rows).await
}

pub async fn get_post(pool: &SqlitePool, id: i64) -> ApiResult<PostView> {
    let row = sqlx::query_as::<_, PostRow>(&format!("{} WHERE p.id = ?", POST_SELECT))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ApiError::NotFound("Post not found".to_string()))?;

    let mut views = assemble(pool, vec![row]).await?;
    views
        .pop()
        .ok_or_else(|| ApiError::NotFound("Post not found".to_string()))
}

pub async fn list_posts_by_user_id(pool: &SqlitePool, user_id: i64) -> ApiResult<Vec<PostView>> {
    let rows = sqlx::query_as::<_, PostRow>(&format!(
        "{} WHERE p.user_id = ? ORDER BY p.created_at DESC, p.id DESC",
        POST_SELECT
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    assemble(pool, rows).await
}

pub async fn list_posts_by_username(pool: &SqlitePool, username: &str) -> ApiResult<Vec<PostView>> {
    let user = users::find_by_username(pool, username).await?;
    list_posts_by_user_id(pool, user.id).await
}

/// Inserts the post and its photos in one transaction, then returns the
/// full view.
pub async fn create_post(
    pool: &SqlitePool,
    author_id: i64,
    request: CreatePostRequest,
) -> ApiResult<PostView> {
    let request = validate_post_request(request)?;
    let mut tx = pool.begin().await?;

    let post_id = sqlx::query(
        r#"
        INSERT INTO posts (title, content, created_at, user_id)
        VALUES (?, ?, ?, ?)
        "#,
    )
    .bind(&request.title)
    .bind(&request.content)
    .bind(now_utc())
    .bind(author_id)
    .execute(&mut *tx)
    .await?
    .last_insert_rowid();

    insert_photos(&mut tx, post_id, &request.photo_urls).await?;
    tx.commit().await?;

    tracing::info!(post_id, author_id, photos = request.photo_urls.len(), "created post");
    get_post(pool, post_id).await
}

/// Title and content are always overwritten. The photo set is replaced only
/// when the request carries at least one URL; an empty list keeps the
/// stored photos.
pub async fn update_post(
    pool: &SqlitePool,
    post_id: i64,
    request: CreatePostRequest,
) -> ApiResult<PostView> {
    let request = validate_post_request(request)?;
    let mut tx = pool.begin().await?;

    let updated = sqlx::query("UPDATE posts SET title = ?, content = ? WHERE id = ?")
        .bind(&request.title)
        .bind(&request.content)
        .bind(post_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

    if updated == 0 {
        return Err(ApiError::NotFound("Post not found".to_string()));
    }

    if !request.photo_urls.is_empty() {
        sqlx::query("DELETE FROM photos WHERE post_id = ?")
            .bind(post_id)
            .execute(&mut *tx)
            .await?;
        insert_photos(&mut tx, post_id, &request.photo_urls).await?;
    }

    tx.commit().await?;

    tracing::info!(post_id, "updated post");
    get_post(pool, post_id).await
}

/// Removes photos, likes, comments and finally the post, all or nothing.
/// Returns the number of post rows removed.
pub async fn delete_post(pool: &SqlitePool, post_id: i64) -> ApiResult<u64> {
    let mut tx = pool.begin().await?;

    for statement in [
        "DELETE FROM photos WHERE post_id = ?",
        "DELETE FROM post_likes WHERE post_id = ?",
        "DELETE FROM comments WHERE post_id = ?",
    ] {
        sqlx::query(statement).bind(post_id).execute(&mut *tx).await?;
    }

    let removed = sqlx::query("DELETE FROM posts WHERE id = ?")
        .bind(post_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

    tx.commit().await?;

    tracing::info!(post_id, removed, "deleted post");
    Ok(removed)
}

pub async fn post_owner(pool: &SqlitePool, post_id: i64) -> ApiResult<i64> {
    sqlx::query_scalar::<_, i64>("SELECT user_id FROM posts WHERE id = ?")
        .bind(post_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ApiError::NotFound("Post not found".to_string()))
}

async fn insert_photos(
    conn: &mut SqliteConnection,
    post_id: i64,
    urls: &[String],
) -> Result<(), sqlx::Error> {
    for url in urls {
        sqlx::query("INSERT INTO photos (url, post_id) VALUES (?, ?)")
            .bind(url)
            .bind(post_id)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

/// Photo URLs for every given post, each list in insertion order.
async fn photos_for(pool: &SqlitePool, post_ids: &[i64]) -> ApiResult<HashMap<i64, Vec<String>>> {
    let mut photos: HashMap<i64, Vec<String>> = HashMap::new();
    if post_ids.is_empty() {
        return Ok(photos);
    }

    let mut query = QueryBuilder::<Sqlite>::new("SELECT post_id, url FROM photos WHERE post_id IN (");
    let mut ids = query.separated(", ");
    for id in post_ids {
        ids.push_bind(*id);
    }
    ids.push_unseparated(") ORDER BY id");

    let rows: Vec<(i64, String)> = query.build_query_as().fetch_all(pool).await?;
    for (post_id, url) in rows {
        photos.entry(post_id).or_default().push(url);
    }

    Ok(photos)
}

async fn assemble(pool: &SqlitePool, rows: Vec<PostRow>) -> ApiResult<Vec<PostView>> {
    let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
    let mut photos = photos_for(pool, &ids).await?;

    let mut views = Vec::with_capacity(rows.len());
    for row in rows {
        let liked_by = likes::list_likers(pool, row.id).await?;
        let user = users::profile_by_id(pool, row.user_id).await?;

        views.push(PostView {
            id: row.id,
            title: row.title,
            content: row.content,
            created_at: row.created_at,
            user_id: row.user_id,
            user,
            photo_urls: photos.remove(&row.id).unwrap_or_default(),
            liked_by,
            comment_count: row.comment_count,
        });
    }

    Ok(views)
}

fn validate_post_request(request: CreatePostRequest) -> ApiResult<CreatePostRequest> {
    let title = sanitize_text(request.title.trim());
    let content = sanitize_text(request.content.trim());

    if title.is_empty() || title.chars().count() > MAX_TITLE_LENGTH {
        return Err(ApiError::BadRequest("Invalid title".to_string()));
    }
    if content.is_empty() || content.chars().count() > MAX_POST_LENGTH {
        return Err(ApiError::BadRequest("Invalid content".to_string()));
    }
    if request.photo_urls.len() > MAX_PHOTOS_PER_POST {
        return Err(ApiError::BadRequest("Too many photos".to_string()));
    }

    let mut photo_urls = Vec::with_capacity(request.photo_urls.len());
    for url in request.photo_urls {
        let url = url.trim().to_string();
        if url.is_empty() || url.len() > MAX_PHOTO_URL_LENGTH {
            return Err(ApiError::BadRequest("Invalid photo URL".to_string()));
        }
        photo_urls.push(url);
    }

    Ok(CreatePostRequest {
        title,
        content,
        photo_urls,
    })
}

fn ensure_owner(session: &SessionUser, owner_id: i64) -> ApiResult<()> {
    if session.0.id != owner_id {
        tracing::warn!(user_id = session.0.id, owner_id, "post ownership check failed");
        return Err(ApiError::Forbidden);
    }
    Ok(())
}

// === HTTP Handlers ===

pub async fn list_posts_handler(state: web::Data<AppState>) -> ApiResult<HttpResponse> {
    let posts = list_posts(&state.pool).await?;
    Ok(HttpResponse::Ok().json(posts))
}

pub async fn get_post_handler(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let post_id = parse_id(&path)?;
    let post = get_post(&state.pool, post_id).await?;
    Ok(HttpResponse::Ok().json(post))
}

pub async fn list_user_posts_handler(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let posts = list_posts_by_username(&state.pool, &path).await?;
    Ok(HttpResponse::Ok().json(posts))
}

pub async fn create_post_handler(
    state: web::Data<AppState>,
    session: SessionUser,
    body: web::Json<CreatePostRequest>,
) -> ApiResult<HttpResponse> {
    let post = create_post(&state.pool, session.0.id, body.into_inner()).await?;
    Ok(HttpResponse::Created().json(post))
}

pub async fn update_post_handler(
    state: web::Data<AppState>,
    session: SessionUser,
    path: web::Path<String>,
    body: web::Json<CreatePostRequest>,
) -> ApiResult<HttpResponse> {
    let post_id = parse_id(&path)?;
    ensure_owner(&session, post_owner(&state.pool, post_id).await?)?;

    let post = update_post(&state.pool, post_id, body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(post))
}

pub async fn delete_post_handler(
    state: web::Data<AppState>,
    session: SessionUser,
    path: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let post_id = parse_id(&path)?;
    ensure_owner(&session, post_owner(&state.pool, post_id).await?)?;

    let removed = delete_post(&state.pool, post_id).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "deleted": removed })))
}
