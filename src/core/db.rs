use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;

use crate::auth::CredentialService;
use crate::models::models::{CreatePostRequest, Register};
use crate::{comments, likes, posts, users};

pub async fn connect(database_url: &str, max_connections: u32) -> anyhow::Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(database_url)
        .context("Failed to parse database url")?
        .create_if_missing(true)
        .foreign_keys(true);

    SqlitePoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(10))
        .connect_with(options)
        .await
        .context("Failed to connect to database")
}

/// Single-connection in-memory database with the schema applied. The
/// connection is never recycled, since that would drop the data with it.
pub async fn open_in_memory() -> anyhow::Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await?;

    migrate(&pool).await?;
    Ok(pool)
}

pub async fn migrate(pool: &SqlitePool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("Failed to run migrations")
}

/// Seeds three demo accounts with a few posts. Does nothing when the
/// `test` account already exists.
pub async fn seed_demo_data(pool: &SqlitePool, credentials: &CredentialService) -> anyhow::Result<()> {
    if users::find_by_username(pool, "test").await.is_ok() {
        return Ok(());
    }

    let mut ids = Vec::new();
    for (name, photo) in [
        ("test", None),
        ("alice", Some("https://picsum.photos/id/64/200")),
        ("bob", Some("https://picsum.photos/id/91/200")),
    ] {
        let id = credentials
            .register(
                pool,
                Register {
                    username: name.to_string(),
                    email: format!("{}@natter.local", name),
                    password: format!("{}-password", name),
                    photo_url: photo.map(str::to_string),
                },
            )
            .await?;
        ids.push(id);
    }
    let (test_id, alice_id, bob_id) = (ids[0], ids[1], ids[2]);

    posts::create_post(
        pool,
        test_id,
        CreatePostRequest {
            title: "Hello natter".to_string(),
            content: "This is my first post on natter!".to_string(),
            photo_urls: vec![],
        },
    )
    .await?;

    let alice_post = posts::create_post(
        pool,
        alice_id,
        CreatePostRequest {
            title: "Weekend hike".to_string(),
            content: "Just finished an amazing hike. Feeling great today!".to_string(),
            photo_urls: vec![
                "https://picsum.photos/id/1018/800".to_string(),
                "https://picsum.photos/id/1015/800".to_string(),
            ],
        },
    )
    .await?;

    let bob_post = posts::create_post(
        pool,
        bob_id,
        CreatePostRequest {
            title: "Hi all".to_string(),
            content: "Hey everyone! Just joined, looking forward to chatting.".to_string(),
            photo_urls: vec![],
        },
    )
    .await?;

    likes::set_like(pool, test_id, bob_post.id, true).await?;
    likes::set_like(pool, bob_id, alice_post.id, true).await?;
    comments::create_comment(pool, alice_post.id, bob_id, "Looks beautiful!").await?;

    tracing::info!("seeded demo data");
    Ok(())
}
