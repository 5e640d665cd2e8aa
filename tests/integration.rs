use actix_web::cookie::Cookie;
use actix_web::http::StatusCode;
use actix_web::{test, web, App};
use serde_json::{json, Value};

use natter::auth::CredentialService;
use natter::core::db;
use natter::AppState;

async fn state() -> web::Data<AppState> {
    let pool = db::open_in_memory().await.expect("in-memory database");
    web::Data::new(AppState {
        pool,
        credentials: CredentialService::new("integration-secret", 24),
    })
}

macro_rules! app {
    ($state:expr) => {
        test::init_service(App::new().app_data($state.clone()).configure(natter::configure)).await
    };
}

/// Registers `<name>` with password `<name>-password` and returns the new id.
macro_rules! register {
    ($app:expr, $name:expr) => {{
        let req = test::TestRequest::post()
            .uri("/api/auth/register")
            .set_json(json!({
                "username": $name,
                "email": format!("{}@example.com", $name),
                "password": format!("{}-password", $name),
                "photoUrl": format!("http://img/{}", $name),
            }))
            .to_request();
        let resp = test::call_service(&$app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        test::read_body_json::<i64, _>(resp).await
    }};
}

/// Logs `<name>` in and returns the session cookie.
macro_rules! login {
    ($app:expr, $name:expr) => {{
        let req = test::TestRequest::post()
            .uri("/api/auth/login")
            .set_json(json!({
                "email": format!("{}@example.com", $name),
                "password": format!("{}-password", $name),
            }))
            .to_request();
        let resp = test::call_service(&$app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        resp.response()
            .cookies()
            .find(|c| c.name() == "token")
            .map(Cookie::into_owned)
            .expect("session cookie")
    }};
}

macro_rules! create_post {
    ($app:expr, $cookie:expr, $body:expr) => {{
        let req = test::TestRequest::post()
            .uri("/api/posts")
            .cookie($cookie.clone())
            .set_json($body)
            .to_request();
        let resp = test::call_service(&$app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        test::read_body_json::<Value, _>(resp).await
    }};
}

#[actix_web::test]
async fn test_register_rejects_duplicate_email() {
    let state = state().await;
    let app = app!(state);

    register!(app, "alice");

    let req = test::TestRequest::post()
        .uri("/api/auth/register")
        .set_json(json!({
            "username": "alice2",
            "email": "alice@example.com",
            "password": "another-password",
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);
}

#[actix_web::test]
async fn test_register_validates_input() {
    let state = state().await;
    let app = app!(state);

    let req = test::TestRequest::post()
        .uri("/api/auth/register")
        .set_json(json!({ "username": "al", "email": "nope", "password": "short" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn test_login_sets_cookie_and_hides_secrets() {
    let state = state().await;
    let app = app!(state);
    let id = register!(app, "alice");

    let req = test::TestRequest::post()
        .uri("/api/auth/login")
        .set_json(json!({ "email": "alice@example.com", "password": "alice-password" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let cookie = resp
        .response()
        .cookies()
        .find(|c| c.name() == "token")
        .map(Cookie::into_owned)
        .expect("session cookie");
    assert!(!cookie.value().is_empty());
    assert_eq!(cookie.http_only(), Some(true));
    assert_eq!(cookie.path(), Some("/"));

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["id"], id);
    assert_eq!(body["username"], "alice");
    assert_eq!(body["photoUrl"], "http://img/alice");
    assert!(body.get("password").is_none());
    assert!(body.get("token").is_none());
}

#[actix_web::test]
async fn test_login_failures_are_indistinguishable() {
    let state = state().await;
    let app = app!(state);
    register!(app, "alice");

    let wrong_password = test::TestRequest::post()
        .uri("/api/auth/login")
        .set_json(json!({ "email": "alice@example.com", "password": "not-her-password" }))
        .to_request();
    let resp = test::call_service(&app, wrong_password).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let first: Value = test::read_body_json(resp).await;

    let unknown_email = test::TestRequest::post()
        .uri("/api/auth/login")
        .set_json(json!({ "email": "ghost@example.com", "password": "whatever-password" }))
        .to_request();
    let resp = test::call_service(&app, unknown_email).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let second: Value = test::read_body_json(resp).await;

    assert_eq!(first, second);
}

#[actix_web::test]
async fn test_malformed_json_is_bad_request() {
    let state = state().await;
    let app = app!(state);

    let req = test::TestRequest::post()
        .uri("/api/auth/login")
        .insert_header(("content-type", "application/json"))
        .set_payload("{\"email\": ")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let body: Value = test::read_body_json(resp).await;
    assert!(body["error"].as_str().unwrap().starts_with("Error decoding json request"));
}

#[actix_web::test]
async fn test_session_required_for_writes() {
    let state = state().await;
    let app = app!(state);

    let req = test::TestRequest::post()
        .uri("/api/posts")
        .set_json(json!({ "title": "t", "content": "c" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let req = test::TestRequest::put()
        .uri("/api/likes/1/like")
        .cookie(Cookie::new("token", "forged.token.value"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn test_bad_ids_are_rejected() {
    let state = state().await;
    let app = app!(state);

    for uri in [
        "/api/post/abc",
        "/api/comments/abc",
        "/api/likes/abc",
        "/api/likes/by-user/abc",
        "/api/comments/by-user/-3",
    ] {
        let req = test::TestRequest::get().uri(uri).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "{}", uri);
    }
}

#[actix_web::test]
async fn test_missing_post_is_not_found() {
    let state = state().await;
    let app = app!(state);

    let req = test::TestRequest::get().uri("/api/post/999").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn test_per_user_listings_need_a_known_user() {
    let state = state().await;
    let app = app!(state);
    let alice = register!(app, "alice");

    for uri in ["/api/likes/by-user/999", "/api/comments/by-user/999"] {
        let req = test::TestRequest::get().uri(uri).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND, "{}", uri);
    }

    for uri in [
        format!("/api/likes/by-user/{}", alice),
        format!("/api/comments/by-user/{}", alice),
    ] {
        let req = test::TestRequest::get().uri(&uri).to_request();
        let listed: Vec<Value> = test::call_and_read_body_json(&app, req).await;
        assert!(listed.is_empty(), "{}", uri);
    }
}

#[actix_web::test]
async fn test_plain_text_round_trips_over_http() {
    let state = state().await;
    let app = app!(state);
    register!(app, "r&d");
    let cookie = login!(app, "r&d");

    let post = create_post!(app, cookie, json!({ "title": "Tom & Jerry", "content": "if a < b && b > c" }));
    assert_eq!(post["title"], "Tom & Jerry");
    assert_eq!(post["content"], "if a < b && b > c");

    let req = test::TestRequest::get().uri("/api/users/r&d").to_request();
    let profile: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(profile["username"], "r&d");
}

#[actix_web::test]
async fn test_like_twice_conflicts_and_dislike_removes() {
    let state = state().await;
    let app = app!(state);
    register!(app, "alice");
    let bob = register!(app, "bob");
    let alice_cookie = login!(app, "alice");
    let bob_cookie = login!(app, "bob");

    let post = create_post!(app, alice_cookie, json!({ "title": "hello", "content": "world" }));
    let post_id = post["id"].as_i64().unwrap();
    let like_uri = format!("/api/likes/{}/like", post_id);

    let req = test::TestRequest::put().uri(&like_uri).cookie(bob_cookie.clone()).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

    let req = test::TestRequest::put().uri(&like_uri).cookie(bob_cookie.clone()).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CONFLICT);

    let req = test::TestRequest::get().uri(&format!("/api/likes/{}", post_id)).to_request();
    let likers: Vec<i64> = test::call_and_read_body_json(&app, req).await;
    assert_eq!(likers, vec![bob]);

    let req = test::TestRequest::get().uri(&format!("/api/likes/by-user/{}", bob)).to_request();
    let liked: Vec<Value> = test::call_and_read_body_json(&app, req).await;
    assert_eq!(liked.len(), 1);
    assert_eq!(liked[0]["id"], post_id);

    let req = test::TestRequest::put()
        .uri(&format!("/api/likes/{}/dislike", post_id))
        .cookie(bob_cookie)
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

    let req = test::TestRequest::get().uri(&format!("/api/likes/{}", post_id)).to_request();
    let likers: Vec<i64> = test::call_and_read_body_json(&app, req).await;
    assert!(likers.is_empty());
}

#[actix_web::test]
async fn test_only_owner_modifies_post() {
    let state = state().await;
    let app = app!(state);
    register!(app, "alice");
    register!(app, "bob");
    let alice_cookie = login!(app, "alice");
    let bob_cookie = login!(app, "bob");

    let post = create_post!(
        app,
        alice_cookie,
        json!({ "title": "draft", "content": "first", "photoUrls": ["http://img/1"] })
    );
    let uri = format!("/api/posts/{}", post["id"]);

    let req = test::TestRequest::put()
        .uri(&uri)
        .cookie(bob_cookie.clone())
        .set_json(json!({ "title": "hijack", "content": "x" }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);

    let req = test::TestRequest::delete().uri(&uri).cookie(bob_cookie).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);

    let req = test::TestRequest::put()
        .uri(&uri)
        .cookie(alice_cookie)
        .set_json(json!({ "title": "final", "content": "second" }))
        .to_request();
    let updated: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(updated["title"], "final");
    assert_eq!(updated["photoUrls"], json!(["http://img/1"]));
}

#[actix_web::test]
async fn test_comment_lifecycle() {
    let state = state().await;
    let app = app!(state);
    register!(app, "alice");
    register!(app, "bob");
    let alice_cookie = login!(app, "alice");
    let bob_cookie = login!(app, "bob");

    let post = create_post!(app, alice_cookie, json!({ "title": "t", "content": "c" }));
    let comments_uri = format!("/api/comments/{}", post["id"]);

    let req = test::TestRequest::post()
        .uri(&comments_uri)
        .cookie(bob_cookie.clone())
        .set_json(json!({ "content": "<b>nice</b> post" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let comment: Value = test::read_body_json(resp).await;
    assert_eq!(comment["content"], "nice post");

    let req = test::TestRequest::get().uri(&comments_uri).to_request();
    let listed: Vec<Value> = test::call_and_read_body_json(&app, req).await;
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0]["username"], "bob");
    assert_eq!(listed[0]["userPhoto"], "http://img/bob");

    let delete_uri = format!("/api/comments/{}", comment["id"]);
    let req = test::TestRequest::delete().uri(&delete_uri).cookie(alice_cookie).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);

    let req = test::TestRequest::delete().uri(&delete_uri).cookie(bob_cookie).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NO_CONTENT);

    let req = test::TestRequest::get().uri(&comments_uri).to_request();
    let listed: Vec<Value> = test::call_and_read_body_json(&app, req).await;
    assert!(listed.is_empty());
}

#[actix_web::test]
async fn test_logout_clears_cookie() {
    let state = state().await;
    let app = app!(state);

    let req = test::TestRequest::post().uri("/api/auth/logout").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let cookie = resp
        .response()
        .cookies()
        .find(|c| c.name() == "token")
        .map(Cookie::into_owned)
        .expect("cleared cookie");
    assert!(cookie.value().is_empty());
}

#[actix_web::test]
async fn test_user_profile_and_posts_by_username() {
    let state = state().await;
    let app = app!(state);
    register!(app, "alice");
    let cookie = login!(app, "alice");
    create_post!(app, cookie, json!({ "title": "one", "content": "a" }));

    let req = test::TestRequest::get().uri("/api/users/alice").to_request();
    let profile: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(profile["username"], "alice");
    assert!(profile.get("password").is_none());

    let req = test::TestRequest::get().uri("/api/posts/user/alice").to_request();
    let posts: Vec<Value> = test::call_and_read_body_json(&app, req).await;
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0]["user"]["username"], "alice");

    let req = test::TestRequest::get().uri("/api/users/nobody").to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn test_end_to_end_post_scenario() {
    let state = state().await;
    let app = app!(state);
    let alice = register!(app, "alice");
    let bob = register!(app, "bob");
    let alice_cookie = login!(app, "alice");
    let bob_cookie = login!(app, "bob");

    let post = create_post!(
        app,
        alice_cookie,
        json!({
            "title": "Holiday",
            "content": "Pictures from the coast",
            "photoUrls": ["http://img/a.jpg", "http://img/b.jpg"],
        })
    );
    let post_id = post["id"].as_i64().unwrap();
    assert_eq!(post["userId"], alice);
    assert_eq!(post["commentCount"], 0);

    let req = test::TestRequest::put()
        .uri(&format!("/api/likes/{}/like", post_id))
        .cookie(bob_cookie.clone())
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

    let post_uri = format!("/api/post/{}", post_id);
    let req = test::TestRequest::get().uri(&post_uri).to_request();
    let fetched: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(fetched["likedBy"], json!([bob]));
    assert_eq!(fetched["commentCount"], 0);
    assert_eq!(fetched["photoUrls"], json!(["http://img/a.jpg", "http://img/b.jpg"]));
    assert_eq!(fetched["user"]["username"], "alice");

    let req = test::TestRequest::post()
        .uri(&format!("/api/comments/{}", post_id))
        .cookie(bob_cookie)
        .set_json(json!({ "content": "Looks great" }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

    let req = test::TestRequest::get().uri(&post_uri).to_request();
    let fetched: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(fetched["commentCount"], 1);

    let req = test::TestRequest::get().uri("/api/posts").to_request();
    let feed: Vec<Value> = test::call_and_read_body_json(&app, req).await;
    assert_eq!(feed.len(), 1);

    let req = test::TestRequest::delete()
        .uri(&format!("/api/posts/{}", post_id))
        .cookie(alice_cookie)
        .to_request();
    let deleted: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(deleted["deleted"], 1);

    let req = test::TestRequest::get().uri(&post_uri).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);

    let req = test::TestRequest::get().uri(&format!("/api/comments/by-user/{}", bob)).to_request();
    let comments: Vec<Value> = test::call_and_read_body_json(&app, req).await;
    assert!(comments.is_empty());
}
