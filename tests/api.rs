use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use serde_json::{Value, json};
use sqlx::sqlite::SqlitePoolOptions;
use tower::ServiceExt;

use cohabify::{AppState, Config, Mailer, app, db};

async fn test_app() -> Router {
    let db_pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    db::init_schema(&db_pool).await.unwrap();

    app(AppState {
        db_pool,
        config: Arc::new(Config::load()),
        mailer: Mailer::preview("support@example.com"),
    })
}

async fn request(
    app: &Router,
    method: &str,
    path: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(path);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

async fn register(app: &Router, name: &str) -> String {
    let (status, body) = request(
        app,
        "POST",
        "/api/auth/register",
        None,
        Some(json!({
            "username": name,
            "email": format!("{name}@example.com"),
            "password": "password123",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "register failed: {body}");
    body["token"].as_str().unwrap().to_string()
}

async fn user_id(app: &Router, token: &str) -> String {
    let (_, body) = request(app, "GET", "/api/auth/me", Some(token), None).await;
    body["user"]["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn register_login_me_roundtrip() {
    let app = test_app().await;
    register(&app, "alice").await;

    let (status, body) = request(
        &app,
        "POST",
        "/api/auth/login",
        None,
        Some(json!({ "email": "alice@example.com", "password": "password123" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Login successful");
    assert!(body["user"]["lastLogin"].is_string());

    let token = body["token"].as_str().unwrap();
    let (status, body) = request(&app, "GET", "/api/auth/me", Some(token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["username"], "alice");
}

#[tokio::test]
async fn duplicate_registration_rejected() {
    let app = test_app().await;
    register(&app, "alice").await;

    let (status, body) = request(
        &app,
        "POST",
        "/api/auth/register",
        None,
        Some(json!({
            "username": "alice2",
            "email": "alice@example.com",
            "password": "password123",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Email already registered");

    let (status, body) = request(
        &app,
        "POST",
        "/api/auth/login",
        None,
        Some(json!({ "email": "alice@example.com", "password": "wrong-password" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Invalid credentials");
}

#[tokio::test]
async fn protected_routes_need_a_token() {
    let app = test_app().await;

    let (status, body) = request(&app, "GET", "/api/habits", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "No token, authorization denied");

    let (status, body) = request(&app, "GET", "/api/habits", Some("garbage"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Token is not valid");
}

#[tokio::test]
async fn unknown_route_is_json_404() {
    let app = test_app().await;
    let (status, body) = request(&app, "GET", "/api/nonsense", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Route not found");
}

async fn create_habit(app: &Router, token: &str, title: &str) -> String {
    let (status, body) = request(
        app,
        "POST",
        "/api/habits",
        Some(token),
        Some(json!({ "title": title, "category": "health", "frequency": "daily" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "create habit failed: {body}");
    body["habit"]["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn habit_completion_is_once_per_day() {
    let app = test_app().await;
    let token = register(&app, "alice").await;
    let habit_id = create_habit(&app, &token, "Drink water").await;

    let (status, body) = request(
        &app,
        "POST",
        &format!("/api/habits/{habit_id}/complete"),
        Some(&token),
        Some(json!({ "notes": "feeling hydrated" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["habit"]["streak"]["current"], 1);
    assert_eq!(body["habit"]["streak"]["longest"], 1);
    assert_eq!(body["habit"]["completions"].as_array().unwrap().len(), 1);

    let (status, body) = request(
        &app,
        "POST",
        &format!("/api/habits/{habit_id}/complete"),
        Some(&token),
        Some(json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Habit already completed today");

    // The rejected attempt left no trace.
    let (_, body) = request(&app, "GET", "/api/habits", Some(&token), None).await;
    assert_eq!(body["habits"][0]["completions"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn habit_soft_delete_hides_but_keeps() {
    let app = test_app().await;
    let token = register(&app, "alice").await;
    let habit_id = create_habit(&app, &token, "Meditate").await;

    let (status, _) = request(
        &app,
        "DELETE",
        &format!("/api/habits/{habit_id}"),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = request(&app, "GET", "/api/habits", Some(&token), None).await;
    assert!(body["habits"].as_array().unwrap().is_empty());

    // Updating a soft-deleted habit still resolves it; only listing filters.
    let (status, _) = request(
        &app,
        "PUT",
        &format!("/api/habits/{habit_id}"),
        Some(&token),
        Some(json!({ "title": "Meditate daily" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn habit_analytics_counts_and_averages() {
    let app = test_app().await;
    let token = register(&app, "alice").await;
    let habit_id = create_habit(&app, &token, "Stretch").await;
    create_habit(&app, &token, "Read").await;

    request(
        &app,
        "POST",
        &format!("/api/habits/{habit_id}/complete"),
        Some(&token),
        Some(json!({})),
    )
    .await;

    let (status, body) = request(&app, "GET", "/api/habits/analytics", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    let analytics = &body["analytics"];
    assert_eq!(analytics["totalHabits"], 2);
    assert_eq!(analytics["totalCompletions"], 1);
    assert_eq!(analytics["averageStreak"].as_f64().unwrap(), 0.5);
    assert_eq!(analytics["longestStreak"], 1);
    let daily = analytics["dailyCompletions"].as_object().unwrap();
    assert_eq!(daily.len(), 1);
    assert_eq!(daily.values().next().unwrap(), 1);
}

async fn create_room(app: &Router, token: &str, max_size: i64) -> (String, String) {
    let (status, body) = request(
        app,
        "POST",
        "/api/rooms/create",
        Some(token),
        Some(json!({ "maxSize": max_size })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "create room failed: {body}");
    (
        body["room"]["id"].as_str().unwrap().to_string(),
        body["room"]["code"].as_str().unwrap().to_string(),
    )
}

async fn join_room(app: &Router, token: &str, code: &str) -> (StatusCode, Value) {
    request(
        app,
        "POST",
        "/api/rooms/join",
        Some(token),
        Some(json!({ "code": code })),
    )
    .await
}

#[tokio::test]
async fn room_capacity_is_enforced() {
    let app = test_app().await;
    let owner = register(&app, "owner").await;
    let second = register(&app, "second").await;
    let third = register(&app, "third").await;

    let (_, code) = create_room(&app, &owner, 2).await;

    let (status, _) = join_room(&app, &second, &code).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = join_room(&app, &third, &code).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Room is full");
}

#[tokio::test]
async fn one_room_per_user() {
    let app = test_app().await;
    let alice = register(&app, "alice").await;
    let bob = register(&app, "bob").await;

    create_room(&app, &alice, 3).await;
    let (_, other_code) = create_room(&app, &bob, 3).await;

    let (status, body) = request(
        &app,
        "POST",
        "/api/rooms/create",
        Some(&alice),
        Some(json!({ "maxSize": 3 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "You already belong to a room");

    let (status, body) = join_room(&app, &alice, &other_code).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "You already belong to a room");
}

#[tokio::test]
async fn ownership_passes_to_earliest_joiner() {
    let app = test_app().await;
    let owner = register(&app, "owner").await;
    let m1 = register(&app, "memberone").await;
    let m2 = register(&app, "membertwo").await;
    let m1_id = user_id(&app, &m1).await;
    let m2_id = user_id(&app, &m2).await;

    let (_, code) = create_room(&app, &owner, 5).await;
    join_room(&app, &m1, &code).await;
    join_room(&app, &m2, &code).await;

    let (status, body) = request(&app, "POST", "/api/rooms/leave", Some(&owner), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["room"]["owner"]["id"], m1_id.as_str());

    let (_, body) = request(&app, "GET", "/api/rooms/me", Some(&m2), None).await;
    let members: Vec<&str> = body["room"]["members"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["id"].as_str().unwrap())
        .collect();
    assert_eq!(members, vec![m1_id.as_str(), m2_id.as_str()]);
}

#[tokio::test]
async fn empty_room_dissolves() {
    let app = test_app().await;
    let alice = register(&app, "alice").await;
    create_room(&app, &alice, 2).await;

    let (status, body) = request(&app, "POST", "/api/rooms/leave", Some(&alice), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Left room and room deleted (no members left)");

    let (_, body) = request(&app, "GET", "/api/rooms/me", Some(&alice), None).await;
    assert!(body["room"].is_null());

    let (status, body) = request(&app, "POST", "/api/rooms/leave", Some(&alice), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "You are not in a room");
}

#[tokio::test]
async fn room_settings_are_owner_only() {
    let app = test_app().await;
    let owner = register(&app, "owner").await;
    let member = register(&app, "member").await;

    let (room_id, code) = create_room(&app, &owner, 3).await;
    join_room(&app, &member, &code).await;

    let (status, body) = request(
        &app,
        "PUT",
        &format!("/api/rooms/{room_id}"),
        Some(&member),
        Some(json!({ "name": "Chez Nous" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "Only room owner can update settings");

    join_room(&app, &register(&app, "third").await, &code).await;

    // Capacity equal to the member count is fine; below it is not.
    let (status, body) = request(
        &app,
        "PUT",
        &format!("/api/rooms/{room_id}"),
        Some(&owner),
        Some(json!({ "name": "Chez Nous", "maxSize": 3 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["room"]["name"], "Chez Nous");

    let (status, body) = request(
        &app,
        "PUT",
        &format!("/api/rooms/{room_id}"),
        Some(&owner),
        Some(json!({ "maxSize": 2 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["message"],
        "maxSize cannot be less than current member count (3)"
    );
}

#[tokio::test]
async fn regenerate_code_is_owner_only_and_changes_code() {
    let app = test_app().await;
    let owner = register(&app, "owner").await;
    let member = register(&app, "member").await;

    let (room_id, code) = create_room(&app, &owner, 3).await;
    join_room(&app, &member, &code).await;

    let (status, body) = request(
        &app,
        "POST",
        &format!("/api/rooms/{room_id}/regenerate-code"),
        Some(&member),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "Only room owner can regenerate code");

    let (status, body) = request(
        &app,
        "POST",
        &format!("/api/rooms/{room_id}/regenerate-code"),
        Some(&owner),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let new_code = body["room"]["code"].as_str().unwrap();
    assert_ne!(new_code, code);

    // The old code is dead, the new one works.
    let third = register(&app, "third").await;
    let (status, _) = join_room(&app, &third, &code).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = join_room(&app, &third, new_code).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn anonymous_secrets_have_no_author_even_for_the_author() {
    let app = test_app().await;
    let alice = register(&app, "alice").await;

    let (status, body) = request(
        &app,
        "POST",
        "/api/secrets",
        Some(&alice),
        Some(json!({ "content": "I never water the plants", "isAnonymous": true })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(body["secret"]["author"].is_null());

    let (_, body) = request(&app, "GET", "/api/secrets", Some(&alice), None).await;
    assert!(body["secrets"][0]["author"].is_null());

    let (status, body) = request(
        &app,
        "POST",
        "/api/secrets",
        Some(&alice),
        Some(json!({ "content": "Signed confession", "isAnonymous": false })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["secret"]["author"]["username"], "alice");
}

#[tokio::test]
async fn like_toggles_back_to_unliked() {
    let app = test_app().await;
    let alice = register(&app, "alice").await;
    let bob = register(&app, "bob").await;

    let (_, body) = request(
        &app,
        "POST",
        "/api/secrets",
        Some(&alice),
        Some(json!({ "content": "secret", "isAnonymous": true })),
    )
    .await;
    let secret_id = body["secret"]["id"].as_str().unwrap().to_string();

    let like = |token: String| {
        let app = app.clone();
        let secret_id = secret_id.clone();
        async move {
            request(
                &app,
                "POST",
                &format!("/api/secrets/{secret_id}/like"),
                Some(&token),
                None,
            )
            .await
        }
    };

    let (status, body) = like(bob.clone()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["isLiked"], true);
    assert_eq!(body["likesCount"], 1);

    let (_, body) = like(bob.clone()).await;
    assert_eq!(body["isLiked"], false);
    assert_eq!(body["likesCount"], 0);
}

#[tokio::test]
async fn comments_strip_anonymous_authors() {
    let app = test_app().await;
    let alice = register(&app, "alice").await;
    let bob = register(&app, "bob").await;

    let (_, body) = request(
        &app,
        "POST",
        "/api/secrets",
        Some(&alice),
        Some(json!({ "content": "secret", "isAnonymous": true })),
    )
    .await;
    let secret_id = body["secret"]["id"].as_str().unwrap().to_string();

    let (status, body) = request(
        &app,
        "POST",
        &format!("/api/secrets/{secret_id}/comment"),
        Some(&bob),
        Some(json!({ "content": "same here", "isAnonymous": true })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(body["comment"]["author"].is_null());

    let (status, body) = request(
        &app,
        "POST",
        &format!("/api/secrets/{secret_id}/comment"),
        Some(&bob),
        Some(json!({ "content": "it me", "isAnonymous": false })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["comment"]["author"]["username"], "bob");
}

#[tokio::test]
async fn secret_delete_is_author_scoped() {
    let app = test_app().await;
    let alice = register(&app, "alice").await;
    let bob = register(&app, "bob").await;

    let (_, body) = request(
        &app,
        "POST",
        "/api/secrets",
        Some(&alice),
        Some(json!({ "content": "mine", "isAnonymous": true })),
    )
    .await;
    let secret_id = body["secret"]["id"].as_str().unwrap().to_string();

    let (status, body) = request(
        &app,
        "DELETE",
        &format!("/api/secrets/{secret_id}"),
        Some(&bob),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Secret not found or unauthorized");

    let (status, _) = request(
        &app,
        "DELETE",
        &format!("/api/secrets/{secret_id}"),
        Some(&alice),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = request(&app, "GET", "/api/secrets", Some(&alice), None).await;
    assert!(body["secrets"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn mood_crud_and_analytics() {
    let app = test_app().await;
    let alice = register(&app, "alice").await;

    let (status, body) = request(
        &app,
        "POST",
        "/api/moods",
        Some(&alice),
        Some(json!({ "mood": "happy", "intensity": 4, "tags": ["sunny"] })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let mood_id = body["mood"]["id"].as_str().unwrap().to_string();

    let (status, body) = request(
        &app,
        "POST",
        "/api/moods",
        Some(&alice),
        Some(json!({ "mood": "ecstatic", "intensity": 9 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Validation failed");

    let (status, body) = request(&app, "GET", "/api/moods/analytics", Some(&alice), None).await;
    assert_eq!(status, StatusCode::OK);
    let analytics = &body["analytics"];
    assert_eq!(analytics["totalEntries"], 1);
    assert_eq!(analytics["averageIntensity"].as_f64().unwrap(), 4.0);
    assert_eq!(analytics["moodDistribution"]["happy"], 1);
    assert_eq!(analytics["moodDistribution"]["sad"], 0);
    let trends = analytics["weeklyTrends"].as_array().unwrap();
    assert_eq!(trends.len(), 1);
    assert_eq!(trends[0]["average"].as_f64().unwrap(), 4.0);
    assert_eq!(trends[0]["count"], 1);

    let (status, _) = request(
        &app,
        "DELETE",
        &format!("/api/moods/{mood_id}"),
        Some(&alice),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = request(&app, "GET", "/api/moods", Some(&alice), None).await;
    assert!(body["moods"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn support_soft_fails_with_200() {
    let app = test_app().await;

    let (status, body) = request(
        &app,
        "POST",
        "/api/support/contact",
        None,
        Some(json!({
            "name": "Alice",
            "email": "alice@example.com",
            "subject": "Help",
            "message": "The plants are dying",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Message accepted");
    assert_eq!(body["delivered"], false);
    assert!(body["previewUrl"].is_null());

    let (status, body) = request(
        &app,
        "POST",
        "/api/support/chat",
        None,
        Some(json!({ "user": "alice", "text": "anyone there?" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Chat message accepted");
    assert_eq!(body["delivered"], false);

    let (status, body) = request(&app, "GET", "/api/support/verify", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], false);
}
