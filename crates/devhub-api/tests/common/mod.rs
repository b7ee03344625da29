#![allow(dead_code)]

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use devhub_api::auth::create_token;
use devhub_api::state::{AppState, AppStateInner};
use devhub_db::Database;
use devhub_db::models::ProfileFields;
use devhub_gateway::dispatcher::Dispatcher;

pub const SECRET: &str = "integration-test-secret";

/// Router plus state over a fresh in-memory database with the given users
/// already onboarded.
pub fn setup(users: &[&str]) -> (Router, AppState) {
    let db = Database::open_in_memory().unwrap();
    for id in users {
        let fields = ProfileFields {
            name: Some(format!("User {id}")),
            username: Some(id.to_string()),
            email: Some(format!("{id}@devhub.dev")),
            role: Some("Developer".into()),
            ..Default::default()
        };
        db.upsert_profile(id, &fields).unwrap();
    }
    let state = AppStateInner::new(db, SECRET.into(), Dispatcher::new());
    (devhub_api::router(state.clone()), state)
}

pub fn token(user_id: &str) -> String {
    create_token(SECRET, user_id, chrono::Duration::hours(1)).unwrap()
}

pub async fn call(
    app: &Router,
    method: Method,
    uri: &str,
    user: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(user) = user {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token(user)));
    }
    let req = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let res = app.clone().oneshot(req).await.unwrap();
    let status = res.status();
    let bytes = res.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

pub async fn get(app: &Router, uri: &str, user: &str) -> (StatusCode, Value) {
    call(app, Method::GET, uri, Some(user), None).await
}

pub async fn post(app: &Router, uri: &str, user: &str, body: Value) -> (StatusCode, Value) {
    call(app, Method::POST, uri, Some(user), Some(body)).await
}
