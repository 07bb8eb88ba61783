//! Shared helpers for the HTTP scenario tests.
//!
//! Each integration test file is its own crate, so helpers unused by one file
//! would otherwise warn.

#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::{json, Value};
use taskdeck_backend::ai::CannedModel;
use taskdeck_backend::config::DEFAULT_FRONTEND_URL;
use taskdeck_backend::{cors_layer, router, store, AppState};
use tower::ServiceExt;

pub const SECRET: &str = "integration-secret";

pub struct TestApp {
    pub router: Router,
    pub model: Arc<CannedModel>,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_model(CannedModel::reply("[]")).await
    }

    pub async fn with_model(model: CannedModel) -> Self {
        let pool = store::connect_in_memory().await.unwrap();
        let model = Arc::new(model);
        let state = AppState::new(pool, model.clone(), SECRET);
        let router = router(state, cors_layer(DEFAULT_FRONTEND_URL).unwrap());
        Self { router, model }
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        user: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(user) = user {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token_for(user)));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    pub async fn get(&self, uri: &str, user: &str) -> (StatusCode, Value) {
        self.request(Method::GET, uri, Some(user), None).await
    }

    pub async fn create(&self, user: &str, body: Value) -> Value {
        let (status, task) = self
            .request(Method::POST, "/api/tasks", Some(user), Some(body))
            .await;
        assert_eq!(status, StatusCode::CREATED, "create failed: {task}");
        task
    }

    pub async fn create_titled(&self, user: &str, title: &str) -> i64 {
        self.create(user, json!({"title": title})).await["id"]
            .as_i64()
            .unwrap()
    }
}

pub fn token_for(user: &str) -> String {
    let exp = chrono::Utc::now().timestamp() + 3600;
    encode(
        &Header::default(),
        &json!({"sub": user, "exp": exp}),
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap()
}

pub fn ids(list: &Value) -> Vec<i64> {
    list.as_array()
        .unwrap()
        .iter()
        .map(|task| task["id"].as_i64().unwrap())
        .collect()
}
