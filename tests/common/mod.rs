//! Shared harness for the route tests: the full router over a fresh
//! in-memory database, driven with `oneshot`.

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use masterdom::{app, auth::ensure_super_admin, config::Config, db, AppState};
use serde_json::{json, Value};
use tower::ServiceExt;

pub const SUPER_ADMIN_EMAIL: &str = "root@masterdom.test";
pub const PASSWORD: &str = "password123";

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
}

impl TestApp {
    pub async fn new() -> Self {
        let config = Config {
            jwt_secret: "route-test-secret".to_owned(),
            super_admin_email: SUPER_ADMIN_EMAIL.to_owned(),
            bcrypt_cost: 4,
            ..Config::default()
        };

        let db_pool = db::connect_in_memory().await.unwrap();
        let state = AppState::new(db_pool, &config).unwrap();
        ensure_super_admin(&state.db_pool, &state.passwords, SUPER_ADMIN_EMAIL, PASSWORD)
            .await
            .unwrap();

        let router = app(state.clone(), &config).unwrap();
        Self { router, state }
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let body = match body {
            Some(json) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };

        let response = self
            .router
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();

        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.request(Method::GET, uri, token, None).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.request(Method::POST, uri, token, Some(body)).await
    }

    pub async fn patch(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.request(Method::PATCH, uri, token, Some(body)).await
    }

    pub async fn delete(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.request(Method::DELETE, uri, token, None).await
    }

    /// Registers and returns the new user id.
    pub async fn register(&self, email: &str, first_name: &str) -> String {
        let (status, body) = self
            .post(
                "/api/auth/register",
                None,
                json!({
                    "email": email,
                    "password": PASSWORD,
                    "firstName": first_name,
                    "lastName": "Tester",
                    "phoneNumber": "+7000",
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["userId"].as_str().unwrap().to_owned()
    }

    pub async fn login(&self, email: &str) -> String {
        let (status, body) = self
            .post("/api/auth/login", None, json!({ "email": email, "password": PASSWORD }))
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        body["token"].as_str().unwrap().to_owned()
    }

    /// Registers and logs in; returns `(user_id, token)`.
    pub async fn user(&self, email: &str, first_name: &str) -> (String, String) {
        let user_id = self.register(email, first_name).await;
        let token = self.login(email).await;
        (user_id, token)
    }

    pub async fn super_admin_token(&self) -> String {
        self.login(SUPER_ADMIN_EMAIL).await
    }

    pub async fn create_offer(&self, token: &str, title: &str, offer_type: &str) -> String {
        let (status, body) = self
            .post(
                "/api/offers",
                Some(token),
                json!({ "title": title, "description": format!("{title} details"), "offerType": offer_type }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["offerId"].as_str().unwrap().to_owned()
    }
}
