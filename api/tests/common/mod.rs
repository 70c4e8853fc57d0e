#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

use parking_helper_api::{
    auth,
    db::{NewParkingLot, ParkingLot, Role},
    routes,
    types::LotType,
    AppState, Config, MemoryStore, ParkingStore,
};

pub const USER_TOKEN: &str = "user-token";
pub const ADMIN_TOKEN: &str = "admin-token";

pub struct TestApp {
    pub store: Arc<MemoryStore>,
    pub config: Config,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_config(Config::default()).await
    }

    pub async fn with_config(config: Config) -> Self {
        let store = Arc::new(MemoryStore::new());
        auth::register_token(store.as_ref(), USER_TOKEN, Uuid::new_v4(), Role::User)
            .await
            .unwrap();
        auth::register_token(store.as_ref(), ADMIN_TOKEN, Uuid::new_v4(), Role::Admin)
            .await
            .unwrap();
        Self { store, config }
    }

    pub fn router(&self) -> Router {
        let store: Arc<dyn ParkingStore> = self.store.clone();
        routes::create_router(AppState::new(store, self.config.clone()))
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.send(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        self.send(builder.body(Body::from(body.to_string())).unwrap())
            .await
    }

    pub async fn delete(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method("DELETE").uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        self.send(builder.body(Body::empty()).unwrap()).await
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let resp = self.router().oneshot(request).await.unwrap();
        let status = resp.status();
        let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let value = if body.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body).unwrap_or(Value::Null)
        };
        (status, value)
    }

    pub async fn insert_lot(&self, name: &str, lat: f64, lng: f64) -> ParkingLot {
        self.store
            .insert_parking_lot(&NewParkingLot {
                place_id: None,
                name: name.to_string(),
                address: Some("서울 강남구 테헤란로 1".to_string()),
                latitude: Some(lat),
                longitude: Some(lng),
                lot_type: LotType::Public,
                price_info: serde_json::json!({ "base": "30분 2000원" }),
            })
            .await
            .unwrap()
    }
}

pub fn error_code(body: &Value) -> &str {
    body["error"]["code"].as_str().unwrap_or_default()
}

pub fn error_message(body: &Value) -> &str {
    body["error"]["message"].as_str().unwrap_or_default()
}
