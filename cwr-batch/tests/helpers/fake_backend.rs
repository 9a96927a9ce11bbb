//! In-process stand-in for the plugin/record backend
//!
//! Serves the endpoints cwr-batch calls over HTTP:
//! - `POST /api/plugins/:name/execute` answered by a configurable responder
//! - `PUT /geocaches/:id/coordinates` recording the form fields
//! - `GET /api/plugins` and `GET /plugins` for the catalog
//! - `POST /messages` collecting webhook messages

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Form, Json, Router,
};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

type Responder = Box<dyn Fn(&str, &Value) -> (u16, String) + Send + Sync>;

pub struct BackendState {
    responder: Mutex<Responder>,
    save_status: AtomicU16,
    catalog_status: AtomicU16,
    catalog_body: Mutex<String>,
    markup: Mutex<String>,
    executions: Mutex<Vec<(String, Value)>>,
    saves: Mutex<Vec<(i64, HashMap<String, String>)>>,
    messages: Mutex<Vec<Value>>,
}

pub struct FakeBackend {
    pub base_url: String,
    state: Arc<BackendState>,
}

impl FakeBackend {
    /// Start on an ephemeral port; every plugin answers `{}` until scripted
    pub async fn start() -> Self {
        let state = Arc::new(BackendState {
            responder: Mutex::new(Box::new(|_, _| (200, "{}".to_string()))),
            save_status: AtomicU16::new(200),
            catalog_status: AtomicU16::new(200),
            catalog_body: Mutex::new("[]".to_string()),
            markup: Mutex::new(String::new()),
            executions: Mutex::new(Vec::new()),
            saves: Mutex::new(Vec::new()),
            messages: Mutex::new(Vec::new()),
        });

        let app = Router::new()
            .route("/api/plugins/:name/execute", post(execute))
            .route("/geocaches/:id/coordinates", put(save_coordinates))
            .route("/api/plugins", get(catalog))
            .route("/plugins", get(plugin_page))
            .route("/messages", post(message))
            .route("/hang", post(hang))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{}", addr),
            state,
        }
    }

    /// Answer execute calls with `(status, body)` computed from plugin name and body
    pub fn respond_with<F>(&self, responder: F)
    where
        F: Fn(&str, &Value) -> (u16, String) + Send + Sync + 'static,
    {
        *self.state.responder.lock().unwrap() = Box::new(responder);
    }

    pub fn set_save_status(&self, status: u16) {
        self.state.save_status.store(status, Ordering::SeqCst);
    }

    pub fn set_catalog(&self, status: u16, body: &str) {
        self.state.catalog_status.store(status, Ordering::SeqCst);
        *self.state.catalog_body.lock().unwrap() = body.to_string();
    }

    pub fn set_markup(&self, markup: &str) {
        *self.state.markup.lock().unwrap() = markup.to_string();
    }

    pub fn executions(&self) -> Vec<(String, Value)> {
        self.state.executions.lock().unwrap().clone()
    }

    pub fn saves(&self) -> Vec<(i64, HashMap<String, String>)> {
        self.state.saves.lock().unwrap().clone()
    }

    pub fn messages(&self) -> Vec<Value> {
        self.state.messages.lock().unwrap().clone()
    }

    /// Poll until `count` webhook messages arrived (webhook posts are fire-and-forget)
    pub async fn wait_for_messages(&self, count: usize) -> Vec<Value> {
        for _ in 0..100 {
            let messages = self.messages();
            if messages.len() >= count {
                return messages;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        self.messages()
    }
}

/// Base URL nothing listens on
pub async fn unreachable_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}

fn raw(status: u16, content_type: &'static str, body: String) -> Response {
    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, [(header::CONTENT_TYPE, content_type)], body).into_response()
}

async fn execute(
    State(state): State<Arc<BackendState>>,
    Path(name): Path<String>,
    Json(body): Json<Value>,
) -> Response {
    state.executions.lock().unwrap().push((name.clone(), body.clone()));
    let (status, text) = {
        let responder = state.responder.lock().unwrap();
        (*responder)(&name, &body)
    };
    let content_type = if text.trim_start().starts_with('<') {
        "text/html"
    } else {
        "application/json"
    };
    raw(status, content_type, text)
}

async fn save_coordinates(
    State(state): State<Arc<BackendState>>,
    Path(id): Path<i64>,
    Form(fields): Form<HashMap<String, String>>,
) -> Response {
    state.saves.lock().unwrap().push((id, fields));
    let status = state.save_status.load(Ordering::SeqCst);
    let body = if status < 300 { "saved" } else { "database locked" };
    raw(status, "text/plain", body.to_string())
}

async fn catalog(State(state): State<Arc<BackendState>>) -> Response {
    let status = state.catalog_status.load(Ordering::SeqCst);
    let body = state.catalog_body.lock().unwrap().clone();
    raw(status, "application/json", body)
}

async fn plugin_page(State(state): State<Arc<BackendState>>) -> Response {
    let markup = state.markup.lock().unwrap().clone();
    if markup.is_empty() {
        return raw(404, "text/plain", "not found".to_string());
    }
    raw(200, "text/html", markup)
}

async fn message(State(state): State<Arc<BackendState>>, Json(body): Json<Value>) -> StatusCode {
    state.messages.lock().unwrap().push(body);
    StatusCode::NO_CONTENT
}

async fn hang() -> StatusCode {
    std::future::pending::<()>().await;
    StatusCode::OK
}
