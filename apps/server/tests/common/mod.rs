#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use leadrelay_core::{
    contact::ContactSubmission,
    errors::OutboundError,
    outbound::{ContactMailer, WebhookForwarder},
};
use leadrelay_server::{api::app_router, build_state_with, config::Config, AppState};
use serde_json::{json, Value};
use tower::ServiceExt;

pub fn test_config(vars: &[(&str, &str)]) -> Config {
    let mut map: HashMap<String, String> = HashMap::new();
    map.insert("LR_APP_BASE_URL".to_string(), "https://example.com".to_string());
    for (key, value) in vars {
        map.insert(key.to_string(), value.to_string());
    }
    Config::from_vars(|key| map.get(key).cloned()).unwrap()
}

/// Records contact submissions instead of sending e-mail.
#[derive(Default)]
pub struct SpyMailer {
    calls: AtomicUsize,
    pub fail_with_status: Option<u16>,
}

impl SpyMailer {
    pub fn failing(status: u16) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail_with_status: Some(status),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ContactMailer for SpyMailer {
    async fn send_contact(&self, _submission: &ContactSubmission) -> Result<(), OutboundError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.fail_with_status {
            Some(status) => Err(OutboundError::Upstream {
                status,
                body: "provider stack trace: key re_live_123 rejected".to_string(),
            }),
            None => Ok(()),
        }
    }
}

/// Records forwarded payloads and answers with a canned body.
pub struct SpyForwarder {
    payloads: Mutex<Vec<Value>>,
    response: Value,
}

impl Default for SpyForwarder {
    fn default() -> Self {
        Self {
            payloads: Mutex::new(Vec::new()),
            response: json!({ "ok": true, "executionId": "exec-42" }),
        }
    }
}

impl SpyForwarder {
    pub fn payloads(&self) -> Vec<Value> {
        self.payloads.lock().unwrap().clone()
    }
}

#[async_trait]
impl WebhookForwarder for SpyForwarder {
    async fn forward(&self, payload: &Value) -> Result<Value, OutboundError> {
        self.payloads.lock().unwrap().push(payload.clone());
        Ok(self.response.clone())
    }
}

pub struct TestApp {
    pub state: Arc<AppState>,
    pub router: Router,
    pub mailer: Arc<SpyMailer>,
    pub forwarder: Arc<SpyForwarder>,
}

impl TestApp {
    pub fn new(vars: &[(&str, &str)]) -> Self {
        Self::with_mailer(vars, SpyMailer::default())
    }

    pub fn with_mailer(vars: &[(&str, &str)], mailer: SpyMailer) -> Self {
        Self::build(vars, mailer, true)
    }

    /// An app with neither e-mail delivery nor a workflow webhook configured.
    /// The spies exist but are never reachable from the router.
    pub fn unconfigured(vars: &[(&str, &str)]) -> Self {
        Self::build(vars, SpyMailer::default(), false)
    }

    fn build(vars: &[(&str, &str)], mailer: SpyMailer, wire_outbound: bool) -> Self {
        let config = test_config(vars);
        let mailer = Arc::new(mailer);
        let forwarder = Arc::new(SpyForwarder::default());
        let (mailer_dyn, forwarder_dyn) = if wire_outbound {
            (
                Some(mailer.clone() as Arc<dyn ContactMailer>),
                Some(forwarder.clone() as Arc<dyn WebhookForwarder>),
            )
        } else {
            (None, None)
        };
        let state = build_state_with(&config, mailer_dyn, forwarder_dyn).unwrap();
        let router = app_router(state.clone(), &config);
        Self {
            state,
            router,
            mailer,
            forwarder,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };
        (status, body)
    }

    pub async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.send(post_json(uri, &body)).await
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.send(
            Request::builder()
                .method(Method::GET)
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }
}

pub fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn post_json_from(uri: &str, body: &Value, client_ip: &str) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .header("x-forwarded-for", client_ip)
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn contact_payload() -> Value {
    json!({
        "fullName": "Grace Hopper",
        "email": "grace@example.com",
        "company": "Navy Labs",
        "message": "We want the lead qualification demo wired into our CRM.",
        "trap": "",
        "teamSize": "11-50"
    })
}
