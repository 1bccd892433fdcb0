//! Scripted transport for exercising the auth layer without a server.
//!
//! Requests succeed only when they carry the currently valid access token.
//! `/always-401` always fails authorization and `/boom` always fails with a
//! server error. The refresh endpoint follows `RefreshBehavior` and can be
//! held back behind a gate to force requests to overlap a refresh.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use futures::future::BoxFuture;
use serde_json::{json, Value};
use tokio::sync::Semaphore;

use super::interceptor::REFRESH_PATH;
use super::{ApiError, ApiRequest, Transport};
use crate::models::TokenPair;

#[derive(Debug, Clone)]
pub(crate) struct Sent {
    pub path: String,
    pub bearer: Option<String>,
    pub body: Option<Value>,
    pub query: Vec<(String, String)>,
}

#[derive(Debug, Clone)]
pub(crate) enum RefreshBehavior {
    Issue(TokenPair),
    Reject,
    Hang,
}

pub(crate) struct FakeTransport {
    valid_token: Mutex<String>,
    refresh: Mutex<RefreshBehavior>,
    gate: Mutex<Option<std::sync::Arc<Semaphore>>>,
    sent: Mutex<Vec<Sent>>,
    refresh_tokens: Mutex<Vec<String>>,
    refresh_calls: AtomicUsize,
}

impl FakeTransport {
    pub fn new(valid_token: &str) -> Self {
        Self {
            valid_token: Mutex::new(valid_token.to_string()),
            refresh: Mutex::new(RefreshBehavior::Issue(TokenPair {
                access_token: "AT-new".into(),
                refresh_token: "RT-new".into(),
            })),
            gate: Mutex::new(None),
            sent: Mutex::new(Vec::new()),
            refresh_tokens: Mutex::new(Vec::new()),
            refresh_calls: AtomicUsize::new(0),
        }
    }

    pub fn set_refresh(&self, behavior: RefreshBehavior) {
        *self.refresh.lock().unwrap() = behavior;
    }

    /// Hold refresh calls until `open_refresh_gate`
    pub fn close_refresh_gate(&self) {
        *self.gate.lock().unwrap() = Some(std::sync::Arc::new(Semaphore::new(0)));
    }

    pub fn open_refresh_gate(&self) {
        if let Some(gate) = self.gate.lock().unwrap().as_ref() {
            gate.add_permits(Semaphore::MAX_PERMITS / 2);
        }
    }

    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn last_refresh_token(&self) -> Option<String> {
        self.refresh_tokens.lock().unwrap().last().cloned()
    }

    /// Non-refresh requests in the order they were sent
    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    async fn handle_refresh(&self, request: &ApiRequest) -> Result<Value, ApiError> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(token) = request
            .body()
            .and_then(|b| b.get("refreshToken"))
            .and_then(|t| t.as_str())
        {
            self.refresh_tokens.lock().unwrap().push(token.to_string());
        }

        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            let _permit = gate.acquire().await.expect("gate closed");
        }

        let behavior = self.refresh.lock().unwrap().clone();
        match behavior {
            RefreshBehavior::Issue(pair) => {
                *self.valid_token.lock().unwrap() = pair.access_token.clone();
                Ok(json!({ "data": pair }))
            }
            RefreshBehavior::Reject => Err(ApiError::Unauthorized("invalid refresh token".into())),
            RefreshBehavior::Hang => std::future::pending().await,
        }
    }

    fn handle(&self, request: &ApiRequest, bearer: Option<&str>) -> Result<Value, ApiError> {
        self.sent.lock().unwrap().push(Sent {
            path: request.path().to_string(),
            bearer: bearer.map(str::to_string),
            body: request.body().cloned(),
            query: request.query().to_vec(),
        });

        match request.path() {
            "/always-401" => return Err(ApiError::Unauthorized("nope".into())),
            "/boom" => return Err(ApiError::ServerError("boom".into())),
            _ => {}
        }

        let valid = self.valid_token.lock().unwrap().clone();
        if bearer != Some(valid.as_str()) {
            return Err(ApiError::Unauthorized("jwt expired".into()));
        }
        Ok(json!({
            "data": {
                "method": request.method().as_str(),
                "path": request.path(),
                "token": bearer,
                "payload": request.body(),
            }
        }))
    }
}

impl Transport for FakeTransport {
    fn send<'a>(
        &'a self,
        request: &'a ApiRequest,
        bearer: Option<&'a str>,
    ) -> BoxFuture<'a, Result<Value, ApiError>> {
        Box::pin(async move {
            if request.path() == REFRESH_PATH {
                self.handle_refresh(request).await
            } else {
                self.handle(request, bearer)
            }
        })
    }
}
