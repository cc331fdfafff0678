//! Gemeinsame Test-Helfer: Fake-SDK, Permission-Gates, Backend-Mocks

#![allow(dead_code)]

use agent_call_lib::backend::{BackendClient, CallId};
use agent_call_lib::call_engine::{
    CallSnapshot, CallingSdk, ClientOptions, JoinOptions, Participant, PermissionGate, SdkCall,
    SdkClient, SdkError,
};
use agent_call_lib::config::{parse_base_url, AppConfig};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Token mit Payload `{"user_id":"human"}`
pub const HUMAN_TOKEN: &str = "eyJhbGciOiJIUzI1NiJ9.eyJ1c2VyX2lkIjoiaHVtYW4ifQ.sig";

/// Token mit Payload `{"user_id":"lucy"}`
pub const LUCY_TOKEN: &str = "eyJhbGciOiJIUzI1NiJ9.eyJ1c2VyX2lkIjoibHVjeSJ9.sig";

// ============================================================================
// FAKE SDK
// ============================================================================

/// Verhalten des Fake-SDKs
#[derive(Debug, Clone, Default)]
pub struct Script {
    pub fail_create: bool,
    pub fail_camera: bool,
    pub fail_join: bool,
    pub fail_leave: bool,
    pub join_delay: Option<Duration>,
    /// Gilt nur für den ersten erzeugten Client
    pub first_join_delay: Option<Duration>,
    pub first_join_fails: bool,
}

/// Zeichnet alle SDK-Aufrufe auf
pub struct FakeSdk {
    script: Script,
    log: Arc<Mutex<Vec<String>>>,
    snapshots: watch::Sender<CallSnapshot>,
    clients: AtomicUsize,
}

impl FakeSdk {
    pub fn new(script: Script) -> Arc<Self> {
        Arc::new(Self {
            script,
            log: Arc::new(Mutex::new(Vec::new())),
            snapshots: watch::channel(CallSnapshot::default()).0,
            clients: AtomicUsize::new(0),
        })
    }

    pub fn ok() -> Arc<Self> {
        Self::new(Script::default())
    }

    /// Aufgezeichnete Aufrufe in Reihenfolge
    pub fn calls(&self) -> Vec<String> {
        self.log.lock().clone()
    }

    pub fn count(&self, op: &str) -> usize {
        self.log.lock().iter().filter(|c| c.starts_with(op)).count()
    }

    /// Teilnehmer-Stand wie vom SDK gemeldet
    pub fn push(&self, snapshot: CallSnapshot) {
        self.snapshots.send_replace(snapshot);
    }
}

impl CallingSdk for FakeSdk {
    type Client = FakeClient;
    type Call = FakeCall;

    fn create_client(&self, options: ClientOptions) -> Result<FakeClient, SdkError> {
        if self.script.fail_create || options.api_key.is_empty() {
            return Err(SdkError::InvalidOptions("apiKey must not be empty".to_string()));
        }
        self.log
            .lock()
            .push(format!("create_client:{}", options.user_id));

        let first = self.clients.fetch_add(1, Ordering::SeqCst) == 0;
        Ok(FakeClient {
            script: self.script.clone(),
            first,
            log: Arc::clone(&self.log),
            snapshots: self.snapshots.subscribe(),
        })
    }
}

pub struct FakeClient {
    script: Script,
    first: bool,
    log: Arc<Mutex<Vec<String>>>,
    snapshots: watch::Receiver<CallSnapshot>,
}

#[async_trait]
impl SdkClient for FakeClient {
    type Call = FakeCall;

    fn call(&self, call_id: &CallId) -> FakeCall {
        FakeCall {
            call_id: call_id.clone(),
            script: self.script.clone(),
            first: self.first,
            log: Arc::clone(&self.log),
            snapshots: self.snapshots.clone(),
        }
    }

    async fn disconnect_user(&self) -> Result<(), SdkError> {
        self.log.lock().push("disconnect_user".to_string());
        Ok(())
    }
}

pub struct FakeCall {
    call_id: CallId,
    script: Script,
    first: bool,
    log: Arc<Mutex<Vec<String>>>,
    snapshots: watch::Receiver<CallSnapshot>,
}

#[async_trait]
impl SdkCall for FakeCall {
    fn call_id(&self) -> &CallId {
        &self.call_id
    }

    async fn disable_camera(&self) -> Result<(), SdkError> {
        self.log.lock().push("disable_camera".to_string());
        if self.script.fail_camera {
            return Err(SdkError::operation("disable_camera", "no camera"));
        }
        Ok(())
    }

    async fn join(&self, options: JoinOptions) -> Result<(), SdkError> {
        let delay = match self.script.first_join_delay {
            Some(delay) if self.first => Some(delay),
            _ => self.script.join_delay,
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        // Erst nach dem Abschluss aufzeichnen
        self.log
            .lock()
            .push(format!("join:{}:create={}", self.call_id, options.create));
        if self.script.fail_join || (self.first && self.script.first_join_fails) {
            return Err(SdkError::operation("join", "call is full"));
        }
        Ok(())
    }

    async fn leave(&self) -> Result<(), SdkError> {
        self.log.lock().push("leave".to_string());
        if self.script.fail_leave {
            return Err(SdkError::operation("leave", "not connected"));
        }
        Ok(())
    }

    async fn end_call(&self) -> Result<(), SdkError> {
        self.log.lock().push("end_call".to_string());
        Ok(())
    }

    fn subscribe(&self) -> watch::Receiver<CallSnapshot> {
        self.snapshots.clone()
    }
}

// ============================================================================
// PERMISSION GATES
// ============================================================================

pub struct Denied;

#[async_trait]
impl PermissionGate for Denied {
    async fn request_microphone(&self) -> bool {
        false
    }
}

// ============================================================================
// BACKEND MOCKS
// ============================================================================

pub fn backend(server: &MockServer) -> BackendClient {
    BackendClient::new(parse_base_url(&server.uri()).unwrap())
}

pub fn config(server: &MockServer) -> AppConfig {
    AppConfig {
        base_url: parse_base_url(&server.uri()).unwrap(),
        join_timeout: Some(Duration::from_secs(5)),
        ..AppConfig::defaults().unwrap()
    }
}

pub async fn mock_credentials(server: &MockServer, token: &str, cid: &str) {
    Mock::given(method("GET"))
        .and(path("/credentials"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "apiKey": "k",
            "token": token,
            "cid": cid,
        })))
        .mount(server)
        .await;
}

/// Agent-Connect für `default:room1`, `expected` = erwartete Aufrufe
pub async fn mock_connect(server: &MockServer, status: u16, expected: u64) {
    Mock::given(method("POST"))
        .and(path("/default/room1/connect"))
        .respond_with(ResponseTemplate::new(status))
        .expect(expected)
        .mount(server)
        .await;
}

pub fn participant(user_id: &str, level: f32, dominant: bool) -> Participant {
    Participant {
        user_id: user_id.to_string(),
        session_id: format!("{user_id}-session"),
        audio_level: Some(level),
        is_dominant_speaker: dominant,
    }
}
