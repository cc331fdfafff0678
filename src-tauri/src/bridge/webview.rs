//! Calling-SDK Implementierung über die Webview-Bridge

use super::channel::{RequestSink, SdkBridge};
use super::protocol::SdkOp;
use crate::backend::CallId;
use crate::call_engine::{
    CallSnapshot, CallingSdk, ClientOptions, JoinOptions, PermissionGate, SdkCall, SdkClient,
    SdkError,
};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::watch;
use uuid::Uuid;

// ============================================================================
// SDK
// ============================================================================

pub struct WebviewSdk<K: RequestSink> {
    bridge: Arc<SdkBridge<K>>,
}

impl<K: RequestSink> WebviewSdk<K> {
    pub fn new(bridge: Arc<SdkBridge<K>>) -> Self {
        Self { bridge }
    }
}

impl<K: RequestSink> CallingSdk for WebviewSdk<K> {
    type Client = WebviewClient<K>;
    type Call = WebviewCall<K>;

    fn create_client(&self, options: ClientOptions) -> Result<Self::Client, SdkError> {
        for (name, value) in [
            ("apiKey", &options.api_key),
            ("userId", &options.user_id),
            ("token", &options.token),
        ] {
            if value.trim().is_empty() {
                return Err(SdkError::InvalidOptions(format!("{name} must not be empty")));
            }
        }

        let client_id = Uuid::new_v4();
        // Die Webview verarbeitet Events in Reihenfolge, spätere Anfragen
        // sehen den Client also bereits
        self.bridge.notify(
            SdkOp::CreateClient,
            json!({
                "clientId": client_id,
                "apiKey": options.api_key,
                "user": { "id": options.user_id },
                "token": options.token,
            }),
        )?;

        tracing::debug!("Created webview client {}", client_id);

        Ok(WebviewClient {
            bridge: Arc::clone(&self.bridge),
            client_id,
        })
    }
}

// ============================================================================
// CLIENT
// ============================================================================

pub struct WebviewClient<K: RequestSink> {
    bridge: Arc<SdkBridge<K>>,
    client_id: Uuid,
}

impl<K: RequestSink> WebviewClient<K> {
    pub fn client_id(&self) -> Uuid {
        self.client_id
    }
}

#[async_trait]
impl<K: RequestSink> SdkClient for WebviewClient<K> {
    type Call = WebviewCall<K>;

    fn call(&self, call_id: &CallId) -> Self::Call {
        let cid = call_id.to_string();
        WebviewCall {
            bridge: Arc::clone(&self.bridge),
            client_id: self.client_id,
            snapshots: self.bridge.watch_call(&cid),
            call_id: call_id.clone(),
            cid,
        }
    }

    async fn disconnect_user(&self) -> Result<(), SdkError> {
        self.bridge
            .request(SdkOp::DisconnectUser, json!({ "clientId": self.client_id }))
            .await
            .map(|_| ())
    }
}

// ============================================================================
// CALL
// ============================================================================

pub struct WebviewCall<K: RequestSink> {
    bridge: Arc<SdkBridge<K>>,
    client_id: Uuid,
    call_id: CallId,
    cid: String,
    snapshots: watch::Receiver<CallSnapshot>,
}

impl<K: RequestSink> WebviewCall<K> {
    async fn call_op(&self, op: SdkOp, extra: Value) -> Result<Value, SdkError> {
        let mut args = json!({
            "clientId": self.client_id,
            "type": self.call_id.call_type(),
            "id": self.call_id.id(),
        });
        if let (Some(args), Value::Object(extra)) = (args.as_object_mut(), extra) {
            args.extend(extra);
        }
        self.bridge.request(op, args).await
    }
}

#[async_trait]
impl<K: RequestSink> SdkCall for WebviewCall<K> {
    fn call_id(&self) -> &CallId {
        &self.call_id
    }

    async fn disable_camera(&self) -> Result<(), SdkError> {
        self.call_op(SdkOp::DisableCamera, Value::Null).await.map(|_| ())
    }

    async fn join(&self, options: JoinOptions) -> Result<(), SdkError> {
        self.call_op(SdkOp::Join, json!({ "create": options.create }))
            .await
            .map(|_| ())
    }

    async fn leave(&self) -> Result<(), SdkError> {
        let result = self.call_op(SdkOp::Leave, Value::Null).await.map(|_| ());
        self.bridge.forget_call(&self.cid);
        result
    }

    async fn end_call(&self) -> Result<(), SdkError> {
        self.call_op(SdkOp::EndCall, Value::Null).await.map(|_| ())
    }

    fn subscribe(&self) -> watch::Receiver<CallSnapshot> {
        self.snapshots.clone()
    }
}

// ============================================================================
// PERMISSION GATE
// ============================================================================

/// Fragt die Mikrofon-Berechtigung über die Webview an (mobile Plattformen)
pub struct BridgePermissionGate<K: RequestSink> {
    bridge: Arc<SdkBridge<K>>,
}

impl<K: RequestSink> BridgePermissionGate<K> {
    pub fn new(bridge: Arc<SdkBridge<K>>) -> Self {
        Self { bridge }
    }
}

#[async_trait]
impl<K: RequestSink> PermissionGate for BridgePermissionGate<K> {
    async fn request_microphone(&self) -> bool {
        match self.bridge.request(SdkOp::RequestMicrophone, Value::Null).await {
            Ok(value) => value.as_bool().unwrap_or(false),
            Err(e) => {
                tracing::warn!("Microphone permission request failed: {}", e);
                false
            }
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::{BridgeError, SdkRequest, SdkSettlement};
    use parking_lot::Mutex;

    /// Beantwortet jede Anfrage sofort mit `reply`
    struct AutoReply {
        bridge: Mutex<Option<std::sync::Weak<SdkBridge<AutoReply>>>>,
        log: Arc<Mutex<Vec<SdkRequest>>>,
        reply: Value,
    }

    impl RequestSink for AutoReply {
        fn send(&self, request: &SdkRequest) -> Result<(), BridgeError> {
            self.log.lock().push(request.clone());
            if !request.expects_reply {
                return Ok(());
            }
            let bridge = self.bridge.lock().as_ref().and_then(|w| w.upgrade());
            let settlement = SdkSettlement {
                id: request.id,
                ok: true,
                value: self.reply.clone(),
                error: None,
            };
            if let Some(bridge) = bridge {
                tokio::spawn(async move {
                    let _ = bridge.settle(settlement);
                });
            }
            Ok(())
        }
    }

    fn auto_bridge(reply: Value) -> (Arc<SdkBridge<AutoReply>>, Arc<Mutex<Vec<SdkRequest>>>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let bridge = Arc::new(SdkBridge::new(AutoReply {
            bridge: Mutex::new(None),
            log: Arc::clone(&log),
            reply,
        }));
        // Rückreferenz für die Antworten
        *bridge.sink().bridge.lock() = Some(Arc::downgrade(&bridge));
        (bridge, log)
    }

    fn options(user_id: &str) -> ClientOptions {
        ClientOptions {
            api_key: "k".to_string(),
            user_id: user_id.to_string(),
            token: "t".to_string(),
        }
    }

    #[test]
    fn test_create_client_validates_options() {
        let (bridge, log) = auto_bridge(Value::Null);
        let sdk = WebviewSdk::new(bridge);

        assert!(matches!(
            sdk.create_client(options("")),
            Err(SdkError::InvalidOptions(_))
        ));
        assert!(log.lock().is_empty());

        let client = sdk.create_client(options("human")).unwrap();
        let log = log.lock();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].op, SdkOp::CreateClient);
        assert!(!log[0].expects_reply);
        assert_eq!(log[0].args["user"]["id"], "human");
        assert_eq!(log[0].args["clientId"], json!(client.client_id()));
    }

    #[tokio::test]
    async fn test_call_ops_carry_call_id() {
        let (bridge, log) = auto_bridge(Value::Null);
        let sdk = WebviewSdk::new(bridge);
        let client = sdk.create_client(options("human")).unwrap();
        let call = client.call(&CallId::new("default", "room1").unwrap());

        call.join(JoinOptions { create: true }).await.unwrap();
        call.leave().await.unwrap();
        client.disconnect_user().await.unwrap();

        let log = log.lock();
        let ops: Vec<SdkOp> = log.iter().map(|r| r.op).collect();
        assert_eq!(
            ops,
            vec![SdkOp::CreateClient, SdkOp::Join, SdkOp::Leave, SdkOp::DisconnectUser]
        );
        assert_eq!(log[1].args["type"], "default");
        assert_eq!(log[1].args["id"], "room1");
        assert_eq!(log[1].args["create"], true);
    }

    #[tokio::test]
    async fn test_leave_closes_snapshots() {
        let (bridge, _log) = auto_bridge(Value::Null);
        let sdk = WebviewSdk::new(Arc::clone(&bridge));
        let client = sdk.create_client(options("human")).unwrap();
        let call = client.call(&CallId::new("default", "room1").unwrap());
        let mut snapshots = call.subscribe();

        call.leave().await.unwrap();
        // `call` hält noch einen Receiver, der Sender ist aber weg
        assert!(snapshots.changed().await.is_err());
    }

    #[tokio::test]
    async fn test_permission_gate() {
        let (granted, _) = auto_bridge(Value::Bool(true));
        assert!(BridgePermissionGate::new(granted).request_microphone().await);

        let (denied, _) = auto_bridge(Value::Bool(false));
        assert!(!BridgePermissionGate::new(denied).request_microphone().await);

        let (garbage, _) = auto_bridge(Value::from("yes"));
        assert!(!BridgePermissionGate::new(garbage).request_microphone().await);
    }
}
