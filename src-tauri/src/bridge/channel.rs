//! Anfrage/Antwort-Kanal zur Webview
//!
//! Jede Anfrage bekommt eine UUID und wartet auf einem oneshot-Kanal bis die
//! Webview sie über `settle` beantwortet (oder das Timeout abläuft).

use super::protocol::*;
use crate::call_engine::{CallSnapshot, SdkError};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{oneshot, watch};
use uuid::Uuid;

/// Maximale Wartezeit auf eine Antwort der Webview
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

// ============================================================================
// ERROR TYPES
// ============================================================================

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BridgeError {
    #[error("Failed to send request to webview: {0}")]
    Emit(String),

    #[error("No pending request with id {0}")]
    UnknownRequest(Uuid),

    #[error("No call registered for {0}")]
    UnknownCall(String),
}

// ============================================================================
// REQUEST SINK
// ============================================================================

/// Transportweg zur Webview (in der App: Tauri-Event)
pub trait RequestSink: Send + Sync + 'static {
    fn send(&self, request: &SdkRequest) -> Result<(), BridgeError>;
}

// ============================================================================
// SDK BRIDGE
// ============================================================================

type Reply = Result<Value, String>;
type Pending = Mutex<HashMap<Uuid, oneshot::Sender<Reply>>>;

/// Entfernt eine offene Anfrage, egal wie `request` endet (auch wenn der
/// Aufrufer die Future fallen lässt)
struct PendingGuard<'a> {
    pending: &'a Pending,
    id: Uuid,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.pending.lock().remove(&self.id);
    }
}

pub struct SdkBridge<K: RequestSink> {
    sink: K,
    pending: Pending,
    calls: Mutex<HashMap<String, watch::Sender<CallSnapshot>>>,
    timeout: Duration,
}

impl<K: RequestSink> SdkBridge<K> {
    pub fn new(sink: K) -> Self {
        Self {
            sink,
            pending: Mutex::new(HashMap::new()),
            calls: Mutex::new(HashMap::new()),
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn sink(&self) -> &K {
        &self.sink
    }

    /// Anzahl offener Anfragen
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    /// Sendet eine Anfrage und wartet auf die Antwort
    pub async fn request(&self, op: SdkOp, args: Value) -> Result<Value, SdkError> {
        let id = Uuid::new_v4();
        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(id, tx);
        let _guard = PendingGuard {
            pending: &self.pending,
            id,
        };

        let request = SdkRequest {
            id,
            op,
            expects_reply: true,
            args,
        };

        if let Err(e) = self.sink.send(&request) {
            return Err(SdkError::Unavailable(e.to_string()));
        }

        tracing::debug!("SDK request {} ({}) sent", id, op);

        match tokio::time::timeout(self.timeout, rx).await {
            Ok(Ok(Ok(value))) => Ok(value),
            Ok(Ok(Err(message))) => Err(SdkError::operation(op.as_str(), message)),
            Ok(Err(_)) => Err(SdkError::Unavailable(format!("{op} request dropped"))),
            Err(_) => {
                tracing::warn!("SDK request {} ({}) timed out", id, op);
                Err(SdkError::operation(op.as_str(), "no reply from webview"))
            }
        }
    }

    /// Sendet eine Anfrage ohne auf Antwort zu warten
    pub fn notify(&self, op: SdkOp, args: Value) -> Result<(), SdkError> {
        let request = SdkRequest {
            id: Uuid::new_v4(),
            op,
            expects_reply: false,
            args,
        };
        self.sink
            .send(&request)
            .map_err(|e| SdkError::Unavailable(e.to_string()))
    }

    /// Antwort der Webview zustellen
    pub fn settle(&self, settlement: SdkSettlement) -> Result<(), BridgeError> {
        let id = settlement.id;
        let tx = self
            .pending
            .lock()
            .remove(&id)
            .ok_or(BridgeError::UnknownRequest(id))?;

        // Empfänger kann nach Timeout schon weg sein
        let _ = tx.send(settlement.into_result());
        Ok(())
    }

    /// Snapshot-Kanal für einen Call (wird bei Bedarf angelegt)
    pub fn watch_call(&self, cid: &str) -> watch::Receiver<CallSnapshot> {
        self.calls
            .lock()
            .entry(cid.to_string())
            .or_insert_with(|| watch::channel(CallSnapshot::default()).0)
            .subscribe()
    }

    /// Call vergessen, schließt den Snapshot-Kanal
    pub fn forget_call(&self, cid: &str) {
        self.calls.lock().remove(cid);
    }

    /// Neuen Teilnehmer-Stand von der Webview übernehmen
    pub fn push_snapshot(&self, update: SnapshotUpdate) -> Result<(), BridgeError> {
        let calls = self.calls.lock();
        let tx = calls
            .get(&update.cid)
            .ok_or_else(|| BridgeError::UnknownCall(update.cid.clone()))?;

        tx.send_replace(CallSnapshot {
            participants: update.participants,
            ended: update.ended,
        });
        Ok(())
    }
}

impl<K: RequestSink> std::fmt::Debug for SdkBridge<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SdkBridge")
            .field("pending", &self.pending.lock().len())
            .field("calls", &self.calls.lock().len())
            .field("timeout", &self.timeout)
            .finish()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio::sync::mpsc;

    struct ChannelSink(mpsc::UnboundedSender<SdkRequest>);

    impl RequestSink for ChannelSink {
        fn send(&self, request: &SdkRequest) -> Result<(), BridgeError> {
            self.0
                .send(request.clone())
                .map_err(|e| BridgeError::Emit(e.to_string()))
        }
    }

    struct ClosedSink;

    impl RequestSink for ClosedSink {
        fn send(&self, _request: &SdkRequest) -> Result<(), BridgeError> {
            Err(BridgeError::Emit("window closed".to_string()))
        }
    }

    fn bridge() -> (Arc<SdkBridge<ChannelSink>>, mpsc::UnboundedReceiver<SdkRequest>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(SdkBridge::new(ChannelSink(tx))), rx)
    }

    #[tokio::test]
    async fn test_request_is_settled() {
        let (bridge, mut requests) = bridge();

        let responder = Arc::clone(&bridge);
        tokio::spawn(async move {
            let request = requests.recv().await.unwrap();
            assert_eq!(request.op, SdkOp::Join);
            responder
                .settle(SdkSettlement {
                    id: request.id,
                    ok: true,
                    value: Value::from("joined"),
                    error: None,
                })
                .unwrap();
        });

        let value = bridge.request(SdkOp::Join, Value::Null).await.unwrap();
        assert_eq!(value, Value::from("joined"));
        assert_eq!(bridge.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_request_failure_is_operation_error() {
        let (bridge, mut requests) = bridge();

        let responder = Arc::clone(&bridge);
        tokio::spawn(async move {
            let request = requests.recv().await.unwrap();
            responder
                .settle(SdkSettlement {
                    id: request.id,
                    ok: false,
                    value: Value::Null,
                    error: Some("duplicate session".to_string()),
                })
                .unwrap();
        });

        let err = bridge.request(SdkOp::Join, Value::Null).await.unwrap_err();
        assert_eq!(err, SdkError::operation("join", "duplicate session"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_request_timeout_cleans_up() {
        let (tx, _requests) = mpsc::unbounded_channel();
        let bridge = SdkBridge::new(ChannelSink(tx)).with_timeout(Duration::from_secs(1));

        let err = bridge.request(SdkOp::Leave, Value::Null).await.unwrap_err();
        assert!(matches!(err, SdkError::Operation { .. }));
        assert_eq!(bridge.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_closed_sink_is_unavailable() {
        let bridge = SdkBridge::new(ClosedSink);
        let err = bridge.request(SdkOp::Leave, Value::Null).await.unwrap_err();
        assert!(matches!(err, SdkError::Unavailable(_)));
        assert_eq!(bridge.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_request_cleans_up() {
        let (bridge, mut requests) = bridge();

        // Aufrufer gibt vor dem Bridge-Timeout auf
        let abandoned = tokio::time::timeout(
            Duration::from_secs(1),
            bridge.request(SdkOp::Join, Value::Null),
        )
        .await;
        assert!(abandoned.is_err());
        assert_eq!(bridge.pending_count(), 0);

        // Späte Antwort der Webview trifft auf keine offene Anfrage
        let request = requests.recv().await.unwrap();
        assert_eq!(
            bridge.settle(SdkSettlement {
                id: request.id,
                ok: true,
                value: Value::Null,
                error: None
            }),
            Err(BridgeError::UnknownRequest(request.id))
        );
    }

    #[tokio::test]
    async fn test_aborted_task_cleans_up() {
        let (bridge, mut requests) = bridge();

        let task = tokio::spawn({
            let bridge = Arc::clone(&bridge);
            async move { bridge.request(SdkOp::Leave, Value::Null).await }
        });
        requests.recv().await.unwrap();
        assert_eq!(bridge.pending_count(), 1);

        task.abort();
        assert!(task.await.unwrap_err().is_cancelled());
        assert_eq!(bridge.pending_count(), 0);
    }

    #[test]
    fn test_unknown_settlement() {
        let (bridge, _requests) = bridge();
        let id = Uuid::new_v4();
        assert_eq!(
            bridge.settle(SdkSettlement {
                id,
                ok: true,
                value: Value::Null,
                error: None
            }),
            Err(BridgeError::UnknownRequest(id))
        );
    }

    #[test]
    fn test_snapshots() {
        let (bridge, _requests) = bridge();

        let unknown = SnapshotUpdate {
            cid: "default:x".to_string(),
            participants: vec![],
            ended: false,
        };
        assert!(matches!(
            bridge.push_snapshot(unknown),
            Err(BridgeError::UnknownCall(_))
        ));

        let mut rx = bridge.watch_call("default:room1");
        bridge
            .push_snapshot(SnapshotUpdate {
                cid: "default:room1".to_string(),
                participants: vec![],
                ended: true,
            })
            .unwrap();
        assert!(rx.has_changed().unwrap());
        assert!(rx.borrow_and_update().ended);

        bridge.forget_call("default:room1");
        assert!(rx.has_changed().is_err());
    }
}
