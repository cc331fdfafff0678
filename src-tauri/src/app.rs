//! Tauri-Shell
//!
//! Hält den AppState, stellt die Commands bereit und leitet Controller-Events
//! und Visualizer-Frames an die Webview weiter.

use crate::backend::BackendClient;
use crate::bridge::{
    BridgeError, BridgePermissionGate, RequestSink, SdkBridge, SdkRequest, SdkSettlement,
    SnapshotUpdate, WebviewSdk, SDK_REQUEST_EVENT,
};
use crate::call_engine::{
    platform_requires_consent, AlwaysGranted, JoinOrchestrator, PermissionGate,
};
use crate::config::AppConfig;
use crate::controller::{CallController, ControllerEvent, UiStatus};
use crate::visualizer::{frames, VisualInput};
use once_cell::sync::OnceCell;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tauri::{AppHandle, Emitter, Manager, State};
use tokio::sync::{broadcast, watch};
use tokio::time::MissedTickBehavior;

const STATUS_EVENT: &str = "call:status";
const JOIN_FAILED_EVENT: &str = "call:join_failed";
const SPEAKER_EVENT: &str = "call:speaker";
const FRAME_EVENT: &str = "visualizer:frame";

type Controller = CallController<WebviewSdk<AppHandle>>;

// ============================================================================
// WEBVIEW TRANSPORT
// ============================================================================

impl RequestSink for AppHandle {
    fn send(&self, request: &SdkRequest) -> Result<(), BridgeError> {
        self.emit(SDK_REQUEST_EVENT, request)
            .map_err(|e| BridgeError::Emit(e.to_string()))
    }
}

// ============================================================================
// APPLICATION STATE
// ============================================================================

/// Globaler Application State
pub struct AppState {
    config: &'static AppConfig,
    bridge: Arc<SdkBridge<AppHandle>>,
    controller: Arc<Controller>,
}

/// Singleton für den AppState
static APP_STATE: OnceCell<Arc<AppState>> = OnceCell::new();

impl AppState {
    /// Initialisiert den Application State
    pub fn init(app_handle: AppHandle) -> anyhow::Result<Arc<Self>> {
        // Logging initialisieren
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::from_default_env()
                    .add_directive("agent_call_lib=debug".parse()?),
            )
            .try_init();

        tracing::info!("Initializing Agent Call...");

        let config = AppConfig::from_env()?.install()?;
        tracing::info!(
            "Backend at {}, agent '{}'",
            config.base_url,
            config.agent_user_id
        );

        let bridge = Arc::new(SdkBridge::new(app_handle.clone()));

        let permissions: Arc<dyn PermissionGate> = if platform_requires_consent() {
            Arc::new(BridgePermissionGate::new(Arc::clone(&bridge)))
        } else {
            Arc::new(AlwaysGranted)
        };

        let orchestrator = JoinOrchestrator::new(
            Arc::new(WebviewSdk::new(Arc::clone(&bridge))),
            BackendClient::new(config.base_url.clone()),
            permissions,
        )
        .with_timeout(config.join_timeout);

        let controller = Arc::new(CallController::new(orchestrator, config));

        // Controller-Events an die Webview, Sprecher an den Frame-Ticker
        let (visual_tx, visual_rx) = watch::channel(None);
        tauri::async_runtime::spawn(forward_events(
            app_handle.clone(),
            controller.subscribe(),
            visual_tx,
        ));
        tauri::async_runtime::spawn(run_frame_ticker(
            app_handle,
            visual_rx,
            config.frame_interval(),
        ));

        let state = Arc::new(Self {
            config,
            bridge,
            controller,
        });

        APP_STATE
            .set(Arc::clone(&state))
            .map_err(|_| anyhow::anyhow!("AppState already initialized"))?;

        Ok(state)
    }

    /// Gibt den globalen AppState zurück
    pub fn get() -> Option<Arc<Self>> {
        APP_STATE.get().cloned()
    }
}

// ============================================================================
// TAURI COMMANDS - CALL
// ============================================================================

/// Status für das Frontend
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusView {
    status: UiStatus,
    waiting: bool,
    active_call: Option<String>,
    agent_user_id: String,
}

/// Tritt dem Call bei und schickt den Agenten hinein
#[tauri::command]
async fn join_call(state: State<'_, Arc<AppState>>) -> Result<UiStatus, String> {
    state.controller.join().await.map_err(|e| e.to_string())
}

/// Legt auf
#[tauri::command]
async fn hang_up(state: State<'_, Arc<AppState>>) -> Result<(), String> {
    state.controller.hang_up().await.map_err(|e| e.to_string())
}

/// Schließt den End-Screen
#[tauri::command]
fn dismiss(state: State<'_, Arc<AppState>>) -> Result<UiStatus, String> {
    state.controller.dismiss().map_err(|e| e.to_string())
}

/// Gibt den aktuellen UI-Status zurück
#[tauri::command]
fn get_status(state: State<'_, Arc<AppState>>) -> StatusView {
    let status = state.controller.status();
    StatusView {
        status,
        waiting: status.is_waiting(),
        active_call: state.controller.active_call(),
        agent_user_id: state.config.agent_user_id.clone(),
    }
}

// ============================================================================
// TAURI COMMANDS - SDK BRIDGE
// ============================================================================

/// Antwort der Webview auf eine SDK-Anfrage
#[tauri::command]
fn sdk_settle(settlement: SdkSettlement, state: State<'_, Arc<AppState>>) -> Result<(), String> {
    state.bridge.settle(settlement).map_err(|e| e.to_string())
}

/// Teilnehmer-Stand aus der Webview
#[tauri::command]
fn sdk_snapshot(update: SnapshotUpdate, state: State<'_, Arc<AppState>>) -> Result<(), String> {
    state.bridge.push_snapshot(update).map_err(|e| e.to_string())
}

// ============================================================================
// EVENT HANDLERS
// ============================================================================

async fn forward_events(
    app_handle: AppHandle,
    mut events: broadcast::Receiver<ControllerEvent>,
    visual_tx: watch::Sender<Option<VisualInput>>,
) {
    loop {
        let event = match events.recv().await {
            Ok(event) => event,
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!("Event forwarder lagged, skipped {} events", skipped);
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => break,
        };

        let result = match event {
            ControllerEvent::StatusChanged { status } => {
                tracing::info!("Call status changed: {}", status);
                app_handle.emit(STATUS_EVENT, status)
            }
            ControllerEvent::JoinFailed { reason, message } => app_handle.emit(
                JOIN_FAILED_EVENT,
                serde_json::json!({
                    "reason": reason,
                    "message": message
                }),
            ),
            ControllerEvent::Speaker { visual } => {
                visual_tx.send_replace(visual);
                app_handle.emit(SPEAKER_EVENT, visual)
            }
        };

        if let Err(e) = result {
            tracing::error!("Failed to emit event to webview: {}", e);
        }
    }
}

/// Tickt den Frame-Generator solange ein Sprecher gezeigt wird
async fn run_frame_ticker(
    app_handle: AppHandle,
    mut visuals: watch::Receiver<Option<VisualInput>>,
    period: Duration,
) {
    loop {
        let start = loop {
            if let Some(visual) = *visuals.borrow_and_update() {
                break visual;
            }
            if visuals.changed().await.is_err() {
                return;
            }
        };

        // Neue Animation pro Sichtbarkeits-Phase
        let mut animation = frames(Some(start.level), start.color);
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            interval.tick().await;
            let Some(visual) = *visuals.borrow() else {
                break;
            };
            animation.retarget(Some(visual.level), visual.color);
            if let Some(frame) = animation.next() {
                let _ = app_handle.emit(FRAME_EVENT, &frame);
            }
        }
    }
}

// ============================================================================
// TAURI APP RUNNER
// ============================================================================

/// Startet die Tauri-Anwendung
#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    let builder = tauri::Builder::default();

    #[cfg(desktop)]
    let builder = builder.plugin(tauri_plugin_single_instance::init(|app, _args, _cwd| {
        if let Some(window) = app.get_webview_window("main") {
            let _ = window.set_focus();
        }
    }));

    builder
        .setup(|app| {
            // App State initialisieren
            let state = AppState::init(app.handle().clone())?;

            // State im Tauri-App registrieren
            app.manage(state);

            Ok(())
        })
        .invoke_handler(tauri::generate_handler![
            // Call
            join_call,
            hang_up,
            dismiss,
            get_status,
            // SDK Bridge
            sdk_settle,
            sdk_snapshot,
        ])
        .run(tauri::generate_context!())
        .expect("error while running tauri application");
}
