//! Mikrofon-Berechtigung
//!
//! Muss vor jedem Join erteilt sein. Auf Desktop-Plattformen gibt es kein
//! Einwilligungs-Modell, dort ist die Berechtigung immer erteilt.

use async_trait::async_trait;

#[async_trait]
pub trait PermissionGate: Send + Sync {
    /// Fragt die Mikrofon-Berechtigung an, `true` = erteilt
    async fn request_microphone(&self) -> bool;
}

/// Für Plattformen ohne Einwilligungs-Modell
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysGranted;

#[async_trait]
impl PermissionGate for AlwaysGranted {
    async fn request_microphone(&self) -> bool {
        true
    }
}

/// Ob die Zielplattform eine explizite Einwilligung verlangt
pub const fn platform_requires_consent() -> bool {
    cfg!(any(target_os = "android", target_os = "ios"))
}
