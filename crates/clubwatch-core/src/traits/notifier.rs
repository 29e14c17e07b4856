// # Notifier Trait
//
// Defines the interface for sending notification texts.
//
// ## Implementations
//
// - Webhook and dry-run log notifiers: `clubwatch-notify-webhook` crate
//
// The transport's authentication handshake is the implementation's concern;
// the engine only sees `send(text)` and the classified `NotifyError`.

use async_trait::async_trait;

use crate::error::NotifyError;
use crate::model::NotificationId;

/// Trait for notifier implementations
///
/// # Trust Level: Untrusted
///
/// ## Allowed Capabilities
/// - ✅ Perform HTTP/HTTPS calls to the notification endpoint
/// - ✅ Classify failures into `NotifyError` variants
///
/// ## Forbidden Capabilities
/// - ❌ Retry a send (the next polling cycle is the retry)
/// - ❌ Access the state store
/// - ❌ Log credentials
///
/// A notifier is constructed once at startup and injected into the engine.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Send one message
    ///
    /// # Returns
    ///
    /// - `Ok(NotificationId)`: Identifier assigned by the transport
    /// - `Err(NotifyError::Auth)`: Credentials rejected (fatal)
    /// - `Err(NotifyError::RateLimitOrForbidden)`: Retry next cycle
    /// - `Err(NotifyError::Transient)`: Retry next cycle
    async fn send(&self, text: &str) -> Result<NotificationId, NotifyError>;

    /// Get the notifier name (for logging/debugging)
    fn notifier_name(&self) -> &'static str;
}

/// Helper trait for constructing notifiers from configuration
pub trait NotifierFactory: Send + Sync {
    /// Create a Notifier instance from configuration
    fn create(
        &self,
        config: &crate::config::NotifierConfig,
    ) -> Result<Box<dyn Notifier>, crate::Error>;
}
