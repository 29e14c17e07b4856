// # Webhook Notifier
//
// This crate provides the notifiers for clubwatch:
//
// - `WebhookNotifier`: POSTs `{"text": ...}` with a bearer token to an HTTP
//   endpoint and returns the identifier assigned by the endpoint
// - `LogNotifier`: writes messages to the log only (dry runs, local testing)
//
// ## Trust Level: Untrusted (Notifier)
//
// **Allowed Capabilities**:
// - ✅ Perform HTTP/HTTPS calls to the configured endpoint only
// - ✅ Classify failures into `NotifyError` variants
//
// **Forbidden Capabilities**:
// - ❌ Retry a send (the next polling cycle is the retry)
// - ❌ Access the state store (owned by WatchEngine)
// - ❌ Spawn tasks or threads
//
// ## Status Mapping
//
// | Status | Error | Engine reaction |
// |--------|-------|-----------------|
// | 401 | `Auth` | stop |
// | 403, 429 | `RateLimitOrForbidden` | retry next cycle |
// | other non-2xx, network, timeout | `Transient` | retry next cycle |
//
// ## Security Requirements
//
// - The bearer token NEVER appears in logs or `Debug` output
// - The token is provided via environment variables only

use async_trait::async_trait;
use clubwatch_core::config::NotifierConfig;
use clubwatch_core::model::NotificationId;
use clubwatch_core::registry::WatchRegistry;
use clubwatch_core::traits::{Notifier, NotifierFactory};
use clubwatch_core::{Error, NotifyError, Result};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// JSON pointers tried in order for the identifier of a created message
const ID_POINTERS: [&str; 2] = ["/data/id", "/id"];

/// HTTP webhook notifier
///
/// # Dry-Run Mode
///
/// When `dry_run` is true, the notifier logs the payload it would have sent
/// and reports success without any network call.
pub struct WebhookNotifier {
    /// Endpoint URL
    url: String,

    /// Bearer token
    /// ⚠️ NEVER log this value
    token: String,

    /// HTTP client for the endpoint
    client: reqwest::Client,

    /// Dry-run mode: log instead of POST
    dry_run: bool,

    /// Sequence for locally assigned ids
    sequence: AtomicU64,
}

// Custom Debug implementation that hides the token
impl std::fmt::Debug for WebhookNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookNotifier")
            .field("url", &self.url)
            .field("token", &"<REDACTED>")
            .field("dry_run", &self.dry_run)
            .finish()
    }
}

impl WebhookNotifier {
    /// Create a new webhook notifier
    ///
    /// # Errors
    ///
    /// `Error::Config` if the token is empty or the HTTP client cannot be built.
    pub fn new(
        url: impl Into<String>,
        token: impl Into<String>,
        timeout: Duration,
        dry_run: bool,
    ) -> Result<Self> {
        let token = token.into();
        if token.is_empty() {
            return Err(Error::config("Notifier token cannot be empty"));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            url: url.into(),
            token,
            client,
            dry_run,
            sequence: AtomicU64::new(0),
        })
    }

    fn local_id(&self, prefix: &str) -> NotificationId {
        let n = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        NotificationId::new(format!("{}-{}", prefix, n))
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, text: &str) -> std::result::Result<NotificationId, NotifyError> {
        let payload = serde_json::json!({ "text": text });

        if self.dry_run {
            tracing::info!("[DRY-RUN] Would POST to {} with payload: {}", self.url, payload);
            return Ok(self.local_id("dry-run"));
        }

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.token)
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    NotifyError::Transient(format!("Request timed out: {}", e))
                } else {
                    NotifyError::Transient(format!("HTTP request failed: {}", e))
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unable to read response".to_string());

        if !status.is_success() {
            return Err(classify_status(status.as_u16(), &body));
        }

        match parse_notification_id(&body) {
            Some(id) => Ok(id),
            None => {
                tracing::warn!("Notification accepted ({}) but no id in response", status);
                Ok(self.local_id("unassigned"))
            }
        }
    }

    fn notifier_name(&self) -> &'static str {
        "webhook"
    }
}

/// Map a non-2xx status to a notifier error
pub fn classify_status(status: u16, body: &str) -> NotifyError {
    let body = body.trim();
    match status {
        401 => NotifyError::Auth(format!("Credentials rejected. Status: {}", status)),
        403 | 429 => NotifyError::RateLimitOrForbidden(format!("Status: {} - {}", status, body)),
        500..=599 => NotifyError::Transient(format!("Server error: {} - {}", status, body)),
        _ => NotifyError::Transient(format!("Send failed: {} - {}", status, body)),
    }
}

/// Read the identifier of a created message from a JSON response body
pub fn parse_notification_id(body: &str) -> Option<NotificationId> {
    let json: Value = serde_json::from_str(body).ok()?;

    ID_POINTERS.iter().find_map(|pointer| match json.pointer(pointer)? {
        Value::String(id) if !id.is_empty() => Some(NotificationId::new(id.as_str())),
        Value::Number(id) => Some(NotificationId::new(id.to_string())),
        _ => None,
    })
}

/// Notifier writing messages to the log
#[derive(Debug, Default)]
pub struct LogNotifier {
    sequence: AtomicU64,
}

impl LogNotifier {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, text: &str) -> std::result::Result<NotificationId, NotifyError> {
        let n = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::info!("[LOG NOTIFIER] #{}: {}", n, text);
        Ok(NotificationId::new(format!("log-{}", n)))
    }

    fn notifier_name(&self) -> &'static str {
        "log"
    }
}

/// Factory for creating webhook and log notifiers
pub struct WebhookFactory;

impl NotifierFactory for WebhookFactory {
    fn create(&self, config: &NotifierConfig) -> Result<Box<dyn Notifier>> {
        match config {
            NotifierConfig::Webhook {
                url,
                token,
                timeout_secs,
            } => {
                // Check for dry-run mode environment variable
                let dry_run = std::env::var("CLUBWATCH_MODE")
                    .unwrap_or_default()
                    .eq_ignore_ascii_case("dry-run");

                if dry_run {
                    tracing::warn!("Webhook notifier running in DRY-RUN mode - nothing will be sent");
                }

                Ok(Box::new(WebhookNotifier::new(
                    url.clone(),
                    token.clone(),
                    Duration::from_secs(*timeout_secs),
                    dry_run,
                )?))
            }
            NotifierConfig::Log => Ok(Box::new(LogNotifier::new())),
        }
    }
}

/// Register the webhook and log notifiers with a registry
pub fn register(registry: &WatchRegistry) {
    registry.register_notifier("webhook", Box::new(WebhookFactory));
    registry.register_notifier("log", Box::new(WebhookFactory));
}
