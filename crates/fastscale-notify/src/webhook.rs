//! Incoming-webhook notifier.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info};

/// Result type alias for notification delivery.
pub type NotifyResult<T> = Result<T, NotifyError>;

/// Boxed future returned by [`Notifier::notify`].
pub type NotifyFuture<'a> = Pin<Box<dyn Future<Output = NotifyResult<()>> + Send + 'a>>;

/// Default timeout for a webhook POST.
const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);

/// Notification delivery failure. Never affects scaling.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("webhook request failed: {0}")]
    Transport(String),

    #[error("webhook returned HTTP {0}")]
    Status(u16),
}

/// What a scale-out did, as reported to the webhook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScaleOutEvent<'a> {
    pub service: &'a str,
    pub active_connections: u64,
    pub current_count: i64,
    pub new_count: i64,
}

/// Outbound scale-out alert — injected for testability.
pub trait Notifier: Send + Sync {
    /// Deliver `event` to `target`. A `None` target is a successful no-op.
    fn notify<'a>(&'a self, target: Option<&'a str>, event: ScaleOutEvent<'a>) -> NotifyFuture<'a>;
}

/// Posts `{"text": ...}` to a webhook URL.
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    client: reqwest::Client,
}

impl WebhookNotifier {
    pub fn new() -> NotifyResult<Self> {
        Self::with_timeout(WEBHOOK_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> NotifyResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| NotifyError::Transport(format!("build http client: {e}")))?;
        Ok(Self { client })
    }

    async fn post(&self, url: &str, event: &ScaleOutEvent<'_>) -> NotifyResult<()> {
        let payload = serde_json::json!({ "text": scaleout_message(event) });

        let resp = self
            .client
            .post(url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| NotifyError::Transport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(NotifyError::Status(status.as_u16()));
        }
        debug!(service = event.service, "scale-out notification sent");
        Ok(())
    }
}

impl Notifier for WebhookNotifier {
    fn notify<'a>(&'a self, target: Option<&'a str>, event: ScaleOutEvent<'a>) -> NotifyFuture<'a> {
        Box::pin(async move {
            match target {
                Some(url) => self.post(url, &event).await,
                None => {
                    info!(service = event.service, "notification skipped, no webhook configured");
                    Ok(())
                }
            }
        })
    }
}

/// Render the notification text.
pub fn scaleout_message(event: &ScaleOutEvent<'_>) -> String {
    format!(
        "scaleout {} service\n```\nActiveConnections: {}\nDesiredCount(cur): {}\nDesiredCount(new): {}\n```",
        event.service, event.active_connections, event.current_count, event.new_count,
    )
}
