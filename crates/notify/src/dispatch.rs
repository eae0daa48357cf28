use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use safework_core::config::NotifyConfig;

use crate::events::NotificationEvent;
use crate::mailer::{HttpMailer, Mailer, MailerError, NoopMailer};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_retries: 3, base_delay_ms: 250, max_delay_ms: 5_000 }
    }
}

impl RetryPolicy {
    fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(16);
        let multiplier = 1_u64 << exponent;
        let delay_ms = self.base_delay_ms.saturating_mul(multiplier).min(self.max_delay_ms);
        Duration::from_millis(delay_ms)
    }
}

/// Best-effort announcer for approval transitions. Failures are retried
/// through the policy, then logged and dropped; they never surface to the
/// operation that emitted the event.
#[derive(Clone)]
pub struct NotificationDispatcher {
    mailer: Arc<dyn Mailer>,
    retry_policy: RetryPolicy,
    from_address: String,
}

impl NotificationDispatcher {
    pub fn new(
        mailer: Arc<dyn Mailer>,
        retry_policy: RetryPolicy,
        from_address: impl Into<String>,
    ) -> Self {
        Self { mailer, retry_policy, from_address: from_address.into() }
    }

    /// Wire from config: an enabled gateway gets the HTTP mailer, anything
    /// else degrades to noop so approvals never depend on mail.
    pub fn from_config(config: &NotifyConfig) -> Result<Self, MailerError> {
        let retry_policy = RetryPolicy {
            max_retries: config.max_retries,
            ..RetryPolicy::default()
        };

        let mailer: Arc<dyn Mailer> = match (&config.gateway_url, &config.api_token) {
            (Some(gateway_url), Some(api_token)) if config.enabled => Arc::new(HttpMailer::new(
                gateway_url.clone(),
                api_token.clone(),
                config.timeout_secs,
            )?),
            _ => Arc::new(NoopMailer),
        };

        Ok(Self::new(mailer, retry_policy, config.from_address.clone()))
    }

    pub fn noop() -> Self {
        Self::new(Arc::new(NoopMailer), RetryPolicy::default(), "noreply@safework.local")
    }

    /// Deliver with retries. Terminal failure is logged, not returned.
    pub async fn dispatch(&self, event: NotificationEvent) {
        let message = event.render(&self.from_address);
        let mut last_error: Option<MailerError> = None;

        for attempt in 0..=self.retry_policy.max_retries {
            if attempt > 0 {
                tokio::time::sleep(self.retry_policy.backoff(attempt - 1)).await;
            }

            match self.mailer.send(&message).await {
                Ok(()) => {
                    debug!(
                        event_name = "notify.dispatched",
                        notification_kind = event.kind(),
                        approval_id = event.approval_id(),
                        attempt,
                        "notification delivered"
                    );
                    return;
                }
                Err(error) => {
                    warn!(
                        event_name = "notify.attempt_failed",
                        notification_kind = event.kind(),
                        approval_id = event.approval_id(),
                        attempt,
                        max_retries = self.retry_policy.max_retries,
                        error = %error,
                        "notification delivery attempt failed"
                    );
                    last_error = Some(error);
                }
            }
        }

        if let Some(error) = last_error {
            warn!(
                event_name = "notify.dropped",
                notification_kind = event.kind(),
                approval_id = event.approval_id(),
                error = %error,
                "notification dropped after exhausting retries"
            );
        }
    }

    /// Fire-and-forget: run dispatch on a detached task. The call site has
    /// already committed its state change and must not wait on mail.
    pub fn spawn(&self, event: NotificationEvent) {
        let dispatcher = self.clone();
        tokio::spawn(async move {
            dispatcher.dispatch(event).await;
        });
    }
}
