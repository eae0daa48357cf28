use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailMessage {
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
    pub body: String,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MailerError {
    #[error("mail gateway request failed: {0}")]
    Request(String),
    #[error("mail gateway returned status {status}")]
    Status { status: u16 },
    #[error("mailer is misconfigured: {0}")]
    Configuration(String),
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: &MailMessage) -> Result<(), MailerError>;
}

/// Delivery through an HTTP mail gateway (JSON POST, bearer token).
pub struct HttpMailer {
    client: reqwest::Client,
    gateway_url: String,
    api_token: SecretString,
}

impl HttpMailer {
    pub fn new(
        gateway_url: impl Into<String>,
        api_token: SecretString,
        timeout_secs: u64,
    ) -> Result<Self, MailerError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs.max(1)))
            .build()
            .map_err(|err| MailerError::Configuration(err.to_string()))?;

        Ok(Self { client, gateway_url: gateway_url.into(), api_token })
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, message: &MailMessage) -> Result<(), MailerError> {
        let response = self
            .client
            .post(&self.gateway_url)
            .bearer_auth(self.api_token.expose_secret())
            .json(message)
            .send()
            .await
            .map_err(|err| MailerError::Request(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(MailerError::Status { status: status.as_u16() });
        }

        Ok(())
    }
}

/// Discards every message. Wired when the mail gateway is not configured,
/// so transitions still complete in environments without outbound mail.
#[derive(Default)]
pub struct NoopMailer;

#[async_trait]
impl Mailer for NoopMailer {
    async fn send(&self, _message: &MailMessage) -> Result<(), MailerError> {
        Ok(())
    }
}

/// Test double that captures messages, with an optional run of scripted
/// failures before deliveries start succeeding.
#[derive(Clone, Default)]
pub struct RecordingMailer {
    sent: Arc<Mutex<Vec<MailMessage>>>,
    failures_remaining: Arc<Mutex<u32>>,
}

impl RecordingMailer {
    pub fn failing_first(failures: u32) -> Self {
        let mailer = Self::default();
        *lock(&mailer.failures_remaining) = failures;
        mailer
    }

    pub fn sent(&self) -> Vec<MailMessage> {
        lock(&self.sent).clone()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, message: &MailMessage) -> Result<(), MailerError> {
        {
            let mut failures = lock(&self.failures_remaining);
            if *failures > 0 {
                *failures -= 1;
                return Err(MailerError::Status { status: 502 });
            }
        }

        lock(&self.sent).push(message.clone());
        Ok(())
    }
}
