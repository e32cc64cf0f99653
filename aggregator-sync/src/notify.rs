//! Change notification: one outbound HTTP request per changed cycle.

use std::time::Duration;

use thiserror::Error;

use aggregator_core::NotifyConfig;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("webhook request to {url} failed: {message}")]
    Transport { url: String, message: String },

    #[error("webhook {url} returned unexpected status {status}")]
    Status { url: String, status: u16 },
}

/// Tells an external observer that the destination changed.
pub trait Notifier: Send + Sync {
    fn notify(&self) -> Result<(), NotifyError>;
}

impl<T: Notifier + ?Sized> Notifier for std::sync::Arc<T> {
    fn notify(&self) -> Result<(), NotifyError> {
        (**self).notify()
    }
}

const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(30);

/// Sends an empty-bodied request; any status below 400 is success.
#[derive(Debug)]
pub struct WebhookNotifier {
    agent: ureq::Agent,
    url: String,
    method: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            agent: ureq::AgentBuilder::new().timeout(WEBHOOK_TIMEOUT).build(),
            url: url.into(),
            method: method.into(),
        }
    }

    pub fn from_config(config: &NotifyConfig) -> Self {
        Self::new(&config.url, &config.method)
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Notifier for WebhookNotifier {
    fn notify(&self) -> Result<(), NotifyError> {
        match self.agent.request(&self.method, &self.url).call() {
            Ok(response) if response.status() < 400 => {
                tracing::info!("notified {} {} ({})", self.method, self.url, response.status());
                Ok(())
            }
            Ok(response) => Err(NotifyError::Status {
                url: self.url.clone(),
                status: response.status(),
            }),
            Err(ureq::Error::Status(status, _)) => Err(NotifyError::Status {
                url: self.url.clone(),
                status,
            }),
            Err(ureq::Error::Transport(transport)) => Err(NotifyError::Transport {
                url: self.url.clone(),
                message: transport.to_string(),
            }),
        }
    }
}
