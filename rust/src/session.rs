//! Blocking HTTP session with retry and exponential backoff.

use std::thread;
use std::time::Duration;

use backon::{BlockingRetryable, ExponentialBuilder};
use reqwest::StatusCode;
use reqwest::blocking::Client;
use tracing::warn;

use crate::api::{ApiConfig, ProviderError};

/// Shared HTTP client for all show lookups.
#[derive(Debug, Clone)]
pub struct Session {
    client: Client,
    backoff: ExponentialBuilder,
}

impl Session {
    /// Build a session from the transport settings in `config`.
    pub fn new(config: &ApiConfig) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("cridlib/", env!("CARGO_PKG_VERSION")))
            .build()?;
        let min_delay = Duration::try_from_secs_f64(config.backoff_factor).unwrap_or_default();
        let backoff = ExponentialBuilder::default()
            .with_min_delay(min_delay)
            .with_factor(2.0)
            .with_max_delay(Duration::from_secs(config.backoff_max_secs))
            .with_max_times(config.retries as usize);
        Ok(Self { client, backoff })
    }

    /// GET `url` and return the body, retrying transient failures.
    pub fn get_text(&self, url: &str, query: &[(&str, String)]) -> Result<String, ProviderError> {
        (|| self.send(url, query))
            .retry(self.backoff)
            .sleep(thread::sleep)
            .when(is_transient)
            .notify(|err, delay| warn!(url, error = %err, ?delay, "request failed, retrying"))
            .call()
    }

    fn send(&self, url: &str, query: &[(&str, String)]) -> Result<String, ProviderError> {
        let response = self.client.get(url).query(query).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response.text()?)
    }
}

fn is_transient(err: &ProviderError) -> bool {
    match err {
        ProviderError::Http(err) => err.is_connect() || err.is_timeout(),
        ProviderError::Status { status, .. } => matches!(
            StatusCode::from_u16(*status),
            Ok(StatusCode::TOO_MANY_REQUESTS
                | StatusCode::BAD_GATEWAY
                | StatusCode::SERVICE_UNAVAILABLE
                | StatusCode::GATEWAY_TIMEOUT)
        ),
        _ => false,
    }
}
