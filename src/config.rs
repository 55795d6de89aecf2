//! Settings loaded from JSON.
//!
//! Every field is optional; missing fields take the same defaults as the
//! runtime config structs.
//!
//! ```
//! use blaze_client::ClientSettings;
//!
//! let settings = ClientSettings::from_json_str(
//!     r#"{ "game_code": "battlefield-1-pc", "request_timeout_secs": 30 }"#,
//! ).unwrap();
//! assert_eq!(settings.connection_config().request_timeout.as_secs(), 30);
//! ```

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::connection::{
    ConnectionConfig, DEFAULT_CONNECT_TIMEOUT, DEFAULT_KEEPALIVE_INTERVAL,
    DEFAULT_NOTIFICATION_CAPACITY, DEFAULT_REQUEST_TIMEOUT, SESSION_EXPIRED_METHOD,
};
use crate::error::Result;
use crate::manager::{ConnectionManager, RetryPolicy};
use crate::protocol::DEFAULT_MAX_PAYLOAD_SIZE;
use crate::redirector::RedirectorConfig;
use crate::writer::DEFAULT_CHANNEL_CAPACITY;

/// Client settings as stored on disk.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClientSettings {
    pub redirector_url: String,
    pub game_code: String,
    pub connection_profile: String,
    pub blaze_sdk_version: String,
    pub client_name: String,
    pub client_type: String,
    pub environment: String,
    pub redirector_timeout_secs: u64,

    pub request_timeout_secs: u64,
    /// 0 disables keepalive.
    pub keepalive_interval_secs: u64,
    pub connect_timeout_secs: u64,
    pub max_frame_size: u64,
    pub channel_capacity: usize,
    pub notification_capacity: usize,
    pub session_expired_methods: Vec<String>,

    pub retry: RetrySettings,
}

/// Redirector retry settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for ClientSettings {
    fn default() -> Self {
        let redirector = RedirectorConfig::default();
        Self {
            redirector_url: redirector.base_url,
            game_code: redirector.game_code,
            connection_profile: redirector.connection_profile,
            blaze_sdk_version: redirector.blaze_sdk_version,
            client_name: redirector.client_name,
            client_type: redirector.client_type,
            environment: redirector.environment,
            redirector_timeout_secs: redirector.request_timeout.as_secs(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT.as_secs(),
            keepalive_interval_secs: DEFAULT_KEEPALIVE_INTERVAL.as_secs(),
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT.as_secs(),
            max_frame_size: DEFAULT_MAX_PAYLOAD_SIZE,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            notification_capacity: DEFAULT_NOTIFICATION_CAPACITY,
            session_expired_methods: vec![SESSION_EXPIRED_METHOD.to_string()],
            retry: RetrySettings::default(),
        }
    }
}

impl Default for RetrySettings {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            max_attempts: policy.max_attempts,
            base_delay_ms: policy.base_delay.as_millis() as u64,
            max_delay_ms: policy.max_delay.as_millis() as u64,
        }
    }
}

impl ClientSettings {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn redirector_config(&self) -> RedirectorConfig {
        RedirectorConfig {
            base_url: self.redirector_url.clone(),
            game_code: self.game_code.clone(),
            connection_profile: self.connection_profile.clone(),
            blaze_sdk_version: self.blaze_sdk_version.clone(),
            client_name: self.client_name.clone(),
            client_type: self.client_type.clone(),
            environment: self.environment.clone(),
            request_timeout: Duration::from_secs(self.redirector_timeout_secs),
            ..RedirectorConfig::default()
        }
    }

    pub fn connection_config(&self) -> ConnectionConfig {
        ConnectionConfig::default()
            .request_timeout(Duration::from_secs(self.request_timeout_secs))
            .keepalive_interval(Duration::from_secs(self.keepalive_interval_secs))
            .connect_timeout(Duration::from_secs(self.connect_timeout_secs))
            .max_frame_size(self.max_frame_size)
            .channel_capacity(self.channel_capacity)
            .notification_capacity(self.notification_capacity)
            .session_expired_methods(self.session_expired_methods.iter().cloned())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::exponential(
            self.retry.max_attempts,
            Duration::from_millis(self.retry.base_delay_ms),
            Duration::from_millis(self.retry.max_delay_ms),
        )
    }

    /// Manager wired to the redirector and TLS transport described here.
    pub fn build_manager(&self) -> Result<ConnectionManager> {
        Ok(
            ConnectionManager::new(self.redirector_config(), self.connection_config())?
                .retry_policy(self.retry_policy()),
        )
    }
}
