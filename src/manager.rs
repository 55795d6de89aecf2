//! Connection pool keyed by player id.
//!
//! [`ConnectionManager::get_connection`] hands out a live [`Connection`]
//! per key, reconnecting transparently when the cached one has closed
//! (socket error, session expiry, explicit close).
//!
//! # Example
//!
//! ```ignore
//! use blaze_client::{ConnectionConfig, ConnectionManager, RedirectorConfig};
//!
//! let manager = ConnectionManager::new(RedirectorConfig::default(), ConnectionConfig::default())?;
//! let conn = manager.get_socket_for_pid(1_004_198_901_867).await?;
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use tokio::sync::Mutex;

use crate::connection::{Connection, ConnectionConfig};
use crate::error::Result;
use crate::redirector::{Redirector, RedirectorConfig, ServerResolver, DEFAULT_GAME_CODE};
use crate::transport::ServerAddress;

/// Opens a connection to a resolved address.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, address: &ServerAddress) -> Result<Connection>;
}

/// Connector that opens TLS connections with a fixed config.
#[derive(Debug, Clone, Default)]
pub struct TlsConnector {
    config: ConnectionConfig,
}

impl TlsConnector {
    pub fn new(config: ConnectionConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Connector for TlsConnector {
    async fn connect(&self, address: &ServerAddress) -> Result<Connection> {
        Connection::connect(address.clone(), self.config.clone()).await
    }
}

/// Bounded exponential backoff for redirector lookups.
///
/// The default makes a single attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// No retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
        }
    }

    pub fn exponential(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            max_delay,
        }
    }

    /// Delay after failed attempt number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::none()
    }
}

/// Pool of connections keyed by persona id.
pub struct ConnectionManager {
    resolver: Arc<dyn ServerResolver>,
    connector: Arc<dyn Connector>,
    game_code: String,
    retry: RetryPolicy,
    connections: Mutex<HashMap<u64, Connection>>,
}

impl ConnectionManager {
    /// Manager resolving through the HTTPS redirector and connecting over TLS.
    pub fn new(redirector: RedirectorConfig, config: ConnectionConfig) -> Result<Self> {
        let game_code = redirector.game_code.clone();
        let resolver = Arc::new(Redirector::new(redirector)?);
        Ok(Self::with_parts(resolver, Arc::new(TlsConnector::new(config))).game_code(game_code))
    }

    /// Manager with custom resolution and connection strategies.
    pub fn with_parts(resolver: Arc<dyn ServerResolver>, connector: Arc<dyn Connector>) -> Self {
        Self {
            resolver,
            connector,
            game_code: DEFAULT_GAME_CODE.to_string(),
            retry: RetryPolicy::default(),
            connections: Mutex::new(HashMap::new()),
        }
    }

    pub fn game_code(mut self, game_code: impl Into<String>) -> Self {
        self.game_code = game_code.into();
        self
    }

    pub fn retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Return the open connection for `key`, creating one if needed.
    ///
    /// A key seen for the first time shares the backend of a random open
    /// connection when there is one. A key whose connection closed is
    /// resolved again through the redirector.
    pub async fn get_connection(&self, key: u64) -> Result<Connection> {
        let shared = {
            let mut connections = self.connections.lock().await;
            match connections.get(&key) {
                Some(conn) if conn.is_open() => return Ok(conn.clone()),
                Some(_) => {
                    tracing::debug!("Connection for {} closed, reconnecting", key);
                    connections.remove(&key);
                    None
                }
                None => pick_shared_address(&connections),
            }
        };

        let address = match shared {
            Some(address) => {
                tracing::debug!("Reusing backend {} for {}", address, key);
                address
            }
            None => self.resolve().await?,
        };
        let conn = self.connector.connect(&address).await?;

        let mut connections = self.connections.lock().await;
        if let Some(existing) = connections.get(&key) {
            if existing.is_open() {
                // Another caller connected this key first.
                conn.close();
                return Ok(existing.clone());
            }
        }
        connections.insert(key, conn.clone());
        Ok(conn)
    }

    /// Alias of [`get_connection`](Self::get_connection).
    pub async fn get_socket_for_pid(&self, pid: u64) -> Result<Connection> {
        self.get_connection(pid).await
    }

    async fn resolve(&self) -> Result<ServerAddress> {
        let attempts = self.retry.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.resolver.get_server_address(&self.game_code).await {
                Ok(address) => return Ok(address),
                Err(e) if attempt < attempts => {
                    let delay = self.retry.delay_for(attempt);
                    tracing::warn!(
                        "Redirector lookup {}/{} failed: {}; retrying in {:?}",
                        attempt,
                        attempts,
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    tracing::error!("Redirector lookup failed: {}", e);
                    return Err(e);
                }
            }
        }
    }

    /// Close and forget the connection for `key`. Returns whether one existed.
    pub async fn remove(&self, key: u64) -> bool {
        match self.connections.lock().await.remove(&key) {
            Some(conn) => {
                conn.close();
                true
            }
            None => false,
        }
    }

    /// Close every connection and empty the pool.
    pub async fn close_all(&self) {
        let mut connections = self.connections.lock().await;
        for (_, conn) in connections.drain() {
            conn.close();
        }
    }

    /// Number of cached connections, open or not.
    pub async fn len(&self) -> usize {
        self.connections.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.connections.lock().await.is_empty()
    }
}

impl fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("game_code", &self.game_code)
            .field("retry", &self.retry)
            .finish()
    }
}

fn pick_shared_address(connections: &HashMap<u64, Connection>) -> Option<ServerAddress> {
    let open: Vec<&ServerAddress> = connections
        .values()
        .filter(|conn| conn.is_open())
        .filter_map(|conn| conn.address())
        .collect();
    if open.is_empty() {
        return None;
    }
    let index = rand::thread_rng().gen_range(0..open.len());
    Some(open[index].clone())
}
