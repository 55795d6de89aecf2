//! # blaze-client
//!
//! Async client for the Blaze binary RPC protocol spoken by EA game
//! backends.
//!
//! ## Layers
//!
//! - [`codec`]: the TDF tag/type/value format carried in packet payloads
//! - [`protocol`]: 16-byte frame headers, stream reassembly, method names
//! - [`Connection`]: one TLS socket with request/response correlation and keepalive
//! - [`ConnectionManager`]: connections pooled per player id, backends found
//!   through the [`Redirector`]
//!
//! ## Example
//!
//! ```ignore
//! use blaze_client::codec::Struct;
//! use blaze_client::protocol::Packet;
//! use blaze_client::{ConnectionConfig, ConnectionManager, RedirectorConfig};
//!
//! #[tokio::main]
//! async fn main() -> blaze_client::Result<()> {
//!     let manager = ConnectionManager::new(RedirectorConfig::default(), ConnectionConfig::default())?;
//!     let conn = manager.get_socket_for_pid(1_004_198_901_867).await?;
//!
//!     let data = Struct::new().with("GAME", "tunguska")?.with("GID", 123456)?;
//!     let response = conn.send(Packet::request("Game.leaveGame", data)).await?;
//!     println!("{}", serde_json::to_string_pretty(&response.data)?);
//!     Ok(())
//! }
//! ```

pub mod codec;
pub mod config;
pub mod connection;
pub mod error;
pub mod manager;
pub mod pending;
pub mod protocol;
pub mod redirector;
pub mod transport;
pub mod writer;

pub use config::ClientSettings;
pub use connection::{Connection, ConnectionConfig};
pub use error::{BlazeError, Result};
pub use manager::{ConnectionManager, Connector, RetryPolicy, TlsConnector};
pub use redirector::{Redirector, RedirectorConfig, ServerResolver};
pub use transport::ServerAddress;
