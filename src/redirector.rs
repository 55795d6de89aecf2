//! Server redirector lookup.
//!
//! The redirector is an HTTPS endpoint that maps a game code to the
//! backend socket address a client should connect to. One POST per lookup,
//! no retries here; the [`ConnectionManager`](crate::ConnectionManager)
//! decides whether to try again.

use std::fmt;
use std::net::Ipv4Addr;
use std::time::Duration;

use async_trait::async_trait;
use quick_xml::escape::escape;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::Client;
use serde::Deserialize;

use crate::error::{BlazeError, Result};

pub use crate::transport::ServerAddress;

/// Production redirector.
pub const DEFAULT_REDIRECTOR_URL: &str = "https://spring18.gosredirector.ea.com:42230";

/// Default game code looked up by [`ServerResolver::get_server_address`].
pub const DEFAULT_GAME_CODE: &str = "battlefield-1-pc";

/// Anything that can turn a game code into a backend address.
#[async_trait]
pub trait ServerResolver: Send + Sync {
    async fn get_server_address(&self, game_code: &str) -> Result<ServerAddress>;
}

/// Redirector request settings.
#[derive(Debug, Clone)]
pub struct RedirectorConfig {
    pub base_url: String,
    pub game_code: String,
    pub connection_profile: String,
    pub blaze_sdk_version: String,
    pub client_name: String,
    pub client_type: String,
    pub environment: String,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

impl Default for RedirectorConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_REDIRECTOR_URL.to_string(),
            game_code: DEFAULT_GAME_CODE.to_string(),
            connection_profile: "standardSecure_v4".to_string(),
            blaze_sdk_version: "15.1.1.3.0".to_string(),
            client_name: "Battlefield 1".to_string(),
            client_type: "CLIENT_TYPE_HTTP_USER".to_string(),
            environment: "prod".to_string(),
            connect_timeout: Duration::from_secs(5),
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl RedirectorConfig {
    /// XML body of a `getServerInstance` request for `game_code`.
    pub fn request_body(&self, game_code: &str) -> String {
        format!(
            "<serverinstancerequest>\
             <blazesdkversion>{sdk}</blazesdkversion>\
             <clientname>{client}</clientname>\
             <clienttype>{client_type}</clienttype>\
             <clientplatform>pc</clientplatform>\
             <clientskuid>pc</clientskuid>\
             <clientversion>1.0</clientversion>\
             <environment>{env}</environment>\
             <name>{name}</name>\
             <platform>Windows</platform>\
             <connectionprofile>{profile}</connectionprofile>\
             <istrial>0</istrial>\
             </serverinstancerequest>",
            sdk = escape(&self.blaze_sdk_version),
            client = escape(&self.client_name),
            client_type = escape(&self.client_type),
            env = escape(&self.environment),
            name = escape(game_code),
            profile = escape(&self.connection_profile),
        )
    }
}

#[derive(Debug, Deserialize)]
struct ServerInstanceResponse {
    address: AddressField,
}

#[derive(Debug, Deserialize)]
struct AddressField {
    #[serde(rename = "ipAddress")]
    ip_address: IpAddressField,
}

#[derive(Debug, Deserialize)]
struct IpAddressField {
    #[serde(default)]
    hostname: String,
    #[serde(default)]
    ip: u32,
    port: u16,
}

/// Parse a redirector JSON response.
///
/// Prefers `hostname`; falls back to the integer `ip` in dotted form.
pub fn parse_server_instance(body: &str) -> Result<ServerAddress> {
    let response: ServerInstanceResponse = serde_json::from_str(body)?;
    let ip = response.address.ip_address;

    let host = if !ip.hostname.trim().is_empty() {
        ip.hostname.trim().to_string()
    } else if ip.ip != 0 {
        Ipv4Addr::from(ip.ip).to_string()
    } else {
        return Err(BlazeError::Redirector(
            "response has neither hostname nor ip".to_string(),
        ));
    };

    Ok(ServerAddress::new(host, ip.port))
}

/// HTTPS client for the redirector.
#[derive(Clone)]
pub struct Redirector {
    client: Client,
    config: RedirectorConfig,
}

impl Redirector {
    /// Build a redirector client. Certificate validation is disabled; the
    /// legacy endpoint does not present a publicly trusted chain.
    pub fn new(config: RedirectorConfig) -> Result<Self> {
        let client = Client::builder()
            .danger_accept_invalid_certs(true)
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &RedirectorConfig {
        &self.config
    }

    /// Endpoint the lookup is posted to.
    pub fn endpoint(&self) -> String {
        format!(
            "{}/redirector/getServerInstance",
            self.config.base_url.trim_end_matches('/')
        )
    }

    /// Look up the backend for the configured game code.
    pub async fn resolve_default(&self) -> Result<ServerAddress> {
        self.get_server_address(&self.config.game_code).await
    }
}

impl fmt::Debug for Redirector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Redirector")
            .field("endpoint", &self.endpoint())
            .field("game_code", &self.config.game_code)
            .finish()
    }
}

#[async_trait]
impl ServerResolver for Redirector {
    async fn get_server_address(&self, game_code: &str) -> Result<ServerAddress> {
        let endpoint = self.endpoint();
        tracing::debug!("Resolving {} via {}", game_code, endpoint);

        let response = self
            .client
            .post(&endpoint)
            .header(CONTENT_TYPE, "application/xml")
            .header(ACCEPT, "application/json")
            .body(self.config.request_body(game_code))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            let snippet: String = body.chars().take(200).collect();
            return Err(BlazeError::Redirector(format!(
                "redirector returned {}: {}",
                status, snippet
            )));
        }

        let address = parse_server_instance(&body)?;
        tracing::debug!("Redirector assigned {} for {}", address, game_code);
        Ok(address)
    }
}
