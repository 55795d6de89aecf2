//! TLS client transport.
//!
//! The game backend presents self-signed certificates that do not match
//! its host names, so the client config accepts any server certificate.
//! Handshake signatures are still checked against the presented key.
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use blaze_client::transport::{connect_tls, ServerAddress};
//!
//! let addr = ServerAddress::new("diceprodblapp-08.ea.com", 10539);
//! let stream = connect_tls(&addr, Duration::from_secs(10)).await?;
//! ```

use std::sync::Arc;
use std::time::Duration;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{ring, verify_tls12_signature, verify_tls13_signature, CryptoProvider};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, SignatureScheme};
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;

use super::ServerAddress;
use crate::error::{BlazeError, Result};

/// Certificate verifier that trusts every server certificate.
#[derive(Debug)]
struct AcceptAnyCertificate {
    provider: Arc<CryptoProvider>,
}

impl ServerCertVerifier for AcceptAnyCertificate {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> std::result::Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}

/// Client config that skips certificate and host name validation.
///
/// Offers TLS 1.2 and 1.3 with the ring provider's default cipher suites.
pub fn permissive_tls_config() -> Result<Arc<ClientConfig>> {
    let provider = Arc::new(ring::default_provider());
    let config = ClientConfig::builder_with_provider(provider.clone())
        .with_safe_default_protocol_versions()?
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(AcceptAnyCertificate { provider }))
        .with_no_client_auth();
    Ok(Arc::new(config))
}

/// Open a TCP connection to `addr` and complete a TLS handshake.
///
/// `connect_timeout` bounds the TCP connect and the handshake together.
pub async fn connect_tls(
    addr: &ServerAddress,
    connect_timeout: Duration,
) -> Result<TlsStream<TcpStream>> {
    let server_name = ServerName::try_from(addr.host.clone())
        .map_err(|_| BlazeError::InvalidServerName(addr.host.clone()))?;
    let connector = tokio_rustls::TlsConnector::from(permissive_tls_config()?);

    let handshake = async {
        let tcp = TcpStream::connect((addr.host.as_str(), addr.port)).await?;
        tcp.set_nodelay(true)?;
        let stream = connector.connect(server_name, tcp).await?;
        Ok::<_, BlazeError>(stream)
    };

    match tokio::time::timeout(connect_timeout, handshake).await {
        Ok(result) => {
            let stream = result?;
            tracing::debug!("TLS connection established to {}", addr);
            Ok(stream)
        }
        Err(_) => Err(BlazeError::Io(std::io::Error::new(
            std::io::ErrorKind::TimedOut,
            format!("connecting to {} timed out after {:?}", addr, connect_timeout),
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permissive_config_builds() {
        let config = permissive_tls_config().unwrap();
        assert!(config.alpn_protocols.is_empty());
        assert!(config.enable_sni);
    }

    #[test]
    fn test_verifier_accepts_any_certificate() {
        let verifier = AcceptAnyCertificate {
            provider: Arc::new(ring::default_provider()),
        };
        let name = ServerName::try_from("gosredirector.ea.com").unwrap();
        let result = verifier.verify_server_cert(
            &CertificateDer::from(vec![0u8; 8]),
            &[],
            &name,
            &[],
            UnixTime::now(),
        );
        assert!(result.is_ok());
        assert!(!verifier.supported_verify_schemes().is_empty());
    }

    #[tokio::test]
    async fn test_connect_refused_is_io_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let addr = ServerAddress::new("127.0.0.1", port);
        let err = connect_tls(&addr, Duration::from_secs(5)).await.unwrap_err();
        assert!(matches!(err, BlazeError::Io(_)));
    }

    #[tokio::test]
    async fn test_handshake_timeout() {
        // Accepts TCP but never answers the ClientHello
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let _server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
            drop(socket);
        });

        let addr = ServerAddress::new("127.0.0.1", port);
        let err = connect_tls(&addr, Duration::from_millis(100))
            .await
            .unwrap_err();
        match err {
            BlazeError::Io(e) => assert_eq!(e.kind(), std::io::ErrorKind::TimedOut),
            other => panic!("expected timeout, got {:?}", other),
        }
    }
}
