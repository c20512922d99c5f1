//! TLS stream establishment.
//!
//! Connections are implicit TLS only. The caller gets a plain
//! [`TlsStream`] rather than a wrapper enum; everything above this module is
//! generic over `AsyncRead + AsyncWrite` so tests never need a socket.

use std::sync::Arc;

use rustls::pki_types::ServerName;
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tokio_rustls::client::TlsStream;

use crate::Result;

use super::Config;

/// Creates a TLS connector with the bundled webpki root certificates.
///
/// # Errors
///
/// Currently infallible; the signature leaves room for custom roots.
pub fn create_tls_connector() -> Result<TlsConnector> {
    let root_store = rustls::RootCertStore {
        roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
    };

    let config = rustls::ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();

    Ok(TlsConnector::from(Arc::new(config)))
}

/// Opens a TCP connection and completes the TLS handshake.
///
/// # Errors
///
/// Returns an I/O error when the TCP connect fails or times out, a TLS error
/// when the handshake fails, and an error for a host name that is not a
/// valid server name.
pub async fn connect_tls(config: &Config) -> Result<TlsStream<TcpStream>> {
    let addr = format!("{}:{}", config.host, config.port);
    let tcp = tokio::time::timeout(config.connect_timeout, TcpStream::connect(&addr))
        .await
        .map_err(|_| {
            std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                format!("connect to {addr} timed out"),
            )
        })??;

    let connector = create_tls_connector()?;
    let server_name = ServerName::try_from(config.host.clone())?;
    let tls = connector.connect(server_name, tcp).await?;
    tracing::debug!(host = %config.host, port = config.port, "tls established");
    Ok(tls)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn connector_builds_from_bundled_roots() {
        assert!(create_tls_connector().is_ok());
    }
}
