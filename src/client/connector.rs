//! HTTPS exchange over the mutually-authenticated TLS transport.
//!
//! Each call opens its own TCP connection, performs the rustls handshake
//! (presenting the client certificate), sends one HTTP/1.1 `DELETE` and
//! returns the response status. Nothing is pooled; the connection is dropped
//! with the returned future.

use super::{InvalidationTarget, Transport, TransportError, TransportFuture};
use crate::SecureTransport;
use bytes::Bytes;
use http_body_util::Empty;
use hyper::header::{HeaderValue, HOST, USER_AGENT};
use hyper::{Method, Request, StatusCode};
use hyper_util::rt::TokioIo;
use rustls::pki_types::ServerName;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use url::Host;

const USER_AGENT_VALUE: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

impl Transport for SecureTransport {
    fn delete<'a>(&'a self, target: &'a InvalidationTarget) -> TransportFuture<'a> {
        Box::pin(delete(Arc::clone(&self.tls), target))
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }
}

async fn delete(
    tls: Arc<rustls::ClientConfig>,
    target: &InvalidationTarget,
) -> Result<StatusCode, TransportError> {
    let port = target.port();

    let (tcp, server_name) = match target.host() {
        Some(Host::Domain(domain)) => {
            let server_name = ServerName::try_from(domain.to_owned())
                .map_err(|e| TransportError::InvalidServerName(format!("{domain}: {e}")))?;
            let tcp = TcpStream::connect((domain, port))
                .await
                .map_err(TransportError::Connect)?;
            (tcp, server_name)
        }
        Some(Host::Ipv4(ip)) => connect_ip(IpAddr::V4(ip), port).await?,
        Some(Host::Ipv6(ip)) => connect_ip(IpAddr::V6(ip), port).await?,
        None => {
            return Err(TransportError::InvalidServerName(
                target.server().to_string(),
            ))
        }
    };

    let tls_stream = TlsConnector::from(tls)
        .connect(server_name, tcp)
        .await
        .map_err(TransportError::Tls)?;

    let (mut sender, conn) = hyper::client::conn::http1::handshake(TokioIo::new(tls_stream)).await?;

    let request = Request::builder()
        .method(Method::DELETE)
        .uri(target.path_and_query())
        .header(HOST, target.authority())
        .header(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE))
        .body(Empty::<Bytes>::new())?;

    // The connection must be polled for the request to make progress. It is
    // driven here rather than spawned so that it never outlives this call.
    let send = sender.send_request(request);
    tokio::pin!(conn, send);
    let response = tokio::select! {
        biased;
        response = &mut send => response?,
        closed = &mut conn => {
            closed?;
            // Closed right after answering, or without answering at all.
            send.await?
        }
    };

    Ok(response.status())
}

async fn connect_ip(
    ip: IpAddr,
    port: u16,
) -> Result<(TcpStream, ServerName<'static>), TransportError> {
    let tcp = TcpStream::connect((ip, port))
        .await
        .map_err(TransportError::Connect)?;
    Ok((tcp, ServerName::IpAddress(ip.into())))
}
