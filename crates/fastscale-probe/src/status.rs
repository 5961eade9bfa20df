//! Status page probe and parser.

use std::future::Future;
use std::pin::Pin;

use thiserror::Error;
use tracing::debug;

use fastscale_core::ServiceSpec;

/// Line marker preceding the connection count.
pub const ACTIVE_CONNECTIONS_MARKER: &str = "Active connections:";

/// Result type alias for probe operations.
pub type ProbeResult<T> = Result<T, ProbeError>;

/// Boxed future returned by [`StatusProbe::fetch`].
pub type ProbeFuture<'a> = Pin<Box<dyn Future<Output = ProbeResult<u64>> + Send + 'a>>;

/// Why a probe produced no count. Neither is fatal to a service loop.
#[derive(Debug, Error)]
pub enum ProbeError {
    /// The request failed, timed out, or the body could not be read.
    #[error("status request failed: {0}")]
    Transport(String),

    /// The body had no marker line, or the value after it is not a number.
    #[error("unparsable status page: {0}")]
    Parse(String),
}

/// Source of the load signal — injected for testability.
pub trait StatusProbe: Send + Sync {
    /// Fetch the current active connection count for `spec`.
    fn fetch<'a>(&'a self, spec: &'a ServiceSpec) -> ProbeFuture<'a>;
}

/// Probe that scrapes the status page over HTTP(S).
#[derive(Debug, Clone)]
pub struct HttpStatusProbe {
    client: reqwest::Client,
}

impl HttpStatusProbe {
    pub fn new() -> ProbeResult<Self> {
        let client = reqwest::Client::builder()
            .danger_accept_invalid_certs(true)
            // Each probe opens and closes its own connection.
            .pool_max_idle_per_host(0)
            .user_agent(concat!("fastscale/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ProbeError::Transport(format!("build http client: {e}")))?;
        Ok(Self { client })
    }

    async fn request(&self, spec: &ServiceSpec) -> ProbeResult<String> {
        let mut req = self
            .client
            .get(&spec.status_url)
            .timeout(spec.check_interval);
        if let Some(auth) = &spec.status_auth {
            req = req.header(auth.name.as_str(), auth.value.as_str());
        }

        let resp = req
            .send()
            .await
            .map_err(|e| ProbeError::Transport(e.to_string()))?;
        debug!(status = %resp.status(), url = %spec.status_url, "status page fetched");

        resp.text()
            .await
            .map_err(|e| ProbeError::Transport(format!("read body: {e}")))
    }
}

impl StatusProbe for HttpStatusProbe {
    fn fetch<'a>(&'a self, spec: &'a ServiceSpec) -> ProbeFuture<'a> {
        Box::pin(async move {
            let body = self.request(spec).await?;
            parse_active_connections(&body)
        })
    }
}

/// Extract the active connection count from a status page body.
///
/// Uses the first line containing [`ACTIVE_CONNECTIONS_MARKER`]; spaces in
/// the remainder are dropped before parsing.
pub fn parse_active_connections(body: &str) -> ProbeResult<u64> {
    let rest = body
        .lines()
        .find_map(|line| line.split_once(ACTIVE_CONNECTIONS_MARKER).map(|(_, rest)| rest))
        .ok_or_else(|| ProbeError::Parse(format!("no {ACTIVE_CONNECTIONS_MARKER:?} line")))?;
    let value: String = rest.chars().filter(|c| *c != ' ').collect();

    value
        .parse::<u64>()
        .map_err(|e| ProbeError::Parse(format!("count {value:?}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const NGINX_STATUS: &str = "Active connections: 291 \n\
        server accepts handled requests\n \
        16630948 16630948 31070465 \n\
        Reading: 6 Writing: 179 Waiting: 106 \n";

    fn spec_for(url: String) -> ServiceSpec {
        ServiceSpec::new(url, "prod", "web")
    }

    #[test]
    fn parse_nginx_stub_status() {
        assert_eq!(parse_active_connections(NGINX_STATUS).unwrap(), 291);
    }

    #[test]
    fn parse_is_idempotent() {
        let first = parse_active_connections(NGINX_STATUS).unwrap();
        let second = parse_active_connections(NGINX_STATUS).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn parse_marker_not_at_line_start() {
        assert_eq!(
            parse_active_connections("nginx Active connections: 12").unwrap(),
            12
        );
    }

    #[test]
    fn parse_strips_inner_spaces() {
        assert_eq!(
            parse_active_connections("Active connections:  1 024 ").unwrap(),
            1024
        );
    }

    #[test]
    fn parse_crlf_body() {
        assert_eq!(
            parse_active_connections("Active connections: 7\r\nserver accepts\r\n").unwrap(),
            7
        );
    }

    #[test]
    fn parse_uses_first_marker_line() {
        let body = "Active connections: 5\nActive connections: 900\n";
        assert_eq!(parse_active_connections(body).unwrap(), 5);
    }

    #[test]
    fn missing_marker_is_parse_error_not_zero() {
        let err = parse_active_connections("server accepts handled requests\n 1 1 1\n").unwrap_err();
        assert!(matches!(err, ProbeError::Parse(_)));

        let err = parse_active_connections("").unwrap_err();
        assert!(matches!(err, ProbeError::Parse(_)));
    }

    #[test]
    fn non_numeric_count_is_parse_error() {
        for body in ["Active connections: many", "Active connections:", "Active connections: -3"] {
            let err = parse_active_connections(body).unwrap_err();
            assert!(matches!(err, ProbeError::Parse(_)), "{body}");
        }
    }

    #[tokio::test]
    async fn fetch_reads_count_from_server() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/nginx_status"))
            .respond_with(ResponseTemplate::new(200).set_body_string(NGINX_STATUS))
            .expect(1)
            .mount(&server)
            .await;

        let probe = HttpStatusProbe::new().unwrap();
        let spec = spec_for(format!("{}/nginx_status", server.uri()));
        assert_eq!(probe.fetch(&spec).await.unwrap(), 291);
    }

    #[tokio::test]
    async fn fetch_sends_auth_header() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(header("X-Status-Token", "secret"))
            .respond_with(ResponseTemplate::new(200).set_body_string("Active connections: 3\n"))
            .expect(1)
            .mount(&server)
            .await;

        let probe = HttpStatusProbe::new().unwrap();
        let mut spec = spec_for(server.uri());
        spec.status_auth = Some(fastscale_core::StatusAuth {
            name: "X-Status-Token".to_string(),
            value: "secret".to_string(),
        });
        assert_eq!(probe.fetch(&spec).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn fetch_times_out_at_check_interval() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("Active connections: 3\n")
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&server)
            .await;

        let probe = HttpStatusProbe::new().unwrap();
        let mut spec = spec_for(server.uri());
        spec.check_interval = Duration::from_millis(200);

        let err = probe.fetch(&spec).await.unwrap_err();
        assert!(matches!(err, ProbeError::Transport(_)));
    }

    #[tokio::test]
    async fn fetch_page_without_marker_is_parse_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>ok</html>"))
            .mount(&server)
            .await;

        let probe = HttpStatusProbe::new().unwrap();
        let err = probe.fetch(&spec_for(server.uri())).await.unwrap_err();
        assert!(matches!(err, ProbeError::Parse(_)));
    }

    /// Serves a canned HTTP/1.1 response over TLS with a fresh
    /// self-signed certificate. Returns the status URL.
    async fn self_signed_server(body: &'static str) -> String {
        use rustls::pki_types::{PrivateKeyDer, PrivatePkcs8KeyDer};
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let key = rcgen::KeyPair::generate().unwrap();
        let cert = rcgen::CertificateParams::new(vec![
            "localhost".to_string(),
            "127.0.0.1".to_string(),
        ])
        .unwrap()
        .self_signed(&key)
        .unwrap();
        let config = rustls::ServerConfig::builder_with_provider(Arc::new(
            rustls::crypto::ring::default_provider(),
        ))
        .with_safe_default_protocol_versions()
        .unwrap()
        .with_no_client_auth()
        .with_single_cert(
            vec![cert.der().clone()],
            PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(key.serialize_der())),
        )
        .unwrap();
        let acceptor = tokio_rustls::TlsAcceptor::from(Arc::new(config));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let acceptor = acceptor.clone();
                tokio::spawn(async move {
                    let Ok(mut tls) = acceptor.accept(stream).await else {
                        return;
                    };
                    let mut request = Vec::new();
                    let mut chunk = [0u8; 1024];
                    while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                        match tls.read(&mut chunk).await {
                            Ok(0) | Err(_) => return,
                            Ok(n) => request.extend_from_slice(&chunk[..n]),
                        }
                    }
                    let response = format!(
                        "HTTP/1.1 200 OK\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                        body.len()
                    );
                    let _ = tls.write_all(response.as_bytes()).await;
                    let _ = tls.shutdown().await;
                });
            }
        });
        format!("https://127.0.0.1:{port}/nginx_status")
    }

    #[tokio::test]
    async fn fetch_accepts_self_signed_certificate() {
        let url = self_signed_server("Active connections: 42\n").await;

        // A verifying client refuses the certificate.
        assert!(reqwest::Client::new().get(&url).send().await.is_err());

        let probe = HttpStatusProbe::new().unwrap();
        assert_eq!(probe.fetch(&spec_for(url)).await.unwrap(), 42);
    }

    #[tokio::test]
    async fn fetch_closed_port_is_transport_error() {
        let probe = HttpStatusProbe::new().unwrap();
        let err = probe
            .fetch(&spec_for("http://127.0.0.1:1/status".to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err, ProbeError::Transport(_)));
    }
}
