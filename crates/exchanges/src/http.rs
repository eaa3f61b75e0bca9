//! Monoio-native HTTP/HTTPS transport
//!
//! [`HttpTransport`] is the seam between adapters and the network. The
//! production implementation, [`MonoioHttpsClient`], speaks HTTP/1.1 over
//! rustls on a monoio `TcpStream`, one connection per request.
//!
//! Timeouts use `monoio::time`, so the runtime must be built with the timer
//! enabled (`#[monoio::main(timer_enabled = true)]`).

use crate::errors::{ExchangeError, Result};
use async_trait::async_trait;
use monoio::io::{AsyncReadRent, AsyncWriteRentExt};
use monoio::net::TcpStream;
use rustls::pki_types::ServerName;
use rustls::{ClientConfig, ClientConnection};
use std::fmt;
use std::io::{Read, Write};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// HTTP verbs used by venue APIs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fully built request: absolute URL, headers, optional body
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

impl HttpRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// HTTP response with the raw body bytes
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Body as text, lossy for invalid UTF-8
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Executes one HTTP exchange. Implementations must be safe to share
/// between concurrent requests of one adapter.
#[async_trait(?Send)]
pub trait HttpTransport: Send + Sync {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse>;
}

/// Monoio-native HTTPS client
pub struct MonoioHttpsClient {
    tls_config: Arc<ClientConfig>,
    timeout: Duration,
}

/// TLS stream wrapper for monoio
struct TlsStream {
    stream: TcpStream,
    tls_conn: ClientConnection,
    write_buf: Vec<u8>,
    tls_read_buf: Vec<u8>,
    handshake_complete: bool,
}

impl MonoioHttpsClient {
    /// Create a new HTTPS client with default TLS configuration
    pub fn new(timeout: Duration) -> Result<Self> {
        let mut root_store = rustls::RootCertStore::empty();
        root_store.extend(
            webpki_roots::TLS_SERVER_ROOTS
                .iter()
                .cloned()
        );

        let tls_config = ClientConfig::builder()
            .with_root_certificates(root_store)
            .with_no_client_auth();

        Ok(Self {
            tls_config: Arc::new(tls_config),
            timeout,
        })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse> {
        let parsed_url = url::Url::parse(&request.url)?;

        let host = parsed_url.host_str()
            .ok_or_else(|| ExchangeError::InvalidUrl("No host in URL".to_string()))?;

        let port = parsed_url.port().unwrap_or(443);
        let mut path_and_query = if parsed_url.path().is_empty() {
            "/".to_string()
        } else {
            parsed_url.path().to_string()
        };
        if let Some(query) = parsed_url.query() {
            path_and_query.push('?');
            path_and_query.push_str(query);
        }

        let tcp_stream = TcpStream::connect(&format!("{host}:{port}"))
            .await
            .map_err(|e| ExchangeError::TransportFailure(format!("TCP connect failed: {e}")))?;

        let server_name = ServerName::try_from(host.to_string())
            .map_err(|e| ExchangeError::TransportFailure(format!("Invalid server name: {e:?}")))?;

        let tls_conn = ClientConnection::new(self.tls_config.clone(), server_name)
            .map_err(|e| ExchangeError::TransportFailure(format!("TLS setup failed: {e}")))?;

        let mut tls_stream = TlsStream::new(tcp_stream, tls_conn);

        let body = request.body.as_deref().unwrap_or("");
        let content_length = body.len();
        let method = request.method.as_str();
        let mut head = format!(
            "{method} {path_and_query} HTTP/1.1\r\n\
             Host: {host}\r\n\
             User-Agent: Unifex/1.0\r\n\
             Accept: application/json\r\n\
             Connection: close\r\n\
             Content-Length: {content_length}\r\n"
        );

        for (key, value) in &request.headers {
            head.push_str(&format!("{key}: {value}\r\n"));
        }

        head.push_str("\r\n");
        head.push_str(body);

        tls_stream.write_all(head.as_bytes()).await?;
        let response_data = tls_stream.read_to_end().await?;

        parse_http_response(&response_data)
    }
}

#[async_trait(?Send)]
impl HttpTransport for MonoioHttpsClient {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        debug!("📡 {} {}", request.method, request.url);
        match monoio::time::timeout(self.timeout, self.send(&request)).await {
            Ok(result) => result,
            Err(_) => Err(ExchangeError::Timeout(format!(
                "{} {} after {}ms",
                request.method,
                request.url,
                self.timeout.as_millis()
            ))),
        }
    }
}

/// Split a raw HTTP/1.1 response into status, headers and decoded body
fn parse_http_response(data: &[u8]) -> Result<HttpResponse> {
    let header_end = data
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .ok_or_else(|| ExchangeError::DecodeFailure("Invalid HTTP response: no header terminator".to_string()))?;

    let header_part = String::from_utf8_lossy(&data[..header_end]);
    let raw_body = &data[header_end + 4..];

    let mut lines = header_part.lines();

    let status_line = lines.next()
        .ok_or_else(|| ExchangeError::DecodeFailure("Empty response".to_string()))?;

    let status = status_line.split_whitespace()
        .nth(1)
        .and_then(|s| s.parse::<u16>().ok())
        .ok_or_else(|| ExchangeError::DecodeFailure("Invalid status line".to_string()))?;

    let headers: Vec<(String, String)> = lines
        .filter_map(|line| line.split_once(':'))
        .map(|(key, value)| (key.trim().to_string(), value.trim().to_string()))
        .collect();

    let chunked = headers.iter().any(|(k, v)| {
        k.eq_ignore_ascii_case("transfer-encoding") && v.to_ascii_lowercase().contains("chunked")
    });

    let body = if chunked {
        decode_chunked(raw_body)?
    } else {
        raw_body.to_vec()
    };

    Ok(HttpResponse {
        status,
        headers,
        body,
    })
}

/// Decode a `Transfer-Encoding: chunked` body
fn decode_chunked(mut data: &[u8]) -> Result<Vec<u8>> {
    let mut body = Vec::with_capacity(data.len());
    loop {
        let line_end = data
            .windows(2)
            .position(|w| w == b"\r\n")
            .ok_or_else(|| ExchangeError::DecodeFailure("truncated chunk header".to_string()))?;
        let size_line = String::from_utf8_lossy(&data[..line_end]);
        // chunk extensions follow a ';'
        let size_hex = size_line.split(';').next().unwrap_or("").trim();
        let size = usize::from_str_radix(size_hex, 16)
            .map_err(|_| ExchangeError::DecodeFailure(format!("bad chunk size: {size_hex}")))?;
        data = &data[line_end + 2..];

        if size == 0 {
            return Ok(body);
        }
        if data.len() < size {
            return Err(ExchangeError::DecodeFailure("truncated chunk body".to_string()));
        }
        body.extend_from_slice(&data[..size]);
        data = &data[size..];
        if data.starts_with(b"\r\n") {
            data = &data[2..];
        }
    }
}

impl TlsStream {
    fn new(stream: TcpStream, tls_conn: ClientConnection) -> Self {
        Self {
            stream,
            tls_conn,
            write_buf: Vec::with_capacity(8192),
            tls_read_buf: Vec::with_capacity(8192),
            handshake_complete: false,
        }
    }

    async fn flush_tls(&mut self) -> Result<()> {
        while self.tls_conn.wants_write() {
            self.write_buf.clear();

            let tls_bytes = self.tls_conn.write_tls(&mut self.write_buf)
                .map_err(|e| ExchangeError::TransportFailure(format!("TLS write failed: {e}")))?;

            if tls_bytes > 0 {
                let (result, _) = self.stream.write_all(self.write_buf.clone()).await;
                result.map_err(|e| ExchangeError::TransportFailure(format!("TCP write failed: {e}")))?;
            }
        }
        Ok(())
    }

    /// Read one TCP segment into the TLS state machine; false on EOF
    async fn pump_tls(&mut self) -> Result<bool> {
        let buffer = vec![0u8; 4096];
        let (result, buf) = self.stream.read(buffer).await;
        let bytes_read = result.map_err(|e| ExchangeError::TransportFailure(format!("TCP read failed: {e}")))?;

        if bytes_read == 0 {
            return Ok(false);
        }

        self.tls_conn.read_tls(&mut std::io::Cursor::new(&buf[..bytes_read]))
            .map_err(|e| ExchangeError::TransportFailure(format!("TLS read failed: {e}")))?;

        self.tls_conn.process_new_packets()
            .map_err(|e| ExchangeError::TransportFailure(format!("TLS process failed: {e}")))?;
        Ok(true)
    }

    async fn complete_handshake(&mut self) -> Result<()> {
        if self.handshake_complete {
            return Ok(());
        }

        loop {
            self.flush_tls().await?;

            if !self.tls_conn.is_handshaking() {
                self.handshake_complete = true;
                break;
            }

            if self.tls_conn.wants_read() {
                if !self.pump_tls().await? {
                    return Err(ExchangeError::TransportFailure("Connection closed during handshake".to_string()));
                }
            } else if !self.tls_conn.wants_write() {
                return Err(ExchangeError::TransportFailure("TLS handshake stalled".to_string()));
            }
        }

        Ok(())
    }

    async fn write_all(&mut self, data: &[u8]) -> Result<()> {
        self.complete_handshake().await?;

        self.tls_conn.writer().write_all(data)
            .map_err(|e| ExchangeError::TransportFailure(format!("TLS application write failed: {e}")))?;

        self.flush_tls().await
    }

    async fn read_to_end(&mut self) -> Result<Vec<u8>> {
        self.complete_handshake().await?;

        let mut response_data = Vec::new();

        loop {
            self.tls_read_buf.clear();
            self.tls_read_buf.resize(4096, 0);

            match self.tls_conn.reader().read(&mut self.tls_read_buf) {
                Ok(0) => {}
                Ok(n) => {
                    response_data.extend_from_slice(&self.tls_read_buf[..n]);
                    continue;
                }
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {}
                // peers that close without close_notify
                Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
                Err(e) => {
                    return Err(ExchangeError::TransportFailure(format!("TLS read failed: {e}")));
                }
            }

            if !self.pump_tls().await? {
                break;
            }
        }

        Ok(response_data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_https_client_creation() {
        let client = MonoioHttpsClient::new(Duration::from_secs(10)).unwrap();
        assert_eq!(client.timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_parse_plain_response() {
        let raw = b"HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: 11\r\n\r\n{\"ok\":true}";
        let response = parse_http_response(raw).unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.header("content-type"), Some("application/json"));
        assert_eq!(response.text(), "{\"ok\":true}");
        assert!(response.is_success());
    }

    #[test]
    fn test_parse_chunked_response() {
        let raw = b"HTTP/1.1 400 Bad Request\r\nTransfer-Encoding: chunked\r\n\r\n7\r\n{\"code\"\r\n6;ext=1\r\n:-1121\r\n1\r\n}\r\n0\r\n\r\n";
        let response = parse_http_response(raw).unwrap();
        assert_eq!(response.status, 400);
        assert_eq!(response.text(), "{\"code\":-1121}");
        assert!(!response.is_success());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_http_response(b"not http").is_err());
        assert!(parse_http_response(b"HTTP/1.1 abc\r\n\r\n").is_err());
    }

    #[test]
    fn test_truncated_chunk_is_decode_failure() {
        let raw = b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\nff\r\nshort";
        let err = parse_http_response(raw).unwrap_err();
        assert_eq!(err.kind(), crate::errors::ErrorKind::Decode);
    }

    #[test]
    fn test_method_names() {
        assert_eq!(Method::Get.to_string(), "GET");
        assert_eq!(Method::Delete.as_str(), "DELETE");
    }
}
