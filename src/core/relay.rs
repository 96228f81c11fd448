//! 節流 HTTP relay：把單一請求轉送到固定的上游，並限制請求本體的傳輸速率，
//! 讓原本瞬間完成的上傳可以被進度輪詢觀察到。

use crate::config::RelaySettings;
use crate::utils::error::{HarnessError, Result};
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use url::Url;

const MAX_CHUNK_SIZE: u64 = 8192;
const RESPONSE_READ_SIZE: usize = 4096;
const MAX_HEADER_LINES: usize = 128;

#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub target_host: String,
    pub target_port: u16,
    pub listen_addr: SocketAddr,
    /// 每秒位元組數
    pub bandwidth: u64,
    pub connect_timeout: Duration,
    pub response_timeout: Duration,
}

impl RelayConfig {
    pub fn new(target_host: impl Into<String>, target_port: u16, bandwidth: u64) -> Self {
        let defaults = RelaySettings::default();
        Self {
            target_host: target_host.into(),
            target_port,
            listen_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, 0)),
            bandwidth: bandwidth.max(1),
            connect_timeout: defaults.connect_timeout,
            response_timeout: defaults.response_timeout,
        }
    }

    /// 由 API 位址推出上游主機與埠號；relay 只講明文 HTTP
    pub fn for_upstream(upstream_url: &str, settings: &RelaySettings) -> Result<Self> {
        let url = Url::parse(upstream_url)?;
        if url.scheme() != "http" {
            return Err(HarnessError::relay(format!(
                "Only plain http upstreams can be relayed, got {}",
                url.scheme()
            )));
        }
        let host = url
            .host_str()
            .ok_or_else(|| HarnessError::relay(format!("Upstream URL has no host: {}", upstream_url)))?;
        let port = url.port_or_known_default().unwrap_or(80);

        Ok(Self {
            target_host: host.to_string(),
            target_port: port,
            listen_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, settings.listen_port)),
            bandwidth: settings.bandwidth_bytes_per_sec().max(1),
            connect_timeout: settings.connect_timeout,
            response_timeout: settings.response_timeout,
        })
    }

    pub fn with_response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = timeout;
        self
    }

    pub fn chunk_size(&self) -> usize {
        chunk_size_for(self.bandwidth)
    }
}

/// 每塊大小為 min(8192, bandwidth / 4)，至少 1 byte
pub fn chunk_size_for(bandwidth: u64) -> usize {
    MAX_CHUNK_SIZE.min(bandwidth / 4).max(1) as usize
}

pub struct ThrottlingRelay {
    config: RelayConfig,
}

impl ThrottlingRelay {
    pub fn new(config: RelayConfig) -> Self {
        Self { config }
    }

    /// 綁定監聽埠並在背景接受連線，每個連線一個 task
    pub async fn start(self) -> Result<RelayHandle> {
        let listener = TcpListener::bind(self.config.listen_addr)
            .await
            .map_err(|e| HarnessError::relay(format!("Cannot listen on {}: {}", self.config.listen_addr, e)))?;
        let local_addr = listener.local_addr()?;

        tracing::info!(
            "🐢 Relay started: {} -> {}:{} @ {}KB/s",
            local_addr,
            self.config.target_host,
            self.config.target_port,
            self.config.bandwidth / 1024
        );

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let config = Arc::new(self.config);
        let task = tokio::spawn(accept_loop(listener, config, shutdown_rx));

        Ok(RelayHandle {
            local_addr,
            shutdown_tx,
            task,
        })
    }
}

/// 執行中的 relay；drop 或 `shutdown` 都會停止接受新連線
pub struct RelayHandle {
    local_addr: SocketAddr,
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl RelayHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.local_addr)
    }

    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        if let Err(e) = self.task.await {
            tracing::warn!("Relay accept loop ended abnormally: {}", e);
        }
        tracing::info!("🛑 Relay on {} stopped", self.local_addr);
    }
}

async fn accept_loop(listener: TcpListener, config: Arc<RelayConfig>, mut shutdown: watch::Receiver<bool>) {
    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            accepted = listener.accept() => match accepted {
                Ok((stream, addr)) => {
                    tracing::debug!("New relay connection from {}", addr);
                    let config = config.clone();
                    tokio::spawn(async move {
                        handle_connection(stream, &config).await;
                    });
                }
                Err(e) => {
                    tracing::error!("Failed to accept relay connection: {}", e);
                }
            }
        }
    }
}

async fn handle_connection(stream: TcpStream, config: &RelayConfig) {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);

    let reply = match relay_request(&mut reader, config).await {
        Ok(response) if !response.is_empty() => response,
        Ok(_) => {
            tracing::warn!("⚠️ Relay: upstream closed without a response");
            error_response(500, "No response from server")
        }
        Err(e) => {
            tracing::error!("❌ Relay error: {}", e);
            error_response(500, &format!("Proxy error: {}", e))
        }
    };

    if let Err(e) = writer.write_all(&reply).await {
        tracing::debug!("Relay: client went away before the reply was written: {}", e);
    }
    let _ = writer.shutdown().await;
}

async fn relay_request<R>(reader: &mut R, config: &RelayConfig) -> Result<Vec<u8>>
where
    R: AsyncBufRead + Unpin,
{
    let head = read_request_head(reader).await?;
    let content_length = head.content_length()?;
    tracing::debug!("Relay: {} {} ({:?} body bytes)", head.method, head.path, content_length);

    let connect = TcpStream::connect((config.target_host.as_str(), config.target_port));
    let mut upstream = tokio::time::timeout(config.connect_timeout, connect)
        .await
        .map_err(|_| {
            HarnessError::relay(format!(
                "Connecting to {}:{} timed out",
                config.target_host, config.target_port
            ))
        })??;

    upstream
        .write_all(head.upstream_head(&config.target_host, config.target_port).as_bytes())
        .await?;

    if let Some(length) = content_length.filter(|length| *length > 0) {
        tracing::info!("🐢 Relay: forwarding {} bytes...", length);
        forward_throttled(reader, &mut upstream, length, config.bandwidth).await?;
    }

    read_response(&mut upstream, config.response_timeout).await
}

/// 請求行與標頭
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestHead {
    pub method: String,
    pub path: String,
    pub headers: Vec<(String, String)>,
}

impl RequestHead {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn content_length(&self) -> Result<Option<u64>> {
        if let Some(encoding) = self.header("transfer-encoding") {
            if encoding.to_ascii_lowercase().contains("chunked") {
                return Err(HarnessError::relay("Chunked request bodies are not supported"));
            }
        }

        match self.header("content-length") {
            Some(value) => value
                .trim()
                .parse::<u64>()
                .map(Some)
                .map_err(|_| HarnessError::relay(format!("Invalid Content-Length: {}", value))),
            None => Ok(None),
        }
    }

    /// 去掉 Host/Connection，改成指向上游並要求上游回應後關閉連線
    pub fn upstream_head(&self, target_host: &str, target_port: u16) -> String {
        let mut head = format!("{} {} HTTP/1.1\r\n", self.method, self.path);
        for (name, value) in &self.headers {
            if name.eq_ignore_ascii_case("host") || name.eq_ignore_ascii_case("connection") {
                continue;
            }
            head.push_str(&format!("{}: {}\r\n", name, value));
        }
        head.push_str(&format!("Host: {}:{}\r\n", target_host, target_port));
        head.push_str("Connection: close\r\n");
        head.push_str("\r\n");
        head
    }
}

pub async fn read_request_head<R>(reader: &mut R) -> Result<RequestHead>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = String::new();
    if reader.read_line(&mut line).await? == 0 {
        return Err(HarnessError::relay("Client closed the connection before sending a request"));
    }

    let mut parts = line.split_whitespace();
    let (method, path) = match (parts.next(), parts.next(), parts.next()) {
        (Some(method), Some(path), Some(version)) if version.starts_with("HTTP/") => {
            (method.to_string(), path.to_string())
        }
        _ => return Err(HarnessError::relay(format!("Malformed request line: {}", line.trim_end()))),
    };

    let mut headers = Vec::new();
    loop {
        line.clear();
        if reader.read_line(&mut line).await? == 0 {
            return Err(HarnessError::relay("Connection closed inside the request headers"));
        }
        let trimmed = line.trim_end_matches(['\r', '\n']);
        if trimmed.is_empty() {
            break;
        }
        if headers.len() >= MAX_HEADER_LINES {
            return Err(HarnessError::relay("Too many request headers"));
        }
        if let Some((name, value)) = trimmed.split_once(':') {
            headers.push((name.trim().to_string(), value.trim().to_string()));
        }
    }

    Ok(RequestHead { method, path, headers })
}

/// 分塊轉送 `total` bytes，每塊之後睡 `chunk / bandwidth` 秒
pub async fn forward_throttled<R, W>(source: &mut R, destination: &mut W, total: u64, bandwidth: u64) -> Result<u64>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let bandwidth = bandwidth.max(1);
    let chunk_size = chunk_size_for(bandwidth);
    let mut buf = vec![0u8; chunk_size];
    let mut sent: u64 = 0;
    let mut reported_decile = 0;

    while sent < total {
        let to_read = (chunk_size as u64).min(total - sent) as usize;
        let read = source.read(&mut buf[..to_read]).await?;
        if read == 0 {
            break;
        }

        destination.write_all(&buf[..read]).await?;
        sent += read as u64;

        tokio::time::sleep(Duration::from_secs_f64(read as f64 / bandwidth as f64)).await;

        let decile = sent * 10 / total;
        if decile > reported_decile {
            reported_decile = decile;
            tracing::info!("🐢 Relay: {}% uploaded ({}/{} bytes)", decile * 10, sent, total);
        }
    }

    destination.flush().await?;
    if sent < total {
        tracing::warn!("⚠️ Relay: client sent {} of {} announced bytes", sent, total);
    }
    tracing::info!("Relay: upload completed - {} bytes forwarded", sent);
    Ok(sent)
}

/// 讀到上游關閉或單次讀取超過 `idle_timeout` 為止
pub async fn read_response<R>(upstream: &mut R, idle_timeout: Duration) -> Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let mut data = Vec::new();
    let mut buf = [0u8; RESPONSE_READ_SIZE];

    loop {
        match tokio::time::timeout(idle_timeout, upstream.read(&mut buf)).await {
            Ok(Ok(0)) => break,
            Ok(Ok(read)) => data.extend_from_slice(&buf[..read]),
            Ok(Err(e)) if !data.is_empty() => {
                tracing::debug!("Relay: upstream read ended with {} after {} bytes", e, data.len());
                break;
            }
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => {
                tracing::debug!("Relay: upstream idle for {:?}, sending what we have", idle_timeout);
                break;
            }
        }
    }

    Ok(data)
}

pub fn error_response(status: u16, message: &str) -> Vec<u8> {
    let reason = match status {
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        _ => "Error",
    };
    format!(
        "HTTP/1.1 {} {}\r\nContent-Type: text/plain; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        reason,
        message.len(),
        message
    )
    .into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn test_chunk_size_for() {
        assert_eq!(chunk_size_for(1_000 * 1024), 8192);
        assert_eq!(chunk_size_for(4000), 1000);
        assert_eq!(chunk_size_for(2), 1);
        assert_eq!(chunk_size_for(0), 1);
    }

    #[tokio::test]
    async fn test_forward_throttled_copies_exact_bytes() {
        let body: Vec<u8> = (0..50_000u32).map(|i| (i % 251) as u8).collect();
        let mut source: &[u8] = &body;
        let mut destination = Vec::new();

        let sent = forward_throttled(&mut source, &mut destination, body.len() as u64, 10_000_000)
            .await
            .unwrap();

        assert_eq!(sent, body.len() as u64);
        assert_eq!(destination, body);
    }

    #[tokio::test]
    async fn test_forward_throttled_respects_bandwidth() {
        let body = vec![7u8; 4000];
        let mut source: &[u8] = &body;
        let mut destination = Vec::new();

        let started = Instant::now();
        forward_throttled(&mut source, &mut destination, 4000, 8000).await.unwrap();

        // 4000 bytes @ 8000 B/s
        assert!(started.elapsed() >= Duration::from_millis(500));
        assert_eq!(destination.len(), 4000);
    }

    #[tokio::test]
    async fn test_forward_throttled_stops_at_announced_length() {
        let body = b"0123456789extra".to_vec();
        let mut source: &[u8] = &body;
        let mut destination = Vec::new();

        let sent = forward_throttled(&mut source, &mut destination, 10, 1_000_000).await.unwrap();
        assert_eq!(sent, 10);
        assert_eq!(destination, b"0123456789");
    }

    #[tokio::test]
    async fn test_forward_throttled_short_body() {
        let body = b"abc".to_vec();
        let mut source: &[u8] = &body;
        let mut destination = Vec::new();

        let sent = forward_throttled(&mut source, &mut destination, 10, 1_000_000).await.unwrap();
        assert_eq!(sent, 3);
    }

    #[tokio::test]
    async fn test_read_request_head_and_rewrite() {
        let raw = b"POST /api/soundfragments/files/temp HTTP/1.1\r\nHost: 127.0.0.1:8888\r\nConnection: keep-alive\r\nAuthorization: Bearer t\r\nContent-Length: 5\r\n\r\nhello";
        let mut reader = BufReader::new(&raw[..]);

        let head = read_request_head(&mut reader).await.unwrap();
        assert_eq!(head.method, "POST");
        assert_eq!(head.path, "/api/soundfragments/files/temp");
        assert_eq!(head.content_length().unwrap(), Some(5));

        let rewritten = head.upstream_head("backend", 38707);
        assert!(rewritten.starts_with("POST /api/soundfragments/files/temp HTTP/1.1\r\n"));
        assert!(rewritten.contains("Authorization: Bearer t\r\n"));
        assert!(rewritten.contains("Host: backend:38707\r\n"));
        assert!(rewritten.contains("Connection: close\r\n"));
        assert!(!rewritten.contains("127.0.0.1:8888"));
        assert!(!rewritten.contains("keep-alive"));
        assert!(rewritten.ends_with("\r\n\r\n"));

        // 本體仍留在 reader 裡
        let mut body = String::new();
        reader.read_to_string(&mut body).await.unwrap();
        assert_eq!(body, "hello");
    }

    #[tokio::test]
    async fn test_chunked_body_rejected() {
        let raw = b"POST /x HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n";
        let mut reader = BufReader::new(&raw[..]);
        let head = read_request_head(&mut reader).await.unwrap();
        assert!(head.content_length().is_err());
    }

    #[tokio::test]
    async fn test_malformed_request_line() {
        let raw = b"garbage\r\n\r\n";
        let mut reader = BufReader::new(&raw[..]);
        assert!(read_request_head(&mut reader).await.is_err());
    }

    #[tokio::test]
    async fn test_read_response_until_close() {
        let mut upstream: &[u8] = b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nok";
        let data = read_response(&mut upstream, Duration::from_secs(1)).await.unwrap();
        assert_eq!(data, b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nok");
    }

    #[tokio::test]
    async fn test_read_response_idle_timeout() {
        let (mut client, mut server) = tokio::io::duplex(64);
        client.write_all(b"partial").await.unwrap();

        let data = read_response(&mut server, Duration::from_millis(100)).await.unwrap();
        assert_eq!(data, b"partial");
        drop(client);
    }

    #[tokio::test]
    async fn test_read_response_keeps_data_before_reset() {
        let mut upstream = tokio_test::io::Builder::new()
            .read(b"HTTP/1.1 200 OK\r\n")
            .read(b"\r\ndone")
            .read_error(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset"))
            .build();

        let data = read_response(&mut upstream, Duration::from_secs(1)).await.unwrap();
        assert_eq!(data, b"HTTP/1.1 200 OK\r\n\r\ndone");
    }

    #[tokio::test]
    async fn test_read_response_reset_without_data_is_error() {
        let mut upstream = tokio_test::io::Builder::new()
            .read_error(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset"))
            .build();

        assert!(read_response(&mut upstream, Duration::from_secs(1)).await.is_err());
    }

    #[test]
    fn test_error_response_format() {
        let response = String::from_utf8(error_response(500, "No response from server")).unwrap();
        assert!(response.starts_with("HTTP/1.1 500 Internal Server Error\r\n"));
        assert!(response.contains("Content-Length: 23\r\n"));
        assert!(response.ends_with("No response from server"));
    }

    #[test]
    fn test_config_for_upstream() {
        let settings = RelaySettings {
            bandwidth_kbps: 1000,
            ..Default::default()
        };
        let config = RelayConfig::for_upstream("http://localhost:38707", &settings).unwrap();
        assert_eq!(config.target_host, "localhost");
        assert_eq!(config.target_port, 38707);
        assert_eq!(config.bandwidth, 1000 * 1024);
        assert_eq!(config.listen_addr.port(), 8888);
        assert_eq!(config.chunk_size(), 8192);

        let config = RelayConfig::for_upstream("http://example.com", &settings).unwrap();
        assert_eq!(config.target_port, 80);

        assert!(RelayConfig::for_upstream("https://example.com", &settings).is_err());
    }
}
