//! Shared utilities for integration testing.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

use cluster_client_ip::config::ServerConfig;
use cluster_client_ip::http::HttpServer;
use cluster_client_ip::lifecycle::Shutdown;

/// A running server plus the handles to control it.
pub struct TestServer {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub config_tx: mpsc::UnboundedSender<ServerConfig>,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Configuration trusting the given load balancer literals.
pub fn real_ip_config(enabled: bool, load_balancers: &[&str]) -> ServerConfig {
    let mut config = ServerConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.real_ip.enabled = enabled;
    config.real_ip.load_balancer_ips = load_balancers.iter().map(|s| s.to_string()).collect();
    config
}

/// Start a server on an ephemeral loopback port.
pub async fn start_server(config: ServerConfig) -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let (config_tx, config_updates) = mpsc::unbounded_channel();
    let server = HttpServer::new(config).unwrap();
    let server_shutdown = shutdown.subscribe();

    tokio::spawn(async move {
        let _ = server.run(listener, config_updates, server_shutdown).await;
    });

    TestServer {
        addr,
        shutdown,
        config_tx,
    }
}

/// Non-pooled client so every request opens its own connection.
#[allow(dead_code)]
pub fn fresh_client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}

/// GET `/` on a new connection and decode the client report.
#[allow(dead_code)]
pub async fn get_report(server: &TestServer, header: Option<&str>) -> serde_json::Value {
    let mut request = fresh_client().get(format!("http://{}/", server.addr));
    if let Some(value) = header {
        request = request.header("X-Cluster-Client-Ip", value);
    }
    let response = request.send().await.expect("server unreachable");
    assert_eq!(response.status(), 200);
    response.json().await.unwrap()
}

/// Minimal HTTP/1.1 client that keeps one TCP connection open.
#[allow(dead_code)]
pub struct KeepAliveClient {
    stream: BufReader<TcpStream>,
    host: SocketAddr,
}

#[allow(dead_code)]
impl KeepAliveClient {
    pub async fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).await.unwrap();
        Self {
            stream: BufReader::new(stream),
            host: addr,
        }
    }

    /// Send a GET and decode the JSON body of the response.
    pub async fn get(&mut self, path: &str, header: Option<&str>) -> serde_json::Value {
        let mut request = format!("GET {} HTTP/1.1\r\nHost: {}\r\n", path, self.host);
        if let Some(value) = header {
            request.push_str(&format!("X-Cluster-Client-Ip: {}\r\n", value));
        }
        request.push_str("\r\n");
        self.stream.get_mut().write_all(request.as_bytes()).await.unwrap();

        let body = tokio::time::timeout(Duration::from_secs(5), self.read_response())
            .await
            .expect("response timed out");
        serde_json::from_slice(&body).unwrap()
    }

    async fn read_response(&mut self) -> Vec<u8> {
        let mut status = String::new();
        self.stream.read_line(&mut status).await.unwrap();
        assert!(status.starts_with("HTTP/1.1 200"), "unexpected status: {status}");

        let mut content_length = None;
        let mut chunked = false;
        loop {
            let mut line = String::new();
            self.stream.read_line(&mut line).await.unwrap();
            let line = line.trim_end();
            if line.is_empty() {
                break;
            }
            if let Some((name, value)) = line.split_once(':') {
                let value = value.trim();
                if name.eq_ignore_ascii_case("content-length") {
                    content_length = Some(value.parse::<usize>().unwrap());
                } else if name.eq_ignore_ascii_case("transfer-encoding") {
                    chunked = value.eq_ignore_ascii_case("chunked");
                }
            }
        }

        if chunked {
            return self.read_chunked().await;
        }

        let mut body = vec![0; content_length.expect("no content-length")];
        self.stream.read_exact(&mut body).await.unwrap();
        body
    }

    async fn read_chunked(&mut self) -> Vec<u8> {
        let mut body = Vec::new();
        loop {
            let mut size = String::new();
            self.stream.read_line(&mut size).await.unwrap();
            let size = usize::from_str_radix(size.trim(), 16).unwrap();

            let mut chunk = vec![0; size + 2];
            self.stream.read_exact(&mut chunk).await.unwrap();
            if size == 0 {
                return body;
            }
            body.extend_from_slice(&chunk[..size]);
        }
    }
}
