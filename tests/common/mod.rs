//! Shared helpers for wire-level integration tests: real servers on
//! ephemeral ports and a small RESP test client.

// Each integration test binary compiles this module separately and uses a
// different subset of it.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use coralkv::config::{ServerConfig, ServerRole};
use coralkv::resp::RespValue;
use coralkv::server::Server;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

pub async fn spawn_server(config: ServerConfig) -> SocketAddr {
    let server = Server::bind(config).await.expect("server should bind");
    let address = server.local_addr().expect("listener should have an address");
    tokio::spawn(server.run());
    address
}

pub async fn spawn_leader() -> SocketAddr {
    spawn_server(ServerConfig {
        port: 0,
        ..ServerConfig::default()
    })
    .await
}

pub async fn spawn_follower(leader: SocketAddr) -> SocketAddr {
    spawn_server(ServerConfig {
        port: 0,
        role: ServerRole::Follower {
            host: "127.0.0.1".to_string(),
            port: leader.port(),
        },
        ..ServerConfig::default()
    })
    .await
}

pub struct TestClient {
    stream: TcpStream,
}

impl TestClient {
    pub async fn connect(address: SocketAddr) -> Self {
        let stream = TcpStream::connect(address)
            .await
            .expect("client should connect");
        Self { stream }
    }

    pub async fn send(&mut self, parts: &[&str]) {
        let frame = RespValue::command(parts).encode();
        self.stream
            .write_all(frame.as_bytes())
            .await
            .expect("client write should succeed");
    }

    /// Reads exactly `expected.len()` bytes and asserts they match.
    pub async fn expect(&mut self, expected: &str) {
        let mut received = vec![0u8; expected.len()];
        timeout(Duration::from_secs(2), self.stream.read_exact(&mut received))
            .await
            .unwrap_or_else(|_| panic!("timed out waiting for {:?}", expected))
            .expect("client read should succeed");

        assert_eq!(
            String::from_utf8_lossy(&received),
            expected,
            "unexpected reply bytes"
        );
    }

    /// Reads whatever arrives within the window, as a lossy string. Useful
    /// for replies whose exact length is not known up front.
    pub async fn read_some(&mut self) -> String {
        let mut chunk = [0u8; 2048];
        match timeout(Duration::from_millis(500), self.stream.read(&mut chunk)).await {
            Ok(Ok(read)) => String::from_utf8_lossy(&chunk[..read]).to_string(),
            _ => String::new(),
        }
    }

    /// Sends a command and returns one reply chunk.
    pub async fn round_trip(&mut self, parts: &[&str]) -> String {
        self.send(parts).await;
        self.read_some().await
    }
}

/// Polls `INFO replication` until the reply contains `needle`, or panics
/// after ~2 seconds.
pub async fn wait_for_info(address: SocketAddr, needle: &str) {
    for _ in 0..40 {
        let mut client = TestClient::connect(address).await;
        let reply = client.round_trip(&["INFO", "replication"]).await;
        if reply.contains(needle) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("INFO never reported {:?}", needle);
}
