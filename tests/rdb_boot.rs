//! Booting a leader from an RDB snapshot on disk.

mod common;

use common::{spawn_server, TestClient};
use coralkv::config::ServerConfig;

/// Builds a minimal snapshot: header, records, EOF marker, zeroed checksum.
fn snapshot_bytes(records: &[Vec<u8>]) -> Vec<u8> {
    let mut bytes = b"REDIS0011".to_vec();
    for record in records {
        bytes.extend_from_slice(record);
    }
    bytes.push(0xFF);
    bytes.extend_from_slice(&[0u8; 8]);
    bytes
}

fn string_record(key: &str, value: &str) -> Vec<u8> {
    let mut record = vec![0x00, key.len() as u8];
    record.extend_from_slice(key.as_bytes());
    record.push(value.len() as u8);
    record.extend_from_slice(value.as_bytes());
    record
}

fn expiring_record(key: &str, value: &str, at_unix_ms: u64) -> Vec<u8> {
    let mut record = vec![0xFC];
    record.extend_from_slice(&at_unix_ms.to_le_bytes());
    record.extend_from_slice(&string_record(key, value));
    record
}

async fn write_snapshot(name: &str, bytes: &[u8]) -> (String, String) {
    let dir = std::env::temp_dir();
    let filename = format!("coralkv-{}-{}.rdb", name, std::process::id());
    tokio::fs::write(dir.join(&filename), bytes)
        .await
        .expect("snapshot file should be writable");
    (dir.to_string_lossy().to_string(), filename)
}

#[tokio::test]
async fn test_boot_restores_keys_and_expiry() {
    let far_future_ms: u64 = 4_102_444_800_000; // 2100-01-01
    let long_past_ms: u64 = 946_684_800_000; // 2000-01-01

    let bytes = snapshot_bytes(&[
        vec![0xFE, 0x00],
        vec![0xFB, 0x03, 0x01],
        string_record("mango", "pineapple"),
        expiring_record("kept", "fresh", far_future_ms),
        expiring_record("gone", "stale", long_past_ms),
    ]);
    let (dir, dbfilename) = write_snapshot("boot", &bytes).await;

    let address = spawn_server(ServerConfig {
        port: 0,
        dir,
        dbfilename,
        ..ServerConfig::default()
    })
    .await;
    let mut client = TestClient::connect(address).await;

    client.send(&["GET", "mango"]).await;
    client.expect("$9\r\npineapple\r\n").await;

    client.send(&["GET", "kept"]).await;
    client.expect("$5\r\nfresh\r\n").await;
    client.send(&["TYPE", "kept"]).await;
    client.expect("+string\r\n").await;

    // Expired in the snapshot: reaped on first observation.
    client.send(&["GET", "gone"]).await;
    client.expect("$-1\r\n").await;
    client.send(&["TYPE", "gone"]).await;
    client.expect("+none\r\n").await;
}

#[tokio::test]
async fn test_boot_with_missing_snapshot_is_empty() {
    let address = spawn_server(ServerConfig {
        port: 0,
        dir: std::env::temp_dir().to_string_lossy().to_string(),
        dbfilename: format!("coralkv-definitely-missing-{}.rdb", std::process::id()),
        ..ServerConfig::default()
    })
    .await;
    let mut client = TestClient::connect(address).await;

    client.send(&["KEYS", "*"]).await;
    client.expect("*0\r\n").await;
}

#[tokio::test]
async fn test_boot_keys_listing() {
    let bytes = snapshot_bytes(&[
        string_record("one", "1"),
        string_record("two", "2"),
    ]);
    let (dir, dbfilename) = write_snapshot("keys", &bytes).await;

    let address = spawn_server(ServerConfig {
        port: 0,
        dir,
        dbfilename,
        ..ServerConfig::default()
    })
    .await;
    let mut client = TestClient::connect(address).await;

    let reply = client.round_trip(&["KEYS", "*"]).await;
    assert!(reply.starts_with("*2\r\n"), "reply: {:?}", reply);
    assert!(reply.contains("$3\r\none\r\n"));
    assert!(reply.contains("$3\r\ntwo\r\n"));
}
