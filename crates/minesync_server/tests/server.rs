//! End-to-end tests for the reference server over TCP.

use minesync_protocol::{Message, SaveManifest, SyncEnvelope};
use minesync_server::{ServerConfig, SyncServer};
use std::net::{SocketAddr, TcpStream};
use std::thread;
use std::time::Duration;
use tempfile::TempDir;

fn fetch_manifest(addr: SocketAddr) -> SaveManifest {
    let mut conn = TcpStream::connect(addr).unwrap();
    SaveManifest::read_from(&mut conn).unwrap()
}

fn wait_for_manifest(addr: SocketAddr, count: usize) -> SaveManifest {
    for _ in 0..200 {
        let manifest = fetch_manifest(addr);
        if manifest.len() >= count {
            return manifest;
        }
        thread::sleep(Duration::from_millis(10));
    }
    panic!("manifest never listed {count} saves");
}

#[test]
fn directory_store_persists_across_restarts() {
    let storage = TempDir::new().unwrap();
    let config = ServerConfig::ephemeral().with_storage(storage.path());

    {
        let handle = SyncServer::new(config.clone()).unwrap().start().unwrap();
        let mut upload = TcpStream::connect(handle.upload_addr()).unwrap();
        SyncEnvelope::new("minesync_World_1.zip", b"archive bytes".to_vec())
            .write_to(&mut upload)
            .unwrap();
        drop(upload);
        wait_for_manifest(handle.manifest_addr(), 1);
        handle.shutdown();
    }

    let handle = SyncServer::new(config).unwrap().start().unwrap();
    let manifest = fetch_manifest(handle.manifest_addr());
    assert_eq!(manifest.saves.len(), 1);
    assert_eq!(manifest.saves[0].name, "minesync_World_1.zip");

    let mut download = TcpStream::connect(handle.download_addr()).unwrap();
    SyncEnvelope::request("minesync_World_1.zip")
        .write_to(&mut download)
        .unwrap();
    let response = SyncEnvelope::read_from(&mut download).unwrap();
    assert_eq!(response.data, b"archive bytes");
}

#[test]
fn bad_upload_does_not_stop_the_endpoint() {
    let handle = SyncServer::new(ServerConfig::ephemeral())
        .unwrap()
        .start()
        .unwrap();

    let mut garbage = TcpStream::connect(handle.upload_addr()).unwrap();
    std::io::Write::write_all(&mut garbage, &[0xff, 0x00, 0x13]).unwrap();
    drop(garbage);

    let mut upload = TcpStream::connect(handle.upload_addr()).unwrap();
    SyncEnvelope::new("minesync_Ok.zip", vec![1])
        .write_to(&mut upload)
        .unwrap();
    drop(upload);

    let manifest = wait_for_manifest(handle.manifest_addr(), 1);
    assert_eq!(manifest.saves[0].name, "minesync_Ok.zip");
}
