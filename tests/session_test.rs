//! End-to-end sessions against a fake easyq server on a real socket.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use fota::delivery::{run_session, ChunkSize, NoProgress, PacingPolicy, QueueName, SessionOptions};
use fota::transport::{connect, Address};
use fota::FotaError;
use proptest::prelude::*;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

const BANNER: &[u8] = b"0123456789abcdefghij";

/// Accept one client, answer LOGIN, return everything it sent afterwards.
async fn fake_server(banner: &'static [u8]) -> (Address, JoinHandle<Vec<u8>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let handle = tokio::spawn(async move {
        let (mut sock, _) = listener.accept().await.unwrap();
        let mut login = [0u8; 12];
        sock.read_exact(&mut login).await.unwrap();
        assert_eq!(&login, b"LOGIN fota;\n");
        sock.write_all(banner).await.unwrap();
        if banner.len() < 20 {
            sock.shutdown().await.unwrap();
        }
        let mut rest = Vec::new();
        let _ = sock.read_to_end(&mut rest).await;
        rest
    });
    let addr = Address {
        host: "127.0.0.1".to_string(),
        port,
    };
    (addr, handle)
}

fn commands(raw: &[u8]) -> Vec<String> {
    String::from_utf8(raw.to_vec())
        .unwrap()
        .split_inclusive(";\n")
        .map(str::to_string)
        .collect()
}

/// Decode every PUSH D command back to its raw chunk.
fn data_chunks(cmds: &[String], queue: &str) -> Vec<Vec<u8>> {
    let suffix = format!(" INTO {};\n", queue);
    cmds.iter()
        .filter_map(|c| c.strip_prefix("PUSH D"))
        .map(|c| {
            let b64: String = c
                .strip_suffix(suffix.as_str())
                .unwrap()
                .chars()
                .filter(|&ch| ch != '\n')
                .collect();
            let decoded = STANDARD.decode(b64).unwrap();
            let len = u16::from_le_bytes([decoded[0], decoded[1]]) as usize;
            assert_eq!(len, decoded.len() - 2);
            decoded[2..].to_vec()
        })
        .collect()
}

fn options(chunk_size: usize) -> SessionOptions {
    SessionOptions {
        chunk_size: ChunkSize::new(chunk_size).unwrap(),
        pacing: PacingPolicy::none(),
        ..SessionOptions::default()
    }
}

#[tokio::test]
async fn test_firmware_delivered_over_tcp() {
    let (addr, server) = fake_server(BANNER).await;
    let firmware: Vec<u8> = (0..5000u32).map(|i| (i * 7 % 251) as u8).collect();

    let conn = connect(&addr, Some(Duration::from_secs(5))).await.unwrap();
    let report = run_session(
        firmware.as_slice(),
        QueueName::new("esp8266").unwrap(),
        conn,
        &options(512),
        &mut NoProgress,
        &CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(report.bytes_sent, 5000);
    assert_eq!(report.chunks_sent, 10);
    assert_eq!(report.banner.as_ref(), BANNER);

    let cmds = commands(&server.await.unwrap());
    assert_eq!(cmds.first().unwrap(), "PUSH S INTO esp8266;\n");
    assert_eq!(cmds.last().unwrap(), "PUSH F INTO esp8266;\n");

    let chunks = data_chunks(&cmds, "esp8266");
    assert_eq!(chunks.len(), 10);
    assert_eq!(chunks.last().unwrap().len(), 5000 - 9 * 512);
    assert_eq!(chunks.concat(), firmware);
}

#[tokio::test]
async fn test_server_closing_before_banner() {
    let (addr, server) = fake_server(b"EASYQ").await;
    let conn = connect(&addr, None).await.unwrap();

    let err = run_session(
        &b"firmware"[..],
        QueueName::new("esp").unwrap(),
        conn,
        &options(512),
        &mut NoProgress,
        &CancellationToken::new(),
    )
    .await
    .unwrap_err();

    assert!(matches!(err.error, FotaError::Protocol { received: 5, .. }));
    assert!(server.await.unwrap().is_empty());
}

fn run_in_memory(input: Vec<u8>, chunk_size: usize) -> (u64, Vec<String>) {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    rt.block_on(async move {
        let (client, mut server) = tokio::io::duplex(1 << 20);
        let peer = tokio::spawn(async move {
            let mut login = [0u8; 12];
            server.read_exact(&mut login).await.unwrap();
            server.write_all(BANNER).await.unwrap();
            let mut rest = Vec::new();
            server.read_to_end(&mut rest).await.unwrap();
            rest
        });
        let report = run_session(
            input.as_slice(),
            QueueName::new("q").unwrap(),
            client,
            &options(chunk_size),
            &mut NoProgress,
            &CancellationToken::new(),
        )
        .await
        .unwrap();
        (report.bytes_sent, commands(&peer.await.unwrap()))
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_chunks_cover_input_in_order(
        input in proptest::collection::vec(any::<u8>(), 0..4096),
        chunk_size in 1usize..700,
    ) {
        let (bytes_sent, cmds) = run_in_memory(input.clone(), chunk_size);
        prop_assert_eq!(bytes_sent, input.len() as u64);

        prop_assert_eq!(cmds.first().map(String::as_str), Some("PUSH S INTO q;\n"));
        prop_assert_eq!(cmds.last().map(String::as_str), Some("PUSH F INTO q;\n"));

        let chunks = data_chunks(&cmds, "q");
        prop_assert_eq!(chunks.len(), input.len().div_ceil(chunk_size));
        prop_assert_eq!(cmds.len(), chunks.len() + 2);
        if let Some(last) = chunks.last() {
            let tail = input.len() % chunk_size;
            prop_assert_eq!(last.len(), if tail == 0 { chunk_size } else { tail });
        }
        prop_assert_eq!(chunks.concat(), input);
    }
}
