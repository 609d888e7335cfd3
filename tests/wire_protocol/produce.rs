//! Producer connections end to end

use byteorder::{BigEndian, ByteOrder};
use std::sync::Arc;
use tempfile::TempDir;
use tidelog::storage::{NoopDispatcher, SegmentReader, SegmentWriter, StorageConfig};
use tidelog::wire::{
    serve_connection, write_header, BinaryHeader, Flags, Opcode, ProduceRequest,
    ProducerHandler, ProtocolError, WireConfig, HEADER_SIZE,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
use tokio::task::JoinHandle;

struct Broker {
    _dir: TempDir,
    reader: SegmentReader,
    handler: ProducerHandler,
}

fn broker(wire: WireConfig) -> Broker {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let dir = tempfile::tempdir().unwrap();
    let config = StorageConfig::for_testing();
    let writer =
        SegmentWriter::open(dir.path().to_path_buf(), config.clone(), Arc::new(NoopDispatcher))
            .unwrap();
    let reader = SegmentReader::spawn(dir.path().to_path_buf(), writer.tail(), config).unwrap();
    Broker {
        _dir: dir,
        reader,
        handler: ProducerHandler::new(writer, wire),
    }
}

fn connect(broker: &Broker) -> (DuplexStream, JoinHandle<Result<(), ProtocolError>>) {
    let (client, server) = tokio::io::duplex(64 * 1024);
    let handler = broker.handler.clone();
    let task = tokio::spawn(async move { serve_connection(server, &handler).await });
    (client, task)
}

async fn read_response(client: &mut DuplexStream) -> (BinaryHeader, Vec<u8>) {
    let mut header = [0u8; HEADER_SIZE];
    client.read_exact(&mut header).await.unwrap();
    let header = BinaryHeader::decode(&header).unwrap();
    let mut body = vec![0u8; header.body_length as usize];
    client.read_exact(&mut body).await.unwrap();
    (header, body)
}

/// Split a chunk body back into its length-prefixed messages.
fn messages(mut body: &[u8]) -> Vec<Vec<u8>> {
    let mut out = Vec::new();
    while !body.is_empty() {
        let len = BigEndian::read_u32(&body[..4]) as usize;
        out.push(body[4..4 + len].to_vec());
        body = &body[4 + len..];
    }
    out
}

#[tokio::test]
async fn produced_messages_are_readable() {
    let broker = broker(WireConfig::for_testing());
    let (mut client, task) = connect(&broker);

    let mut out = Vec::new();
    write_header(
        &mut out,
        &BinaryHeader::new(1, Opcode::Startup, Flags::empty(), 0),
    );
    ProduceRequest::from_messages(Some(1_700_000_000_000), &["alpha", "beta"]).marshal(2, &mut out);
    ProduceRequest::from_messages(None, &["gamma"]).marshal(3, &mut out);
    client.write_all(&out).await.unwrap();

    let expected = [(1, Opcode::Ready), (2, Opcode::ProduceResponse), (3, Opcode::ProduceResponse)];
    for (stream_id, opcode) in expected {
        let (header, body) = read_response(&mut client).await;
        assert_eq!(header.stream_id, stream_id);
        assert_eq!(header.op().unwrap(), opcode);
        assert!(body.is_empty());
    }

    let first = broker.reader.read(0, 1).await.unwrap();
    assert_eq!(first.start_offset(), 0);
    assert_eq!(first.record_length(), 2);
    assert_eq!(messages(first.data_block()), vec![b"alpha".to_vec(), b"beta".to_vec()]);

    let second = broker.reader.read(0, 2).await.unwrap();
    assert_eq!(messages(second.data_block()), vec![b"gamma".to_vec()]);
    assert!(broker.reader.read(0, 3).await.unwrap().is_empty());

    drop(client);
    task.await.unwrap().unwrap();
}

#[tokio::test]
async fn concurrent_connections_share_the_log() {
    let broker = broker(WireConfig::for_testing());

    let mut clients = Vec::new();
    for conn in 0..4u16 {
        let (mut client, task) = connect(&broker);
        clients.push(tokio::spawn(async move {
            for seq in 0..10u16 {
                let mut out = Vec::new();
                ProduceRequest::from_messages(None, &[format!("{}-{}", conn, seq)])
                    .marshal(seq, &mut out);
                client.write_all(&out).await.unwrap();
                let (header, _) = read_response(&mut client).await;
                assert_eq!(header.stream_id, seq);
                assert_eq!(header.op().unwrap(), Opcode::ProduceResponse);
            }
            drop(client);
            task.await.unwrap().unwrap();
        }));
    }
    for client in clients {
        client.await.unwrap();
    }

    let mut seen = Vec::new();
    for offset in 0..40 {
        let chunk = broker.reader.read(0, offset).await.unwrap();
        seen.extend(messages(chunk.data_block()));
    }
    seen.sort();
    seen.dedup();
    assert_eq!(seen.len(), 40);
}

#[tokio::test]
async fn malformed_produce_keeps_connection_open() {
    let broker = broker(WireConfig::for_testing());
    let (mut client, task) = connect(&broker);

    let mut out = Vec::new();
    write_header(
        &mut out,
        &BinaryHeader::new(9, Opcode::Produce, Flags::empty(), 3),
    );
    out.extend_from_slice(&[0, 0, 1]);
    ProduceRequest::from_messages(None, &["ok"]).marshal(10, &mut out);
    client.write_all(&out).await.unwrap();

    let (header, body) = read_response(&mut client).await;
    assert_eq!((header.stream_id, header.op().unwrap()), (9, Opcode::Error));
    assert!(!body.is_empty());
    let (header, _) = read_response(&mut client).await;
    assert_eq!((header.stream_id, header.op().unwrap()), (10, Opcode::ProduceResponse));

    drop(client);
    task.await.unwrap().unwrap();
}

#[tokio::test]
async fn oversized_body_closes_connection() {
    let broker = broker(WireConfig::for_testing().with_max_body_length(16));
    let (mut client, task) = connect(&broker);

    let mut out = Vec::new();
    ProduceRequest::from_messages(None, &["this message is longer than sixteen bytes"])
        .marshal(4, &mut out);
    client.write_all(&out).await.unwrap();

    let (header, body) = read_response(&mut client).await;
    assert_eq!((header.stream_id, header.op().unwrap()), (4, Opcode::Error));
    assert!(String::from_utf8(body).unwrap().contains("exceeds"));
    assert!(matches!(
        task.await.unwrap(),
        Err(ProtocolError::BodyTooLarge { max: 16, .. })
    ));
    assert!(broker.reader.read(0, 0).await.unwrap().is_empty());
}
