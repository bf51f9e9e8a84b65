//! Framing behaviour over real async I/O.

use conn_handler::net::{FramedReader, FramedWriter, ReceiveBuffer, DELIMITER};
use conn_handler::ConnectionError;
use tokio::io::{duplex, AsyncWriteExt};

#[tokio::test]
async fn writer_output_is_payload_then_delimiter() {
    let (client, server) = duplex(1024);
    let mut writer = FramedWriter::new(client);
    let mut reader = FramedReader::new(server, 16);

    let written = writer.write(b"login alice").await.unwrap();
    assert_eq!(written, b"login alice".len() + DELIMITER.len());

    reader.read_until_delimiter().await.unwrap();
    assert_eq!(reader.buffer().as_slice(), b"login alice\r\n\r\n");
    assert_eq!(reader.extract_message().unwrap(), b"login alice");
    assert!(reader.buffer().is_empty());
}

#[tokio::test]
async fn split_position_does_not_change_the_message() {
    let wire = b"payload-with-some-length\r\n\r\n";
    // Every cut, including the ones inside the delimiter.
    for cut in 1..wire.len() {
        let (mut peer, local) = duplex(1024);
        let mut reader = FramedReader::new(local, 4);

        peer.write_all(&wire[..cut]).await.unwrap();
        let pending = tokio::spawn(async move {
            reader.read_until_delimiter().await.map(|_| reader)
        });
        tokio::task::yield_now().await;
        peer.write_all(&wire[cut..]).await.unwrap();

        let mut reader = pending.await.unwrap().unwrap();
        assert_eq!(
            reader.extract_message().unwrap(),
            b"payload-with-some-length",
            "cut at {cut}"
        );
    }
}

#[tokio::test]
async fn trailing_bytes_survive_extraction() {
    let (mut peer, local) = duplex(1024);
    let mut reader = FramedReader::new(local, 1024);

    peer.write_all(b"first\r\n\r\nsecond\r\n\r\nthi").await.unwrap();
    reader.read_until_delimiter().await.unwrap();
    assert_eq!(reader.extract_message().unwrap(), b"first");

    // Second message is already buffered: no transport read needed.
    assert_eq!(reader.read_until_delimiter().await.unwrap(), 0);
    assert_eq!(reader.extract_message().unwrap(), b"second");
    assert_eq!(reader.buffer().as_slice(), b"thi");

    peer.write_all(b"rd\r\n\r\n").await.unwrap();
    reader.read_until_delimiter().await.unwrap();
    assert_eq!(reader.extract_message().unwrap(), b"third");
}

#[tokio::test]
async fn eof_before_delimiter_is_a_disconnect() {
    let (mut peer, local) = duplex(1024);
    let mut reader = FramedReader::new(local, 1024);

    peer.write_all(b"half a mess").await.unwrap();
    drop(peer);

    let err = reader.read_until_delimiter().await.unwrap_err();
    assert!(err.is_disconnect());
    assert_eq!(reader.buffer().as_slice(), b"half a mess");
}

#[test]
fn extract_without_delimiter_is_framing_error() {
    let mut buffer = ReceiveBuffer::new();
    buffer.extend(b"no delimiter\r\n");
    assert!(matches!(buffer.extract_message(), Err(ConnectionError::Framing)));
    assert_eq!(buffer.len(), b"no delimiter\r\n".len());
}

#[test]
fn empty_payload_frames_to_bare_delimiter() {
    let mut buffer = ReceiveBuffer::new();
    buffer.extend(DELIMITER);
    assert_eq!(buffer.extract_message().unwrap(), b"");
    assert!(buffer.is_empty());
}
