//! Stateful per-connection protocol adapter.
//!
//! One adapter sits between a connected byte stream and a state machine
//! (server or client). It owns the frame codec, the cipher session, the
//! payload reassembler and the typed send/validate operations for every
//! handshake and sharing frame. Reading yields [`Inbound`] events; the
//! state machine dispatches them.

mod frames;
mod handshake;
mod inbound;
mod outbound;
mod service;

use std::collections::HashMap;
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite};

pub use frames::{ConnRequest, IntroducedText, Introduction};
pub use inbound::{FileChunk, Inbound};

use crate::cipher::Cipher;
use crate::error::Result;
use crate::random::Random;

/// Upper bound for a single framed message and for a reassembled BYTES
/// payload.
pub const MAX_MESSAGE_LENGTH: usize = 5 * 1024 * 1024;

/// Fragment size for outgoing payload chunks.
pub(crate) const CHUNK_SIZE: usize = 512 * 1024;

pub struct Adapter<S> {
    stream: S,
    cipher: Cipher,
    random: Arc<dyn Random>,

    seq_number: i32,
    recv_seq_number: i32,
    is_encrypted: bool,
    is_transfer: bool,

    // BYTES reassembly buffer and per-file next expected offsets.
    bytes_buf: Vec<u8>,
    file_offsets: HashMap<i64, i64>,
}

impl<S> Adapter<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    pub fn new(stream: S, is_server: bool, random: Arc<dyn Random>) -> Self {
        Self {
            stream,
            cipher: Cipher::new(is_server),
            random,
            seq_number: 0,
            recv_seq_number: 0,
            is_encrypted: false,
            is_transfer: false,
            bytes_buf: Vec::new(),
            file_offsets: HashMap::new(),
        }
    }

    /// Finalizes the cipher session; every subsequent read decrypts and
    /// every write encrypts.
    pub fn enable_encryption(&mut self) -> Result<()> {
        self.cipher.setup()?;
        self.is_encrypted = true;
        Ok(())
    }

    /// Switches completed BYTES payloads from plain messages to filtered
    /// text events.
    pub fn enable_transfer_handler(&mut self) {
        self.is_transfer = true;
    }

    pub fn pin(&self) -> u16 {
        self.cipher.pin()
    }

    /// Sends a DISCONNECTION frame on whichever channel is active. Write
    /// failures are only logged; the connection is going away regardless.
    pub async fn disconnect(&mut self) {
        use nearshare_proto::connections::{v1_frame::FrameType, DisconnectionFrame, V1Frame};

        let frame = V1Frame {
            r#type: Some(FrameType::Disconnection as i32),
            disconnection: Some(DisconnectionFrame::default()),
            ..Default::default()
        };

        let res = if self.is_encrypted {
            self.encrypt_and_write(&frame).await
        } else {
            self.write_offline_frame(&frame).await
        };
        if let Err(err) = res {
            tracing::error!(%err, "error while disconnecting");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::payload::{FileMeta, FileType, DeviceType, TextMeta, TextType};
    use crate::random::StaticRandom;
    use nearshare_proto::connections::payload_transfer_frame::payload_header::PayloadType;
    use prost::Message as _;
    use tokio::io::{duplex, AsyncWriteExt, DuplexStream};

    fn pair() -> (Adapter<DuplexStream>, Adapter<DuplexStream>) {
        let (client_end, server_end) = duplex(MAX_MESSAGE_LENGTH * 4);
        let client = Adapter::new(client_end, false, Arc::new(StaticRandom::new(1)));
        let server = Adapter::new(server_end, true, Arc::new(StaticRandom::new(2)));
        (client, server)
    }

    async fn read_plain(adapter: &mut Adapter<DuplexStream>) -> Vec<u8> {
        match adapter.read_message().await.unwrap() {
            Inbound::Message(msg) => msg,
            other => panic!("expected message, got {other:?}"),
        }
    }

    /// Runs the full init phase over a loopback pipe and enables
    /// encryption on both sides.
    async fn encrypted_pair() -> (Adapter<DuplexStream>, Adapter<DuplexStream>) {
        let (mut client, mut server) = pair();

        client
            .send_conn_request("test", "unit-host", DeviceType::Laptop)
            .await
            .unwrap();
        let msg = read_plain(&mut server).await;
        server.unmarshal_conn_request(&msg).unwrap();

        client.send_client_init_with_client_finished().await.unwrap();
        let msg = read_plain(&mut server).await;
        server.validate_client_init(&msg).unwrap();
        server.send_server_init().await.unwrap();
        let msg = read_plain(&mut server).await;
        server.validate_client_finished(&msg).unwrap();

        let msg = read_plain(&mut client).await;
        client.validate_server_init(&msg).unwrap();

        client.send_conn_response(true).await.unwrap();
        let msg = read_plain(&mut server).await;
        assert!(server.unmarshal_conn_response(&msg).unwrap());
        server.send_conn_response(true).await.unwrap();
        let msg = read_plain(&mut client).await;
        assert!(client.unmarshal_conn_response(&msg).unwrap());

        client.enable_encryption().unwrap();
        server.enable_encryption().unwrap();
        (client, server)
    }

    #[tokio::test]
    async fn framing_round_trip() {
        let (mut client, mut server) = pair();
        client
            .send_conn_request("abcd", "round-trip", DeviceType::Phone)
            .await
            .unwrap();

        let msg = read_plain(&mut server).await;
        let request = server.unmarshal_conn_request(&msg).unwrap();
        let info = crate::endpoint::EndpointInfo::decode(&request.endpoint_info).unwrap();
        assert_eq!(info.hostname, "round-trip");
        assert_eq!(info.device, DeviceType::Phone);
    }

    #[tokio::test]
    async fn oversized_frame_is_rejected() {
        let (mut client_end, server_end) = duplex(64);
        let mut server = Adapter::new(server_end, true, Arc::new(StaticRandom::new(1)));

        // 6 MiB + 1 announced; the body never needs to arrive.
        client_end.write_all(&[0x00, 0x60, 0x00, 0x01]).await.unwrap();
        client_end.write_all(&[0xAA]).await.unwrap();

        assert!(matches!(
            server.read_message().await,
            Err(Error::MessageTooLong)
        ));
    }

    #[tokio::test]
    async fn peer_hangup_is_conn_ended() {
        let (client_end, server_end) = duplex(64);
        let mut server = Adapter::new(server_end, true, Arc::new(StaticRandom::new(1)));
        drop(client_end);

        assert!(matches!(
            server.read_message().await,
            Err(Error::ConnEndedByPeer)
        ));
    }

    #[tokio::test]
    async fn handshake_derives_matching_pins() {
        let (client, server) = encrypted_pair().await;
        assert_ne!(client.pin(), 0);
        assert_eq!(client.pin(), server.pin());
    }

    #[tokio::test]
    async fn bytes_payload_reassembles_across_chunks() {
        let (mut client, mut server) = encrypted_pair().await;

        client.send_data_in_chunks(7, b"Hello World!").await.unwrap();

        assert!(matches!(
            server.read_message().await.unwrap(),
            Inbound::TransferInProgress
        ));
        let msg = read_plain(&mut server).await;
        assert_eq!(msg, b"Hello World!");
    }

    #[tokio::test]
    async fn transfer_handler_filters_text() {
        let (mut client, mut server) = encrypted_pair().await;
        server.enable_transfer_handler();

        client
            .send_data_in_chunks(7, b"keep\tme\nplease\x07\x00")
            .await
            .unwrap();

        assert!(matches!(
            server.read_message().await.unwrap(),
            Inbound::TransferInProgress
        ));
        match server.read_message().await.unwrap() {
            Inbound::Text(text) => assert_eq!(text, "keep\tme\nplease"),
            other => panic!("expected text, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn file_chunks_are_surfaced_in_order() {
        let (mut client, mut server) = encrypted_pair().await;

        let content = vec![0x5A_u8; CHUNK_SIZE + 1024];
        let mut file = crate::payload::OutgoingFile {
            meta: FileMeta {
                kind: FileType::Image,
                name: "image.jpg".into(),
                mime_type: "image/jpg".into(),
                size: content.len() as i64,
            },
            content: Box::new(std::io::Cursor::new(content.clone())),
        };
        client.send_file_in_chunks(9, &mut file).await.unwrap();

        let mut received = Vec::new();
        loop {
            match server.read_message().await.unwrap() {
                Inbound::FileChunk(chunk) => {
                    assert_eq!(chunk.file_id, 9);
                    received.extend_from_slice(&chunk.body);
                    if chunk.is_final {
                        assert!(chunk.body.is_empty());
                        break;
                    }
                }
                other => panic!("expected file chunk, got {other:?}"),
            }
        }
        assert_eq!(received, content);
    }

    #[tokio::test]
    async fn out_of_order_chunk_is_offset_mismatch() {
        let (mut client, mut server) = encrypted_pair().await;

        let frame = outbound::payload_transfer(
            7,
            PayloadType::Bytes,
            12,
            None,
            5, // first chunk must start at offset 0
            0,
            b"World".to_vec(),
        );
        client.encrypt_and_write(&frame).await.unwrap();

        assert!(matches!(
            server.read_message().await,
            Err(Error::OffsetMismatch)
        ));
    }

    #[tokio::test]
    async fn bytes_total_size_mismatch_is_invalid() {
        let (mut client, mut server) = encrypted_pair().await;

        let frame = outbound::payload_transfer(
            7,
            PayloadType::Bytes,
            999,
            None,
            0,
            1, // final chunk with only 5 of the declared 999 bytes
            b"Hello".to_vec(),
        );
        client.encrypt_and_write(&frame).await.unwrap();

        assert!(matches!(
            server.read_message().await,
            Err(Error::InvalidMessage)
        ));
    }

    #[tokio::test]
    async fn bytes_payload_over_cap_is_too_long() {
        let (mut client, mut server) = encrypted_pair().await;

        let half = vec![0u8; 3 * 1024 * 1024];
        let total = (half.len() * 2) as i64;
        let first = outbound::payload_transfer(
            7,
            PayloadType::Bytes,
            total,
            None,
            0,
            0,
            half.clone(),
        );
        client.encrypt_and_write(&first).await.unwrap();
        assert!(matches!(
            server.read_message().await.unwrap(),
            Inbound::TransferInProgress
        ));

        let second = outbound::payload_transfer(
            7,
            PayloadType::Bytes,
            total,
            None,
            half.len() as i64,
            0,
            half,
        );
        client.encrypt_and_write(&second).await.unwrap();
        assert!(matches!(
            server.read_message().await,
            Err(Error::MessageTooLong)
        ));
    }

    #[tokio::test]
    async fn keep_alive_is_acked_and_disconnection_recognized() {
        use nearshare_proto::connections::{
            v1_frame::FrameType, DisconnectionFrame, KeepAliveFrame, OfflineFrame, V1Frame,
        };

        let (mut client, mut server) = encrypted_pair().await;

        let keep_alive = V1Frame {
            r#type: Some(FrameType::KeepAlive as i32),
            keep_alive: Some(KeepAliveFrame { ack: Some(false) }),
            ..Default::default()
        };
        client.encrypt_and_write(&keep_alive).await.unwrap();
        let msg = read_plain(&mut server).await;
        server.process_service_message(&msg).await.unwrap();

        // The ack comes back on the encrypted channel.
        let ack = read_plain(&mut client).await;
        let frame = OfflineFrame::decode(ack.as_slice()).unwrap();
        let v1 = frame.v1.unwrap();
        assert_eq!(v1.frame_type(), FrameType::KeepAlive);
        assert_eq!(v1.keep_alive.unwrap().ack, Some(true));

        let disconnection = V1Frame {
            r#type: Some(FrameType::Disconnection as i32),
            disconnection: Some(DisconnectionFrame::default()),
            ..Default::default()
        };
        client.encrypt_and_write(&disconnection).await.unwrap();
        let msg = read_plain(&mut server).await;
        assert!(matches!(
            server.process_service_message(&msg).await,
            Err(Error::ConnEndedByPeer)
        ));

        assert!(matches!(
            server.process_service_message(b"not a frame at all").await,
            Err(Error::NotServiceMessage)
        ));
    }

    #[tokio::test]
    async fn sharing_frames_round_trip() {
        let (mut client, mut server) = encrypted_pair().await;

        client.send_paired_key_encryption().await.unwrap();
        assert!(matches!(
            server.read_message().await.unwrap(),
            Inbound::TransferInProgress
        ));
        let msg = read_plain(&mut server).await;
        server.validate_paired_key_encryption(&msg).unwrap();

        client.send_paired_key_result().await.unwrap();
        assert!(matches!(
            server.read_message().await.unwrap(),
            Inbound::TransferInProgress
        ));
        let msg = read_plain(&mut server).await;
        server.validate_paired_key_result(&msg).unwrap();

        let intro = Introduction {
            text: Some(IntroducedText {
                meta: TextMeta {
                    kind: TextType::Url,
                    title: "https://examp...".into(),
                    size: 25,
                },
                payload_id: 42,
            }),
            files: HashMap::from([(
                77,
                FileMeta {
                    kind: FileType::Audio,
                    name: "ringtone.wav".into(),
                    mime_type: "audio/wav".into(),
                    size: 123,
                },
            )]),
        };
        client.send_introduction(&intro).await.unwrap();
        assert!(matches!(
            server.read_message().await.unwrap(),
            Inbound::TransferInProgress
        ));
        let msg = read_plain(&mut server).await;
        let parsed = server.unmarshal_introduction(&msg).unwrap();

        let text = parsed.text.unwrap();
        assert_eq!(text.payload_id, 42);
        assert_eq!(text.meta.kind, TextType::Url);
        assert_eq!(text.meta.title, "https://examp...");
        assert_eq!(text.meta.size, 25);
        assert_eq!(parsed.files.len(), 1);
        let file = &parsed.files[&77];
        assert_eq!(file.kind, FileType::Audio);
        assert_eq!(file.name, "ringtone.wav");
        assert_eq!(file.mime_type, "audio/wav");
        assert_eq!(file.size, 123);

        client.send_transfer_request().await.unwrap();
        assert!(matches!(
            server.read_message().await.unwrap(),
            Inbound::TransferInProgress
        ));
        let msg = read_plain(&mut server).await;
        server.validate_transfer_request(&msg).unwrap();

        server.send_transfer_response(false).await.unwrap();
        assert!(matches!(
            client.read_message().await.unwrap(),
            Inbound::TransferInProgress
        ));
        let msg = read_plain(&mut client).await;
        assert!(!client.unmarshal_transfer_response(&msg).unwrap());
    }

    #[tokio::test]
    async fn empty_introduction_is_invalid() {
        let (mut client, mut server) = encrypted_pair().await;

        let intro = Introduction {
            text: None,
            files: HashMap::new(),
        };
        client.send_introduction(&intro).await.unwrap();
        assert!(matches!(
            server.read_message().await.unwrap(),
            Inbound::TransferInProgress
        ));
        let msg = read_plain(&mut server).await;
        assert!(matches!(
            server.unmarshal_introduction(&msg),
            Err(Error::InvalidMessage)
        ));
    }

    #[tokio::test]
    async fn bad_message_alert_is_parseable() {
        use nearshare_proto::securegcm::{ukey2_alert::AlertType, Ukey2Alert, Ukey2Message};
        use nearshare_proto::securegcm::ukey2_message::Type;

        let (mut client, mut server) = pair();
        server.send_bad_message_error().await;

        let msg = read_plain(&mut client).await;
        let wrapper = Ukey2Message::decode(msg.as_slice()).unwrap();
        assert_eq!(wrapper.message_type(), Type::Alert);
        let alert = Ukey2Alert::decode(wrapper.message_data()).unwrap();
        assert_eq!(alert.r#type, Some(AlertType::BadMessage as i32));
    }
}
