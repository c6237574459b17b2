//! Framed writes: plain offline frames, UKEY2 messages, and the encrypted
//! secure-message path with chunked payload senders.

use prost::Message;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use nearshare_proto::connections::payload_transfer_frame::payload_header::PayloadType;
use nearshare_proto::connections::payload_transfer_frame::{
    PacketType, PayloadChunk, PayloadHeader,
};
use nearshare_proto::connections::{
    v1_frame::FrameType, OfflineFrame, PayloadTransferFrame, V1Frame,
};
use nearshare_proto::securegcm::ukey2_alert::AlertType;
use nearshare_proto::securegcm::ukey2_message::Type as UkeyMessageType;
use nearshare_proto::securegcm::{DeviceToDeviceMessage, Ukey2Alert, Ukey2Message};
use nearshare_proto::securemessage::SecureMessage;
use nearshare_proto::sharing;

use super::{Adapter, CHUNK_SIZE};
use crate::error::{Error, Result};
use crate::payload::OutgoingFile;

impl<S> Adapter<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Writes one `[u32-be length][body]` frame.
    pub(crate) async fn write_message(&mut self, data: &[u8]) -> Result<()> {
        let mut framed = Vec::with_capacity(data.len() + 4);
        framed.extend_from_slice(&(data.len() as u32).to_be_bytes());
        framed.extend_from_slice(data);

        self.stream.write_all(&framed).await?;
        self.stream.flush().await?;
        Ok(())
    }

    pub(crate) async fn write_offline_frame(&mut self, frame: &V1Frame) -> Result<()> {
        let offline = OfflineFrame {
            version: Some(nearshare_proto::connections::offline_frame::Version::V1 as i32),
            v1: Some(frame.clone()),
        };

        self.write_message(&offline.encode_to_vec()).await
    }

    pub(crate) async fn write_ukey_message(
        &mut self,
        message_type: UkeyMessageType,
        data: Vec<u8>,
    ) -> Result<()> {
        let wrapper = Ukey2Message {
            message_type: Some(message_type as i32),
            message_data: Some(data),
        };

        self.write_message(&wrapper.encode_to_vec()).await
    }

    /// Serializes a sharing frame and ships it as a BYTES payload with a
    /// fresh payload id.
    pub(crate) async fn write_secure_frame(&mut self, frame: &sharing::V1Frame) -> Result<()> {
        let data = sharing::Frame {
            version: Some(sharing::frame::Version::V1 as i32),
            v1: Some(frame.clone()),
        }
        .encode_to_vec();

        let payload_id = self.random.next_i64();
        self.send_data_in_chunks(payload_id, &data).await
    }

    /// Wraps an offline frame in a sequenced device-to-device message,
    /// encrypts, signs and writes it.
    pub(crate) async fn encrypt_and_write(&mut self, frame: &V1Frame) -> Result<()> {
        let offline = OfflineFrame {
            version: Some(nearshare_proto::connections::offline_frame::Version::V1 as i32),
            v1: Some(frame.clone()),
        };

        self.seq_number += 1;
        let hb = self.cipher.encrypt(&DeviceToDeviceMessage {
            sequence_number: Some(self.seq_number),
            message: Some(offline.encode_to_vec()),
        })?;

        let header_and_body = hb.encode_to_vec();
        let signature = self.cipher.sign(&header_and_body)?;
        let secure = SecureMessage {
            header_and_body,
            signature,
        };

        self.write_message(&secure.encode_to_vec()).await
    }

    /// Sends a BYTES payload: 512 KiB data chunks followed by an empty
    /// final chunk carrying the last-chunk flag.
    pub async fn send_data_in_chunks(&mut self, payload_id: i64, data: &[u8]) -> Result<()> {
        let total_size = data.len() as i64;

        for (i, chunk) in data.chunks(CHUNK_SIZE).enumerate() {
            let frame = payload_transfer(
                payload_id,
                PayloadType::Bytes,
                total_size,
                None,
                (i * CHUNK_SIZE) as i64,
                0,
                chunk.to_vec(),
            );
            self.encrypt_and_write(&frame).await?;
        }

        let last = payload_transfer(
            payload_id,
            PayloadType::Bytes,
            total_size,
            None,
            total_size,
            1,
            Vec::new(),
        );
        self.encrypt_and_write(&last).await
    }

    /// Streams a file payload from its reader in 512 KiB chunks, then the
    /// empty final chunk.
    pub async fn send_file_in_chunks(
        &mut self,
        payload_id: i64,
        file: &mut OutgoingFile,
    ) -> Result<()> {
        let total_size = file.meta.size;
        let mut buf = vec![0u8; CHUNK_SIZE];
        let mut offset: i64 = 0;

        loop {
            let n = file.content.read(&mut buf).await?;
            if n == 0 {
                break;
            }

            let frame = payload_transfer(
                payload_id,
                PayloadType::File,
                total_size,
                Some(file.meta.name.clone()),
                offset,
                0,
                buf[..n].to_vec(),
            );
            self.encrypt_and_write(&frame).await?;
            offset += n as i64;
        }

        let last = payload_transfer(
            payload_id,
            PayloadType::File,
            total_size,
            Some(file.meta.name.clone()),
            offset,
            1,
            Vec::new(),
        );
        self.encrypt_and_write(&last).await
    }

    /// Tells the peer its last message failed validation. Failures here are
    /// logged only; the caller keeps going either way.
    pub async fn send_bad_message_error(&mut self) {
        let alert = Ukey2Alert {
            r#type: Some(AlertType::BadMessage as i32),
            error_message: Some(Error::InvalidMessage.to_string()),
        };

        if let Err(err) = self
            .write_ukey_message(UkeyMessageType::Alert, alert.encode_to_vec())
            .await
        {
            tracing::error!(%err, "send bad message error");
        }
    }
}

pub(crate) fn payload_transfer(
    payload_id: i64,
    payload_type: PayloadType,
    total_size: i64,
    file_name: Option<String>,
    offset: i64,
    flags: i32,
    body: Vec<u8>,
) -> V1Frame {
    V1Frame {
        r#type: Some(FrameType::PayloadTransfer as i32),
        payload_transfer: Some(PayloadTransferFrame {
            packet_type: Some(PacketType::Data as i32),
            payload_header: Some(PayloadHeader {
                id: Some(payload_id),
                r#type: Some(payload_type as i32),
                total_size: Some(total_size),
                is_sensitive: Some(false),
                file_name,
            }),
            payload_chunk: Some(PayloadChunk {
                flags: Some(flags),
                offset: Some(offset),
                body: Some(body),
            }),
        }),
        ..Default::default()
    }
}
