//! Framed reads, decryption and payload reassembly.

use prost::Message;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};

use nearshare_proto::connections::payload_transfer_frame::payload_header::PayloadType;
use nearshare_proto::connections::v1_frame::FrameType;
use nearshare_proto::securemessage::{EncScheme, HeaderAndBody, SecureMessage, SigScheme};

use super::{Adapter, MAX_MESSAGE_LENGTH};
use crate::error::{Error, Result};

/// One pull from the connection, after framing, decryption and
/// reassembly.
#[derive(Debug)]
pub enum Inbound {
    /// A complete application-level message: a handshake frame before
    /// encryption, or a reassembled BYTES payload after it.
    Message(Vec<u8>),
    /// A completed text transfer (transfer handler enabled), filtered to
    /// printable characters.
    Text(String),
    /// A file chunk; the caller owns reassembly into its payload pipe.
    FileChunk(FileChunk),
    /// A chunk was consumed but nothing is deliverable yet.
    TransferInProgress,
}

#[derive(Debug)]
pub struct FileChunk {
    pub file_id: i64,
    pub is_final: bool,
    pub body: Vec<u8>,
}

impl<S> Adapter<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Pulls the next event off the wire: reads one length-prefixed frame,
    /// decrypts it when the session is encrypted, and feeds payload-transfer
    /// frames through the reassembler.
    pub async fn read_message(&mut self) -> Result<Inbound> {
        let mut len_buf = [0u8; 4];
        if let Err(err) = self.stream.read_exact(&mut len_buf).await {
            if err.kind() == std::io::ErrorKind::UnexpectedEof {
                tracing::debug!("conn ended abruptly");
                return Err(Error::ConnEndedByPeer);
            }

            tracing::error!(%err, "read message length");
            return Err(Error::InvalidMessageLength);
        }

        let msg_len = u32::from_be_bytes(len_buf) as usize;
        if msg_len > MAX_MESSAGE_LENGTH {
            tracing::error!(length = msg_len, "message is too long");
            return Err(Error::MessageTooLong);
        }

        let mut msg_buf = vec![0u8; msg_len];
        if let Err(err) = self.stream.read_exact(&mut msg_buf).await {
            tracing::error!(%err, "fetch message");
            return Err(Error::FetchFullMessage);
        }

        if self.is_encrypted {
            msg_buf = self.decrypt_message(&msg_buf)?;
        }

        self.handle_transfer(msg_buf)
    }

    fn decrypt_message(&mut self, msg: &[u8]) -> Result<Vec<u8>> {
        let secure = SecureMessage::decode(msg)?;
        self.cipher
            .validate_signature(&secure.header_and_body, &secure.signature)?;

        let hb = HeaderAndBody::decode(secure.header_and_body.as_slice())?;
        if hb.header.encryption_scheme != EncScheme::Aes256Cbc as i32 {
            return Err(Error::InvalidEncryptionScheme);
        }
        if hb.header.signature_scheme != SigScheme::HmacSha256 as i32 {
            return Err(Error::InvalidSignatureScheme);
        }
        if hb.header.iv.as_ref().map_or(0, Vec::len) < 16 {
            return Err(Error::InvalidIv);
        }

        let d2d = self.cipher.decrypt(&hb)?;

        // Replay defence: the peer's sequence must advance by exactly one.
        self.recv_seq_number += 1;
        let seq = d2d.sequence_number.unwrap_or_default();
        if seq != self.recv_seq_number {
            tracing::warn!(
                got = seq,
                expected = self.recv_seq_number,
                "sender sequence number out of order"
            );
            return Err(Error::InvalidMessage);
        }

        Ok(d2d.message.unwrap_or_default())
    }

    /// Routes PAYLOAD_TRANSFER frames into the reassembler; everything else
    /// passes through untouched.
    fn handle_transfer(&mut self, msg: Vec<u8>) -> Result<Inbound> {
        let Ok(frame) = super::frames::unmarshal_offline_frame(&msg) else {
            return Ok(Inbound::Message(msg));
        };
        if frame.frame_type() != FrameType::PayloadTransfer {
            return Ok(Inbound::Message(msg));
        }
        let Some(transfer) = frame.payload_transfer else {
            return Ok(Inbound::Message(msg));
        };

        let header = transfer.payload_header.unwrap_or_default();
        let chunk = transfer.payload_chunk.unwrap_or_default();
        let payload_id = header.id.unwrap_or_default();
        let offset = chunk.offset.unwrap_or_default();
        let body = chunk.body.unwrap_or_default();
        let is_final_chunk = chunk.flags.unwrap_or_default() & 1 == 1;

        match header.r#type {
            Some(t) if t == PayloadType::File as i32 => {
                let next_offset = self.file_offsets.entry(payload_id).or_insert(0);
                if *next_offset != offset {
                    return Err(Error::OffsetMismatch);
                }
                *next_offset += body.len() as i64;

                if is_final_chunk {
                    self.file_offsets.remove(&payload_id);
                }

                Ok(Inbound::FileChunk(FileChunk {
                    file_id: payload_id,
                    is_final: is_final_chunk,
                    body,
                }))
            }
            Some(t) if t == PayloadType::Bytes as i32 => {
                if offset != self.bytes_buf.len() as i64 {
                    return Err(Error::OffsetMismatch);
                }
                if self.bytes_buf.len() + body.len() > MAX_MESSAGE_LENGTH {
                    return Err(Error::MessageTooLong);
                }
                self.bytes_buf.extend_from_slice(&body);

                if !is_final_chunk {
                    return Ok(Inbound::TransferInProgress);
                }

                let buf = std::mem::take(&mut self.bytes_buf);
                if let Some(total) = header.total_size {
                    if total != buf.len() as i64 {
                        return Err(Error::InvalidMessage);
                    }
                }

                if self.is_transfer {
                    Ok(Inbound::Text(clean_text_transfer(&buf)))
                } else {
                    Ok(Inbound::Message(buf))
                }
            }
            _ => Ok(Inbound::Message(msg)),
        }
    }
}

/// Text payloads are display strings; strip everything unprintable except
/// tabs and newlines.
fn clean_text_transfer(buf: &[u8]) -> String {
    String::from_utf8_lossy(buf)
        .chars()
        .filter(|c| !c.is_control() || *c == '\t' || *c == '\n')
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn control_characters_are_stripped() {
        assert_eq!(clean_text_transfer(b"a\x00b\x1bc"), "abc");
        assert_eq!(clean_text_transfer(b"line\nbreak\ttab"), "line\nbreak\ttab");
        assert_eq!(clean_text_transfer("héllo".as_bytes()), "h\u{e9}llo");
    }
}
