//! Per-connection server state machine.
//!
//! Drives the phases of an inbound transfer — connection init, pairing,
//! transfer — by tracking the next expected message and dispatching
//! adapter events. Payload bookkeeping (the file pipes and the
//! received/expected counters) lives here; the adapter stays payload
//! agnostic.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::io::{duplex, AsyncWriteExt, DuplexStream};
use tokio::net::TcpStream;
use tokio::sync::watch;

use super::Callbacks;
use crate::adapter::{Adapter, FileChunk, Inbound, IntroducedText};
use crate::error::{Error, Result};
use crate::payload::{FileMeta, FilePayload, TextPayload};
use crate::random::Random;

/// Capacity of a file-delivery pipe. The protocol task blocks writing into
/// a full pipe until the consumer catches up; that is the backpressure
/// mechanism on file transfers.
const FILE_PIPE_CAPACITY: usize = 64 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Init,
    Pairing,
    Transfer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Expected {
    // init phase
    ConnRequest,
    ClientInit,
    ClientFinish,
    ConnResponse,
    // pairing phase
    PairedKeyEncryption,
    PairedKeyResult,
    // transfer phase
    Introduction,
    AcceptReject,
    TransferStart,
}

struct InFlightFile {
    meta: FileMeta,
    /// Writer end of the delivery pipe; dropped on the final chunk so the
    /// consumer sees EOF.
    writer: Option<DuplexStream>,
    /// Reader end, handed to the file callback on the first chunk.
    reader: Option<DuplexStream>,
    bytes_written: i64,
}

pub(crate) struct ServerConnection {
    adapter: Adapter<TcpStream>,
    shutdown: watch::Receiver<bool>,

    phase: Phase,
    expected: Expected,
    done: bool,

    // The text payload can only be sent once per transfer.
    text_meta: Option<IntroducedText>,
    file_payloads: HashMap<i64, InFlightFile>,
    expected_payloads: usize,
    received_payloads: usize,
    callbacks: Callbacks,
}

impl ServerConnection {
    pub(crate) fn new(
        stream: TcpStream,
        callbacks: Callbacks,
        random: Arc<dyn Random>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            adapter: Adapter::new(stream, true, random),
            shutdown,
            phase: Phase::Init,
            expected: Expected::ConnRequest,
            done: false,
            text_meta: None,
            file_payloads: HashMap::new(),
            expected_payloads: 0,
            received_payloads: 0,
            callbacks,
        }
    }

    pub(crate) async fn run(mut self) {
        tracing::debug!("got new connection");

        loop {
            let inbound = tokio::select! {
                _ = self.shutdown.changed() => Err(Error::Eof),
                inbound = self.adapter.read_message() => inbound,
            };

            match inbound {
                Ok(Inbound::Message(msg)) => self.route(&msg).await,
                Ok(Inbound::Text(text)) => {
                    if let Err(err) = self.write_text(text) {
                        tracing::error!(%err, "deliver text payload");
                    }
                }
                Ok(Inbound::FileChunk(chunk)) => {
                    if let Err(err) = self.write_file_chunk(chunk).await {
                        tracing::error!(%err, "deliver file chunk");
                    }
                }
                Ok(Inbound::TransferInProgress) => {}
                Err(Error::Eof | Error::MessageTooLong) => {
                    self.adapter.disconnect().await;
                    break;
                }
                Err(Error::ConnEndedByPeer) => break,
                Err(Error::OffsetMismatch) => {
                    self.adapter.send_bad_message_error().await;
                    tracing::error!("chunk offset mismatch");
                }
                Err(err) => tracing::error!(%err, "read message"),
            }

            // Set once every expected payload has been delivered or the
            // peer announced a disconnect.
            if self.done {
                self.adapter.disconnect().await;
                break;
            }
        }

        tracing::debug!("connection closed");
    }

    async fn route(&mut self, msg: &[u8]) {
        let mut next = self.expected;
        let result = match (self.phase, self.expected) {
            (Phase::Init, Expected::ConnRequest) => {
                next = Expected::ClientInit;
                self.process_conn_request(msg)
            }
            (Phase::Init, Expected::ClientInit) => {
                next = Expected::ClientFinish;
                self.process_client_init(msg).await
            }
            (Phase::Init, Expected::ClientFinish) => {
                next = Expected::ConnResponse;
                self.adapter.validate_client_finished(msg)
            }
            (Phase::Init, Expected::ConnResponse) => {
                next = Expected::PairedKeyEncryption;
                self.process_conn_response(msg).await
            }
            (Phase::Pairing, Expected::PairedKeyEncryption) => {
                next = Expected::PairedKeyResult;
                self.process_paired_key_encryption(msg).await
            }
            (Phase::Pairing, Expected::PairedKeyResult) => {
                next = Expected::Introduction;
                self.process_paired_key_result(msg).await
            }
            (Phase::Transfer, Expected::Introduction) => {
                next = Expected::AcceptReject;
                self.process_introduction(msg)
            }
            (Phase::Transfer, Expected::AcceptReject) => {
                next = Expected::TransferStart;
                self.process_transfer_request(msg).await
            }
            (Phase::Transfer, Expected::TransferStart) => {
                self.adapter.enable_transfer_handler();
                Ok(())
            }
            _ => Ok(()),
        };

        if let Err(err) = result {
            // The frame may have been a service message all along; if so
            // the original error is shadowed.
            match self.adapter.process_service_message(msg).await {
                Ok(()) => return,
                Err(Error::ConnEndedByPeer) => {
                    tracing::debug!("conn was ended by peer");
                    self.done = true;
                    return;
                }
                Err(_) => {}
            }

            if matches!(err, Error::InvalidMessage) {
                // Peers only understand UKEY2 alerts this early.
                if self.expected <= Expected::ConnResponse {
                    self.adapter.send_bad_message_error().await;
                }
                tracing::warn!(expected = ?self.expected, "got invalid message");
                return;
            }

            tracing::error!(%err, "process message");
            return;
        }

        self.expected = next;
    }

    fn process_conn_request(&mut self, msg: &[u8]) -> Result<()> {
        // Just validate and let it go.
        self.adapter.unmarshal_conn_request(msg)?;
        Ok(())
    }

    async fn process_client_init(&mut self, msg: &[u8]) -> Result<()> {
        self.adapter.validate_client_init(msg)?;
        self.adapter.send_server_init().await
    }

    async fn process_conn_response(&mut self, msg: &[u8]) -> Result<()> {
        let is_accepted = self.adapter.unmarshal_conn_response(msg)?;
        if !is_accepted {
            return Err(Error::ConnEndedByPeer);
        }

        self.adapter.send_conn_response(true).await?;

        // Init phase done: all later traffic is encrypted.
        self.adapter.enable_encryption()?;
        self.phase = Phase::Pairing;
        Ok(())
    }

    async fn process_paired_key_encryption(&mut self, msg: &[u8]) -> Result<()> {
        self.adapter.validate_paired_key_encryption(msg)?;
        self.adapter.send_paired_key_encryption().await
    }

    async fn process_paired_key_result(&mut self, msg: &[u8]) -> Result<()> {
        self.adapter.validate_paired_key_result(msg)?;
        self.adapter.send_paired_key_result().await?;

        self.phase = Phase::Transfer;
        Ok(())
    }

    fn process_introduction(&mut self, msg: &[u8]) -> Result<()> {
        let intro = self.adapter.unmarshal_introduction(msg)?;

        if intro.has_text() {
            self.text_meta = intro.text;
            self.expected_payloads += 1;
        }

        self.expected_payloads += intro.files.len();
        for (payload_id, meta) in intro.files {
            let (writer, reader) = duplex(FILE_PIPE_CAPACITY);
            self.file_payloads.insert(
                payload_id,
                InFlightFile {
                    meta,
                    writer: Some(writer),
                    reader: Some(reader),
                    bytes_written: 0,
                },
            );
        }

        Ok(())
    }

    async fn process_transfer_request(&mut self, msg: &[u8]) -> Result<()> {
        self.adapter.validate_transfer_request(msg)?;

        let files: Vec<FileMeta> = self
            .file_payloads
            .values()
            .map(|file| file.meta.clone())
            .collect();
        let is_accepted = (self.callbacks.auth)(
            self.text_meta.as_ref().map(|text| &text.meta),
            &files,
            self.adapter.pin(),
        );

        self.adapter.send_transfer_response(is_accepted).await
    }

    async fn write_file_chunk(&mut self, chunk: FileChunk) -> Result<()> {
        let Some(file) = self.file_payloads.get_mut(&chunk.file_id) else {
            return Err(Error::InvalidMessage);
        };

        if let Some(reader) = file.reader.take() {
            (self.callbacks.file)(FilePayload {
                meta: file.meta.clone(),
                content: reader,
            });
        }

        if !chunk.body.is_empty() {
            let Some(writer) = file.writer.as_mut() else {
                return Err(Error::InternalError);
            };

            writer.write_all(&chunk.body).await?;
            file.bytes_written += chunk.body.len() as i64;
        }

        if chunk.is_final {
            let is_complete = file.bytes_written == file.meta.size;
            let bytes_written = file.bytes_written;
            let declared_size = file.meta.size;
            let name = file.meta.name.clone();

            file.writer.take();
            tracing::debug!(filename = %name, "file transferred");
            self.received_payloads += 1;
            self.check_if_last_payload();

            if !is_complete {
                tracing::warn!(
                    filename = %name,
                    bytes_written,
                    declared_size,
                    "transfer closed with a size mismatch"
                );
                return Err(Error::TransferNotComplete);
            }
        }

        Ok(())
    }

    fn write_text(&mut self, text: String) -> Result<()> {
        let Some(meta) = &self.text_meta else {
            return Err(Error::TextTransferNotExpected);
        };

        (self.callbacks.text)(TextPayload {
            meta: meta.meta.clone(),
            text,
        });
        self.received_payloads += 1;
        self.check_if_last_payload();
        Ok(())
    }

    fn check_if_last_payload(&mut self) {
        if self.expected_payloads > 0 && self.received_payloads >= self.expected_payloads {
            tracing::debug!("got last payload, disconnecting...");
            self.done = true;
        }
    }
}
