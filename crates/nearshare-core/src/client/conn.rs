//! Initiator-side connection state machine: setup, introduction, transfer
//! request, chunked sends, disconnect.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::net::TcpStream;

use crate::adapter::{Adapter, Inbound, IntroducedText, Introduction};
use crate::error::{Error, Result};
use crate::payload::{DeviceType, OutgoingFile, TextMeta, TextType};
use crate::random::Random;

const MAX_TITLE_LENGTH: usize = 12;

pub(crate) struct ConnectionConfig {
    pub(crate) endpoint_id: String,
    pub(crate) hostname: String,
    pub(crate) device: DeviceType,
}

pub(crate) struct Connection {
    adapter: Adapter<TcpStream>,
    cfg: ConnectionConfig,
    random: Arc<dyn Random>,
}

impl Connection {
    pub(crate) fn new(
        stream: TcpStream,
        cfg: ConnectionConfig,
        random: Arc<dyn Random>,
    ) -> Self {
        Self {
            adapter: Adapter::new(stream, false, random.clone()),
            cfg,
            random,
        }
    }

    /// Runs the init and pairing phases: connection request, UKEY2
    /// handshake, mutual accept, encryption, paired-key exchange.
    pub(crate) async fn setup_transfer(&mut self) -> Result<()> {
        self.adapter
            .send_conn_request(&self.cfg.endpoint_id, &self.cfg.hostname, self.cfg.device)
            .await?;
        self.adapter.send_client_init_with_client_finished().await?;

        let msg = self.read().await?;
        self.adapter.validate_server_init(&msg)?;

        self.adapter.send_conn_response(true).await?;
        let msg = self.read().await?;
        if !self.adapter.unmarshal_conn_response(&msg)? {
            self.adapter.disconnect().await;
            return Err(Error::ConnEndedByPeer);
        }
        self.adapter.enable_encryption()?;

        self.adapter.send_paired_key_encryption().await?;
        let msg = self.read().await?;
        self.adapter.validate_paired_key_encryption(&msg)?;

        self.adapter.send_paired_key_result().await?;
        let msg = self.read().await?;
        self.adapter.validate_paired_key_result(&msg)?;

        tracing::debug!("success transfer setup");
        Ok(())
    }

    pub(crate) async fn send_text(&mut self, text: &str, kind: TextType) -> Result<()> {
        let payload_id = self.random.next_i64();
        let meta = IntroducedText {
            meta: TextMeta {
                kind,
                title: title_of(text),
                size: text.len() as i64,
            },
            payload_id,
        };

        self.send_transfer_request(Some(meta), HashMap::new())
            .await?;
        self.adapter
            .send_data_in_chunks(payload_id, text.as_bytes())
            .await?;

        tracing::debug!("success text transfer");
        Ok(())
    }

    pub(crate) async fn send_files(&mut self, files: Vec<OutgoingFile>) -> Result<()> {
        let mut payloads: HashMap<i64, OutgoingFile> = files
            .into_iter()
            .map(|file| (self.random.next_i64(), file))
            .collect();
        let metas = payloads
            .iter()
            .map(|(payload_id, file)| (*payload_id, file.meta.clone()))
            .collect();

        self.send_transfer_request(None, metas).await?;

        for (payload_id, file) in payloads.iter_mut() {
            self.adapter.send_file_in_chunks(*payload_id, file).await?;
        }

        tracing::debug!("success files transfer");
        Ok(())
    }

    pub(crate) async fn disconnect(&mut self) {
        self.adapter.disconnect().await;
    }

    /// Sends the introduction and the transfer request, then waits for the
    /// peer's verdict. On accept, seeds the peer's reassembler with a short
    /// synthetic payload, as the protocol requires.
    async fn send_transfer_request(
        &mut self,
        text: Option<IntroducedText>,
        files: HashMap<i64, crate::payload::FileMeta>,
    ) -> Result<()> {
        if text.is_none() && files.is_empty() {
            return Err(Error::IntroductionCantBeEmpty);
        }

        self.adapter
            .send_introduction(&Introduction { text, files })
            .await?;
        self.adapter.send_transfer_request().await?;

        tracing::info!(pin = %format!("{:04}", self.adapter.pin()), "waiting for server response...");
        let msg = self.read().await?;
        if !self.adapter.unmarshal_transfer_response(&msg)? {
            self.adapter.disconnect().await;
            return Err(Error::ConnEndedByPeer);
        }
        tracing::debug!("server accepted transfer");

        self.adapter
            .send_data_in_chunks(self.random.next_i64(), b"random")
            .await
    }

    /// Pulls the next complete message, skipping reassembly sentinels, with
    /// the shared error etiquette: disconnect on fatal transport errors,
    /// alert on offset mismatches.
    async fn read(&mut self) -> Result<Vec<u8>> {
        loop {
            match self.adapter.read_message().await {
                Ok(Inbound::Message(msg)) => return Ok(msg),
                Ok(Inbound::TransferInProgress) => {}
                Ok(event) => {
                    tracing::warn!(?event, "unexpected transfer event on initiator side");
                }
                Err(err) => {
                    match &err {
                        Error::Eof | Error::MessageTooLong => self.adapter.disconnect().await,
                        Error::OffsetMismatch => self.adapter.send_bad_message_error().await,
                        _ => {}
                    }

                    tracing::error!(%err, "read message");
                    return Err(err);
                }
            }
        }
    }
}

fn title_of(text: &str) -> String {
    if text.chars().count() > MAX_TITLE_LENGTH {
        let truncated: String = text.chars().take(MAX_TITLE_LENGTH - 3).collect();
        return format!("{truncated}...");
    }

    text.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_titles_pass_through() {
        assert_eq!(title_of("Hello World!"), "Hello World!");
        assert_eq!(title_of(""), "");
    }

    #[test]
    fn long_titles_are_truncated() {
        assert_eq!(title_of("Hello World!!"), "Hello Wor...");
        assert_eq!(title_of("https://example.org/path"), "https://e...");
    }
}
