//! Typed send/validate pairs for the offline connection frames and the
//! sharing-layer frames.

use std::collections::HashMap;

use prost::Message;
use tokio::io::{AsyncRead, AsyncWrite};

use nearshare_proto::connections::connection_request_frame::Medium;
use nearshare_proto::connections::connection_response_frame::ResponseStatus;
use nearshare_proto::connections::v1_frame::FrameType;
use nearshare_proto::connections::{
    self, ConnectionRequestFrame, ConnectionResponseFrame, OfflineFrame, OsInfo,
};
use nearshare_proto::sharing;
use nearshare_proto::sharing::v1_frame::FrameType as SharingFrameType;

use super::Adapter;
use crate::endpoint;
use crate::error::{Error, Result};
use crate::payload::{DeviceType, FileMeta, FileType, TextMeta, TextType};
use crate::random;

/// Sharing metadata introducing the single text payload of a transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntroducedText {
    pub meta: TextMeta,
    pub payload_id: i64,
}

/// Parsed INTRODUCTION contents: at most one text entry plus the offered
/// files keyed by payload id.
#[derive(Debug, Clone, Default)]
pub struct Introduction {
    pub text: Option<IntroducedText>,
    pub files: HashMap<i64, FileMeta>,
}

impl Introduction {
    pub fn has_text(&self) -> bool {
        self.text.is_some()
    }

    pub fn has_files(&self) -> bool {
        !self.files.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct ConnRequest {
    pub endpoint_info: Vec<u8>,
}

pub(crate) fn unmarshal_offline_frame(msg: &[u8]) -> Result<connections::V1Frame> {
    let frame = OfflineFrame::decode(msg)?;
    if frame.version != Some(connections::offline_frame::Version::V1 as i32) {
        return Err(Error::InvalidOfflineFrame);
    }

    frame.v1.ok_or(Error::InvalidOfflineFrame)
}

pub(crate) fn unmarshal_sharing_frame(msg: &[u8]) -> Result<sharing::V1Frame> {
    let frame = sharing::Frame::decode(msg)?;
    if frame.version != Some(sharing::frame::Version::V1 as i32) {
        return Err(Error::InvalidSharingFrame);
    }

    frame.v1.ok_or(Error::InvalidSharingFrame)
}

impl<S> Adapter<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    pub fn unmarshal_conn_request(&self, msg: &[u8]) -> Result<ConnRequest> {
        let frame = unmarshal_offline_frame(msg)?;
        if frame.frame_type() != FrameType::ConnectionRequest {
            return Err(Error::InvalidMessage);
        }
        let Some(request) = frame.connection_request else {
            return Err(Error::InvalidMessage);
        };

        Ok(ConnRequest {
            endpoint_info: request.endpoint_info.unwrap_or_default(),
        })
    }

    pub async fn send_conn_request(
        &mut self,
        endpoint_id: &str,
        hostname: &str,
        device: DeviceType,
    ) -> Result<()> {
        let endpoint_info = endpoint::craft_endpoint_info(self.random.as_ref(), hostname, device);

        self.write_offline_frame(&connections::V1Frame {
            r#type: Some(FrameType::ConnectionRequest as i32),
            connection_request: Some(ConnectionRequestFrame {
                endpoint_id: Some(endpoint_id.to_string()),
                endpoint_name: Some(hostname.to_string()),
                mediums: vec![Medium::WifiLan as i32],
                endpoint_info: Some(endpoint_info),
            }),
            ..Default::default()
        })
        .await
    }

    pub fn unmarshal_conn_response(&self, msg: &[u8]) -> Result<bool> {
        let frame = unmarshal_offline_frame(msg)?;
        if frame.frame_type() != FrameType::ConnectionResponse {
            return Err(Error::InvalidMessage);
        }
        let Some(response) = frame.connection_response else {
            return Err(Error::InvalidMessage);
        };

        Ok(response.response == Some(ResponseStatus::Accept as i32))
    }

    pub async fn send_conn_response(&mut self, is_accepted: bool) -> Result<()> {
        let response = if is_accepted {
            ResponseStatus::Accept
        } else {
            ResponseStatus::Reject
        };

        self.write_offline_frame(&connections::V1Frame {
            r#type: Some(FrameType::ConnectionResponse as i32),
            connection_response: Some(ConnectionResponseFrame {
                status: None,
                response: Some(response as i32),
                os_info: Some(OsInfo {
                    r#type: Some(local_os_type() as i32),
                }),
            }),
            ..Default::default()
        })
        .await
    }

    pub fn validate_paired_key_encryption(&self, msg: &[u8]) -> Result<()> {
        let frame = unmarshal_sharing_frame(msg)?;
        let valid = frame.frame_type() == SharingFrameType::PairedKeyEncryption
            && frame
                .paired_key_encryption
                .as_ref()
                .is_some_and(|f| !f.signed_data.as_deref().unwrap_or_default().is_empty());
        if !valid {
            return Err(Error::InvalidMessage);
        }

        Ok(())
    }

    /// No certificate store on either side, so the frame carries random
    /// bytes of the expected shape.
    pub async fn send_paired_key_encryption(&mut self) -> Result<()> {
        let secret_id_hash = random::bytes(self.random.as_ref(), 6);
        let signed_data = random::bytes(self.random.as_ref(), 72);

        self.write_secure_frame(&sharing::V1Frame {
            r#type: Some(SharingFrameType::PairedKeyEncryption as i32),
            paired_key_encryption: Some(sharing::PairedKeyEncryptionFrame {
                secret_id_hash: Some(secret_id_hash),
                signed_data: Some(signed_data),
            }),
            ..Default::default()
        })
        .await
    }

    pub fn validate_paired_key_result(&self, msg: &[u8]) -> Result<()> {
        let frame = unmarshal_sharing_frame(msg)?;
        let valid = frame.frame_type() == SharingFrameType::PairedKeyResult
            && frame.paired_key_result.as_ref().is_some_and(|f| {
                f.status == Some(sharing::paired_key_result_frame::Status::Unable as i32)
            });
        if !valid {
            return Err(Error::InvalidMessage);
        }

        Ok(())
    }

    pub async fn send_paired_key_result(&mut self) -> Result<()> {
        self.write_secure_frame(&sharing::V1Frame {
            r#type: Some(SharingFrameType::PairedKeyResult as i32),
            paired_key_result: Some(sharing::PairedKeyResultFrame {
                status: Some(sharing::paired_key_result_frame::Status::Unable as i32),
            }),
            ..Default::default()
        })
        .await
    }

    pub fn unmarshal_introduction(&self, msg: &[u8]) -> Result<Introduction> {
        let frame = unmarshal_sharing_frame(msg)?;
        if frame.frame_type() != SharingFrameType::Introduction {
            return Err(Error::InvalidMessage);
        }
        let Some(introduction) = frame.introduction else {
            return Err(Error::InvalidMessage);
        };

        if introduction.text_metadata.is_empty() && introduction.file_metadata.is_empty() {
            return Err(Error::InvalidMessage);
        }

        Ok(Introduction {
            text: map_text_metadata(&introduction.text_metadata),
            files: map_file_metadata(&introduction.file_metadata),
        })
    }

    pub async fn send_introduction(&mut self, introduction: &Introduction) -> Result<()> {
        let mut text_metadata = Vec::new();
        let mut file_metadata = Vec::with_capacity(introduction.files.len());

        for (payload_id, meta) in &introduction.files {
            file_metadata.push(sharing::FileMetadata {
                name: Some(meta.name.clone()),
                r#type: Some(proto_file_type(meta.kind) as i32),
                payload_id: Some(*payload_id),
                size: Some(meta.size),
                mime_type: Some(meta.mime_type.clone()),
                id: Some(self.random.next_i64()),
            });
        }
        if let Some(text) = &introduction.text {
            text_metadata.push(sharing::TextMetadata {
                r#type: Some(proto_text_type(text.meta.kind) as i32),
                text_title: Some(text.meta.title.clone()),
                payload_id: Some(text.payload_id),
                size: Some(text.meta.size),
                id: Some(self.random.next_i64()),
            });
        }

        self.write_secure_frame(&sharing::V1Frame {
            r#type: Some(SharingFrameType::Introduction as i32),
            introduction: Some(sharing::IntroductionFrame {
                file_metadata,
                text_metadata,
            }),
            ..Default::default()
        })
        .await
    }

    /// An inbound RESPONSE during the transfer setup must be an ACCEPT; the
    /// sender is asking us to start.
    pub fn validate_transfer_request(&self, msg: &[u8]) -> Result<()> {
        let frame = unmarshal_sharing_frame(msg)?;
        let valid = frame.frame_type() == SharingFrameType::Response
            && frame.connection_response.as_ref().is_some_and(|f| {
                f.status == Some(sharing::connection_response_frame::Status::Accept as i32)
            });
        if !valid {
            return Err(Error::InvalidMessage);
        }

        Ok(())
    }

    pub async fn send_transfer_request(&mut self) -> Result<()> {
        self.write_secure_frame(&sharing::V1Frame {
            r#type: Some(SharingFrameType::Response as i32),
            connection_response: Some(sharing::ConnectionResponseFrame {
                status: Some(sharing::connection_response_frame::Status::Accept as i32),
            }),
            ..Default::default()
        })
        .await
    }

    pub fn unmarshal_transfer_response(&self, msg: &[u8]) -> Result<bool> {
        let frame = unmarshal_sharing_frame(msg)?;
        if frame.frame_type() != SharingFrameType::Response {
            return Err(Error::InvalidMessage);
        }
        let Some(response) = frame.connection_response else {
            return Err(Error::InvalidMessage);
        };

        Ok(response.status == Some(sharing::connection_response_frame::Status::Accept as i32))
    }

    pub async fn send_transfer_response(&mut self, is_accepted: bool) -> Result<()> {
        let status = if is_accepted {
            sharing::connection_response_frame::Status::Accept
        } else {
            sharing::connection_response_frame::Status::Reject
        };

        self.write_secure_frame(&sharing::V1Frame {
            r#type: Some(SharingFrameType::Response as i32),
            connection_response: Some(sharing::ConnectionResponseFrame {
                status: Some(status as i32),
            }),
            ..Default::default()
        })
        .await
    }
}

fn local_os_type() -> connections::os_info::OsType {
    if cfg!(target_os = "windows") {
        connections::os_info::OsType::Windows
    } else if cfg!(target_os = "android") {
        connections::os_info::OsType::Android
    } else if cfg!(any(target_os = "macos", target_os = "ios")) {
        connections::os_info::OsType::Apple
    } else {
        connections::os_info::OsType::Linux
    }
}

fn map_text_metadata(metadata: &[sharing::TextMetadata]) -> Option<IntroducedText> {
    let first = metadata.first()?;

    let kind = match first.r#type.and_then(|t| sharing::text_metadata::Type::try_from(t).ok()) {
        Some(sharing::text_metadata::Type::Text) => TextType::Text,
        Some(sharing::text_metadata::Type::Url) => TextType::Url,
        Some(sharing::text_metadata::Type::Address) => TextType::Address,
        Some(sharing::text_metadata::Type::PhoneNumber) => TextType::PhoneNumber,
        _ => TextType::Unknown,
    };

    Some(IntroducedText {
        meta: TextMeta {
            kind,
            title: first.text_title.clone().unwrap_or_default(),
            size: first.size.unwrap_or_default(),
        },
        payload_id: first.payload_id.unwrap_or_default(),
    })
}

fn map_file_metadata(metadata: &[sharing::FileMetadata]) -> HashMap<i64, FileMeta> {
    metadata
        .iter()
        .map(|file| {
            let kind = match file
                .r#type
                .and_then(|t| sharing::file_metadata::Type::try_from(t).ok())
            {
                Some(sharing::file_metadata::Type::Image) => FileType::Image,
                Some(sharing::file_metadata::Type::Video) => FileType::Video,
                Some(sharing::file_metadata::Type::App) => FileType::App,
                Some(sharing::file_metadata::Type::Audio) => FileType::Audio,
                _ => FileType::Unknown,
            };

            (
                file.payload_id.unwrap_or_default(),
                FileMeta {
                    kind,
                    name: file.name.clone().unwrap_or_default(),
                    mime_type: file.mime_type.clone().unwrap_or_default(),
                    size: file.size.unwrap_or_default(),
                },
            )
        })
        .collect()
}

fn proto_text_type(kind: TextType) -> sharing::text_metadata::Type {
    match kind {
        TextType::Text => sharing::text_metadata::Type::Text,
        TextType::Url => sharing::text_metadata::Type::Url,
        TextType::Address => sharing::text_metadata::Type::Address,
        TextType::PhoneNumber => sharing::text_metadata::Type::PhoneNumber,
        TextType::Unknown => sharing::text_metadata::Type::Unknown,
    }
}

fn proto_file_type(kind: FileType) -> sharing::file_metadata::Type {
    match kind {
        FileType::Image => sharing::file_metadata::Type::Image,
        FileType::Video => sharing::file_metadata::Type::Video,
        FileType::App => sharing::file_metadata::Type::App,
        FileType::Audio => sharing::file_metadata::Type::Audio,
        FileType::Unknown => sharing::file_metadata::Type::Unknown,
    }
}
