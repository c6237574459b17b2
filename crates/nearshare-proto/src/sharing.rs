//! `sharing` namespace: the application-layer frames carried inside BYTES
//! payloads once the channel is encrypted.

#[derive(Clone, PartialEq, prost::Message)]
pub struct Frame {
    #[prost(enumeration = "frame::Version", optional, tag = "1")]
    pub version: Option<i32>,
    #[prost(message, optional, tag = "2")]
    pub v1: Option<V1Frame>,
}

pub mod frame {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
    #[repr(i32)]
    pub enum Version {
        UnknownVersion = 0,
        V1 = 1,
    }
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct V1Frame {
    #[prost(enumeration = "v1_frame::FrameType", optional, tag = "1")]
    pub r#type: Option<i32>,
    #[prost(message, optional, tag = "2")]
    pub introduction: Option<IntroductionFrame>,
    #[prost(message, optional, tag = "3")]
    pub connection_response: Option<ConnectionResponseFrame>,
    #[prost(message, optional, tag = "4")]
    pub paired_key_encryption: Option<PairedKeyEncryptionFrame>,
    #[prost(message, optional, tag = "5")]
    pub paired_key_result: Option<PairedKeyResultFrame>,
}

pub mod v1_frame {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
    #[repr(i32)]
    pub enum FrameType {
        UnknownFrameType = 0,
        Introduction = 1,
        Response = 2,
        PairedKeyEncryption = 3,
        PairedKeyResult = 4,
        CertificateInfo = 5,
        Cancel = 6,
    }
}

impl V1Frame {
    pub fn frame_type(&self) -> v1_frame::FrameType {
        self.r#type
            .and_then(|t| v1_frame::FrameType::try_from(t).ok())
            .unwrap_or(v1_frame::FrameType::UnknownFrameType)
    }
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct IntroductionFrame {
    #[prost(message, repeated, tag = "1")]
    pub file_metadata: Vec<FileMetadata>,
    #[prost(message, repeated, tag = "2")]
    pub text_metadata: Vec<TextMetadata>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct FileMetadata {
    #[prost(string, optional, tag = "1")]
    pub name: Option<String>,
    #[prost(enumeration = "file_metadata::Type", optional, tag = "2")]
    pub r#type: Option<i32>,
    /// Ties the metadata entry to its PAYLOAD_TRANSFER chunks.
    #[prost(int64, optional, tag = "3")]
    pub payload_id: Option<i64>,
    #[prost(int64, optional, tag = "4")]
    pub size: Option<i64>,
    #[prost(string, optional, tag = "5")]
    pub mime_type: Option<String>,
    #[prost(int64, optional, tag = "6")]
    pub id: Option<i64>,
}

pub mod file_metadata {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
    #[repr(i32)]
    pub enum Type {
        Unknown = 0,
        Image = 1,
        Video = 2,
        App = 3,
        Audio = 4,
    }
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct TextMetadata {
    #[prost(enumeration = "text_metadata::Type", optional, tag = "1")]
    pub r#type: Option<i32>,
    #[prost(string, optional, tag = "2")]
    pub text_title: Option<String>,
    #[prost(int64, optional, tag = "3")]
    pub payload_id: Option<i64>,
    #[prost(int64, optional, tag = "4")]
    pub size: Option<i64>,
    #[prost(int64, optional, tag = "5")]
    pub id: Option<i64>,
}

pub mod text_metadata {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
    #[repr(i32)]
    pub enum Type {
        Unknown = 0,
        Text = 1,
        Url = 2,
        Address = 3,
        PhoneNumber = 4,
    }
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct PairedKeyEncryptionFrame {
    #[prost(bytes = "vec", optional, tag = "1")]
    pub secret_id_hash: Option<Vec<u8>>,
    #[prost(bytes = "vec", optional, tag = "2")]
    pub signed_data: Option<Vec<u8>>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct PairedKeyResultFrame {
    #[prost(enumeration = "paired_key_result_frame::Status", optional, tag = "1")]
    pub status: Option<i32>,
}

pub mod paired_key_result_frame {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
    #[repr(i32)]
    pub enum Status {
        Unknown = 0,
        Success = 1,
        Fail = 2,
        Unable = 3,
    }
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct ConnectionResponseFrame {
    #[prost(
        enumeration = "connection_response_frame::Status",
        optional,
        tag = "1"
    )]
    pub status: Option<i32>,
}

pub mod connection_response_frame {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
    #[repr(i32)]
    pub enum Status {
        Unknown = 0,
        Accept = 1,
        Reject = 2,
        NotEnoughSpace = 3,
        UnsupportedAttachmentType = 4,
        TimedOut = 5,
    }
}
