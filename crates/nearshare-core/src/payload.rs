//! Types shared at the API boundary: payload metadata, delivered payloads,
//! and the callbacks a server is built around.

use std::sync::Arc;

use tokio::io::{AsyncRead, DuplexStream};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextType {
    Unknown,
    Text,
    Url,
    Address,
    PhoneNumber,
}

impl TextType {
    pub fn is_unknown(self) -> bool {
        self == TextType::Unknown
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    Unknown,
    Image,
    Video,
    App,
    Audio,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeviceType {
    #[default]
    Unknown,
    Phone,
    Tablet,
    Laptop,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextMeta {
    pub kind: TextType,
    /// Preview shown before the transfer is accepted; the sender truncates
    /// it, so it is not necessarily the full text.
    pub title: String,
    pub size: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMeta {
    pub kind: FileType,
    pub name: String,
    pub mime_type: String,
    pub size: i64,
}

/// A completed inbound text transfer.
#[derive(Debug, Clone)]
pub struct TextPayload {
    pub meta: TextMeta,
    pub text: String,
}

/// An inbound file transfer, handed over on its first chunk. The reader end
/// yields exactly `meta.size` bytes; draining it slowly backpressures the
/// sender.
#[derive(Debug)]
pub struct FilePayload {
    pub meta: FileMeta,
    pub content: DuplexStream,
}

/// An outbound file: metadata plus the byte source to stream from. The
/// library never touches the file system; callers supply any reader.
pub struct OutgoingFile {
    pub meta: FileMeta,
    pub content: Box<dyn AsyncRead + Send + Unpin>,
}

/// Decides whether an offered transfer is accepted. Receives the text
/// metadata (if any), the offered file metadata, and the pin derived from
/// the handshake for out-of-band confirmation.
///
/// Callbacks run on the connection task: a slow callback stalls that
/// transfer. Offload to your own task if you need to block on UI.
pub type AuthCallback = Arc<dyn Fn(Option<&TextMeta>, &[FileMeta], u16) -> bool + Send + Sync>;

pub type TextCallback = Arc<dyn Fn(TextPayload) + Send + Sync>;

pub type FileCallback = Arc<dyn Fn(FilePayload) + Send + Sync>;
