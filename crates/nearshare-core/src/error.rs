use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Every failure the library surfaces, construction-time and runtime.
#[derive(Debug, Error)]
pub enum Error {
    // Builder validation.
    #[error("invalid port value")]
    InvalidPort,
    #[error("invalid endpoint")]
    InvalidEndpoint,
    #[error("invalid device type")]
    InvalidDeviceType,
    #[error("text type cannot be unknown")]
    InvalidTextType,
    #[error("invalid server instance")]
    InvalidServerInstance,

    // Framing and payload transfer.
    #[error("message is too long")]
    MessageTooLong,
    #[error("read message length")]
    InvalidMessageLength,
    #[error("fetch full message")]
    FetchFullMessage,
    #[error("chunk offset mismatch")]
    OffsetMismatch,
    /// Internal sentinel: a payload chunk was consumed but no complete
    /// application message is available yet. Never surfaces to users.
    #[error("transfer in progress")]
    TransferInProgress,
    #[error("invalid message")]
    InvalidMessage,
    #[error("invalid offline frame")]
    InvalidOfflineFrame,
    #[error("invalid sharing frame")]
    InvalidSharingFrame,

    // Cipher session.
    #[error("got unsupported encryption scheme")]
    InvalidEncryptionScheme,
    #[error("got unsupported signature scheme")]
    InvalidSignatureScheme,
    #[error("got invalid iv in header")]
    InvalidIv,
    #[error("got invalid signature for secure message")]
    InvalidSecureMessageSignature,
    #[error("cipher was not prepared for setup")]
    InvalidCipher,
    #[error("invalid sender init message")]
    InvalidSenderInit,
    #[error("invalid receiver init message")]
    InvalidReceiverInit,
    #[error("invalid sender public key")]
    InvalidSenderPublicKey,
    #[error("invalid receiver private key")]
    InvalidReceiverPrivateKey,

    // Connection lifecycle.
    #[error("connection was ended by peer")]
    ConnEndedByPeer,
    /// The transport reached end of stream, or the connection was cancelled
    /// locally (the reader treats both the same way).
    #[error("end of stream")]
    Eof,
    #[error("not a service message")]
    NotServiceMessage,
    #[error("text transfer was not expected")]
    TextTransferNotExpected,
    #[error("introduction cannot be empty")]
    IntroductionCantBeEmpty,
    #[error("transfer flagged as completed before all bytes arrived")]
    TransferNotComplete,
    #[error("internal error")]
    InternalError,

    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("decode frame: {0}")]
    Decode(#[from] prost::DecodeError),
    #[error("mdns: {0}")]
    Mdns(#[from] mdns_core::Error),
}
