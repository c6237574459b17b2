//! Quick-Share-compatible peer-to-peer file and text sharing.
//!
//! A host advertises itself on the local network and accepts inbound
//! transfers, or discovers peers and initiates outbound ones. Transfers
//! carry a text payload or file payloads over an encrypted channel derived
//! with the UKEY2 handshake; a short pin lets both humans confirm they are
//! talking to each other.
//!
//! [`Server`] and [`Client`] are the entry points; [`adapter::Adapter`]
//! exposes the underlying per-connection protocol operations for tests and
//! lower-level integrations.

pub mod adapter;
pub mod cipher;
pub mod client;
pub mod endpoint;
pub mod error;
pub mod payload;
pub mod random;
pub mod server;

// Re-export commonly used types
pub use client::{Client, ClientBuilder, ServerInstance};
pub use error::{Error, Result};
pub use payload::{
    AuthCallback, DeviceType, FileCallback, FileMeta, FilePayload, FileType, OutgoingFile,
    TextCallback, TextMeta, TextPayload, TextType,
};
pub use server::{Server, ServerBuilder};
