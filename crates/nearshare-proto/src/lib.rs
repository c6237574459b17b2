//! Vendored wire schemas for the Quick Share connection protocol.
//!
//! Four proto2 namespaces, kept as hand-maintained prost structs so the
//! workspace builds without a protoc toolchain:
//!
//! - [`securemessage`]: the signed-and-encrypted envelope (`SecureMessage`,
//!   `HeaderAndBody`, public key containers).
//! - [`securegcm`]: the UKEY2 handshake messages and the device-to-device
//!   plaintext wrapper.
//! - [`connections`]: the Nearby Connections offline frames (connection
//!   setup, keep-alives, payload transfer chunks).
//! - [`sharing`]: the sharing-layer frames carried inside BYTES payloads
//!   (pairing, introduction, accept/reject).
//!
//! Field tags follow the public wire formats; do not renumber.

pub mod connections;
pub mod securegcm;
pub mod securemessage;
pub mod sharing;
