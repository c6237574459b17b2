//! Thin mDNS layer: register a service instance and browse for peers.
//!
//! Wraps `mdns-sd` so the rest of the workspace never touches daemon
//! lifecycles or event plumbing directly.

mod announce;
mod discover;
mod model;

pub use announce::Announcer;
pub use discover::Browser;
pub use model::{DiscoveredService, ServiceAnnouncement};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("mdns daemon: {0}")]
    Daemon(#[from] mdns_sd::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
