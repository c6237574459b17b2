//! Server side: advertise on the local network and accept inbound
//! transfers.

mod builder;
mod conn;
mod listener;

use std::sync::Arc;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;

pub use builder::ServerBuilder;

use crate::endpoint;
use crate::error::Result;
use crate::payload::{AuthCallback, DeviceType, FileCallback, TextCallback};
use crate::random::Random;
use listener::Listener;

/// mDNS service type of Quick Share endpoints.
pub const MDNS_SERVICE_TYPE: &str = "_FC9F5ED42C8A._tcp.local.";

#[derive(Clone)]
pub(crate) struct Callbacks {
    pub(crate) auth: AuthCallback,
    pub(crate) text: TextCallback,
    pub(crate) file: FileCallback,
}

/// Manages everything required to make this machine reachable by other
/// Quick Share clients: the mDNS registration and the TCP listener.
pub struct Server {
    hostname: String,
    endpoint: [u8; 4],
    device: DeviceType,
    requested_port: u16,
    bound_port: u16,
    random: Arc<dyn Random>,
    callbacks: Callbacks,

    listener: Option<Listener>,
    announcer: Option<mdns_core::Announcer>,
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("hostname", &self.hostname)
            .field("endpoint", &self.endpoint)
            .field("device", &self.device)
            .field("requested_port", &self.requested_port)
            .field("bound_port", &self.bound_port)
            .finish_non_exhaustive()
    }
}

impl Server {
    /// Binds the listener, registers the mDNS service and starts accepting
    /// connections. Non-blocking; connections run on their own tasks.
    pub async fn listen(&mut self) -> Result<()> {
        if self.listener.is_some() {
            return Ok(());
        }

        let mut listener = Listener::bind(
            self.requested_port,
            self.callbacks.clone(),
            self.random.clone(),
        )
        .await?;
        self.bound_port = listener.port();

        let endpoint_info = endpoint::craft_endpoint_info(
            self.random.as_ref(),
            &self.hostname,
            self.device,
        );
        let announcement = mdns_core::ServiceAnnouncement {
            service_type: MDNS_SERVICE_TYPE.to_string(),
            instance_name: endpoint::instance_name(&self.endpoint),
            host_name: format!("{}.local.", self.hostname),
            port: self.bound_port,
            txt: vec![("n".to_string(), URL_SAFE_NO_PAD.encode(endpoint_info))],
        };
        // Reachable by direct address even when the network swallows mDNS,
        // so registration failure is not fatal.
        match mdns_core::Announcer::register(announcement) {
            Ok(announcer) => self.announcer = Some(announcer),
            Err(err) => tracing::warn!(%err, "register mdns service"),
        }

        listener.start();
        self.listener = Some(listener);
        Ok(())
    }

    /// Gracefully shuts everything down: unregisters mDNS, stops accepting
    /// and waits for the per-connection tasks to drain.
    pub async fn stop(&mut self) -> Result<()> {
        self.announcer.take();
        if let Some(mut listener) = self.listener.take() {
            listener.stop().await;
        }

        Ok(())
    }

    /// The port the listener is bound to; meaningful after [`listen`].
    ///
    /// [`listen`]: Server::listen
    pub fn port(&self) -> u16 {
        self.bound_port
    }

    pub fn endpoint(&self) -> &[u8; 4] {
        &self.endpoint
    }
}
