use std::sync::Arc;

use super::{Callbacks, Server};
use crate::error::{Error, Result};
use crate::payload::{AuthCallback, DeviceType, FileCallback, TextCallback};
use crate::random::{self, CryptRandom, Random};

/// Builds a [`Server`], propagating defaults for everything not provided:
/// OS hostname, an ephemeral port, a random 4-byte endpoint id, an unknown
/// device type and OS entropy.
#[derive(Default)]
pub struct ServerBuilder {
    hostname: Option<String>,
    port: Option<u16>,
    endpoint: Option<Vec<u8>>,
    device: DeviceType,
    random: Option<Arc<dyn Random>>,
}

impl ServerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Name of the server as it appears in peers' server lists.
    pub fn with_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = Some(hostname.into());
        self
    }

    /// Listening port; must be above 1024. Defaults to an ephemeral port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// mDNS endpoint id. Must be exactly 4 bytes and match the endpoint id
    /// a client dials, if you pin one.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into().into_bytes());
        self
    }

    pub fn with_device_type(mut self, device: DeviceType) -> Self {
        self.device = device;
        self
    }

    /// Randomness source override; tests pass a seeded one.
    pub fn with_random(mut self, random: Arc<dyn Random>) -> Self {
        self.random = Some(random);
        self
    }

    /// Builds the server around the three callbacks. The auth callback
    /// gates every inbound transfer; text and file callbacks receive the
    /// accepted payloads.
    pub fn build(
        self,
        auth_callback: AuthCallback,
        text_callback: TextCallback,
        file_callback: FileCallback,
    ) -> Result<Server> {
        if let Some(port) = self.port {
            if port <= 1024 {
                return Err(Error::InvalidPort);
            }
        }

        let random = self.random.unwrap_or_else(|| Arc::new(CryptRandom));

        let endpoint: [u8; 4] = match self.endpoint {
            Some(endpoint) => endpoint
                .as_slice()
                .try_into()
                .map_err(|_| Error::InvalidEndpoint)?,
            None => {
                let generated = random::alphanum(random.as_ref(), 4);
                generated
                    .as_slice()
                    .try_into()
                    .map_err(|_| Error::InvalidEndpoint)?
            }
        };

        let hostname = match self.hostname {
            Some(hostname) => hostname,
            None => gethostname::gethostname().to_string_lossy().into_owned(),
        };

        Ok(Server {
            hostname,
            endpoint,
            device: self.device,
            requested_port: self.port.unwrap_or(0),
            bound_port: 0,
            random,
            callbacks: Callbacks {
                auth: auth_callback,
                text: text_callback,
                file: file_callback,
            },
            listener: None,
            announcer: None,
        })
    }
}
