//! Client side: discover nearby servers and push transfers to them.

mod conn;

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpStream;
use tokio::sync::mpsc;

use crate::endpoint::{self, EndpointInfo};
use crate::error::{Error, Result};
use crate::payload::{DeviceType, OutgoingFile, TextType};
use crate::random::{CryptRandom, Random};
use crate::server::MDNS_SERVICE_TYPE;
use conn::{Connection, ConnectionConfig};

/// A discovered (or directly addressed) server.
#[derive(Debug, Clone)]
pub struct ServerInstance {
    pub addr: SocketAddr,
    pub hostname: String,
    /// Endpoint id decoded from the mDNS instance name, when present.
    pub endpoint: Option<[u8; 4]>,
}

impl ServerInstance {
    /// Addresses a server directly, bypassing discovery.
    pub fn new(addr: SocketAddr, hostname: impl Into<String>) -> Self {
        Self {
            addr,
            hostname: hostname.into(),
            endpoint: None,
        }
    }
}

#[derive(Default)]
pub struct ClientBuilder {
    device: DeviceType,
    random: Option<Arc<dyn Random>>,
}

impl ClientBuilder {
    pub fn new() -> Self {
        Self::default()
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

    /// `endpoint_id` is the 4-byte id this client advertises in its
    /// connection requests; pair it with a pinned server endpoint when you
    /// run both sides.
    pub fn build(self, endpoint_id: impl Into<String>) -> Result<Client> {
        Ok(Client {
            endpoint_id: endpoint_id.into(),
            device: self.device,
            random: self.random.unwrap_or_else(|| Arc::new(CryptRandom)),
        })
    }
}

/// Discovers servers and manages outbound transfer connections.
pub struct Client {
    endpoint_id: String,
    device: DeviceType,
    random: Arc<dyn Random>,
}

impl Client {
    /// Browses for nearby servers until the returned receiver is dropped.
    pub fn list_servers(&self) -> Result<mpsc::Receiver<ServerInstance>> {
        let browser = mdns_core::Browser::browse(MDNS_SERVICE_TYPE)?;
        let (tx, rx) = mpsc::channel(64);

        tokio::spawn(async move {
            while let Some(service) = browser.recv().await {
                let Some(addr) = service.addresses.iter().find(|a| a.is_ipv4()).copied() else {
                    continue;
                };

                // The TXT record carries the advertised endpoint info; fall
                // back to the mDNS hostname when it is absent or mangled.
                let hostname = service
                    .txt
                    .iter()
                    .find(|(key, _)| key == "n")
                    .and_then(|(_, value)| EndpointInfo::decode_base64(value).ok())
                    .map(|info| info.hostname)
                    .unwrap_or_else(|| service.host_name.clone());

                let instance = ServerInstance {
                    addr: SocketAddr::new(addr, service.port),
                    hostname,
                    endpoint: endpoint::decode_instance_name(&service.instance_name).ok(),
                };
                if tx.send(instance).await.is_err() {
                    break;
                }
            }
        });

        Ok(rx)
    }

    /// Establishes a connection to the server and sends the text.
    pub async fn send_text(
        &self,
        instance: &ServerInstance,
        text: &str,
        kind: TextType,
    ) -> Result<()> {
        if kind.is_unknown() {
            return Err(Error::InvalidTextType);
        }

        let mut conn = self.connect(instance).await?;
        let result = async {
            conn.setup_transfer().await?;
            conn.send_text(text, kind).await
        }
        .await;
        conn.disconnect().await;

        result
    }

    /// Establishes a connection to the server and streams every file.
    pub async fn send_files(
        &self,
        instance: &ServerInstance,
        files: Vec<OutgoingFile>,
    ) -> Result<()> {
        if files.is_empty() {
            return Ok(());
        }

        let mut conn = self.connect(instance).await?;
        let result = async {
            conn.setup_transfer().await?;
            conn.send_files(files).await
        }
        .await;
        conn.disconnect().await;

        result
    }

    async fn connect(&self, instance: &ServerInstance) -> Result<Connection> {
        let stream = TcpStream::connect(instance.addr).await?;

        Ok(Connection::new(
            stream,
            ConnectionConfig {
                endpoint_id: self.endpoint_id.clone(),
                hostname: instance.hostname.clone(),
                device: self.device,
            },
            self.random.clone(),
        ))
    }
}
