use serde::{Deserialize, Serialize};
use std::net::IpAddr;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceAnnouncement {
    /// e.g. "_FC9F5ED42C8A._tcp.local."
    pub service_type: String,
    /// Encoded endpoint instance name.
    pub instance_name: String,
    /// e.g. "myhost.local."
    pub host_name: String,
    pub port: u16,
    pub txt: Vec<(String, String)>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveredService {
    pub fullname: String,
    pub instance_name: String,
    pub host_name: String,
    pub port: u16,
    pub addresses: Vec<IpAddr>,
    pub txt: Vec<(String, String)>,
}
