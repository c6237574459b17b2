//! Byte layouts correlating mDNS records with the wire protocol: the
//! endpoint-info blob and the 10-byte service instance name.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;

use crate::error::{Error, Result};
use crate::payload::DeviceType;
use crate::random::{self, Random};

/// Marker bytes of the instance name: PCP prefix, then the service id.
const PCP: u8 = 0x23;
const SERVICE_ID: [u8; 3] = [0xFC, 0x9F, 0x5E];

/// Endpoint info layout: `device_type << 1` (low bit flags discoverable),
/// 16 random bytes, hostname length, hostname.
pub fn craft_endpoint_info(r: &dyn Random, hostname: &str, device: DeviceType) -> Vec<u8> {
    let hostname = hostname.as_bytes();
    let mut buf = Vec::with_capacity(hostname.len() + 18);

    buf.push((device_bits(device)) << 1);
    buf.extend_from_slice(&random::bytes(r, 16));
    buf.push(hostname.len() as u8);
    buf.extend_from_slice(hostname);

    buf
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointInfo {
    pub device: DeviceType,
    pub hostname: String,
}

impl EndpointInfo {
    /// Decodes the base64 raw-URL form used in mDNS TXT records.
    pub fn decode_base64(encoded: &str) -> Result<Self> {
        let raw = URL_SAFE_NO_PAD
            .decode(encoded)
            .map_err(|_| Error::InvalidEndpoint)?;
        Self::decode(&raw)
    }

    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() < 18 {
            return Err(Error::InvalidEndpoint);
        }

        let hostname_len = buf[17] as usize;
        let hostname = buf
            .get(18..18 + hostname_len)
            .ok_or(Error::InvalidEndpoint)?;

        Ok(Self {
            device: device_from_bits(buf[0] >> 1),
            hostname: String::from_utf8_lossy(hostname).into_owned(),
        })
    }
}

/// The mDNS instance name: `0x23`, the 4-byte endpoint id, the service id,
/// two zero bytes, base64 raw-URL encoded.
pub fn instance_name(endpoint: &[u8; 4]) -> String {
    let mut name = [0u8; 10];
    name[0] = PCP;
    name[1..5].copy_from_slice(endpoint);
    name[5..8].copy_from_slice(&SERVICE_ID);

    URL_SAFE_NO_PAD.encode(name)
}

pub fn decode_instance_name(name: &str) -> Result<[u8; 4]> {
    let raw = URL_SAFE_NO_PAD
        .decode(name)
        .map_err(|_| Error::InvalidEndpoint)?;
    if raw.len() != 10 || raw[0] != PCP || raw[5..8] != SERVICE_ID {
        return Err(Error::InvalidEndpoint);
    }

    let mut endpoint = [0u8; 4];
    endpoint.copy_from_slice(&raw[1..5]);
    Ok(endpoint)
}

fn device_bits(device: DeviceType) -> u8 {
    match device {
        DeviceType::Unknown => 0,
        DeviceType::Phone => 1,
        DeviceType::Tablet => 2,
        DeviceType::Laptop => 3,
    }
}

fn device_from_bits(bits: u8) -> DeviceType {
    match bits {
        1 => DeviceType::Phone,
        2 => DeviceType::Tablet,
        3 => DeviceType::Laptop,
        _ => DeviceType::Unknown,
    }
}
