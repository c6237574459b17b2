//! `connections` namespace: Nearby Connections offline frames.

#[derive(Clone, PartialEq, prost::Message)]
pub struct OfflineFrame {
    #[prost(enumeration = "offline_frame::Version", optional, tag = "1")]
    pub version: Option<i32>,
    #[prost(message, optional, tag = "2")]
    pub v1: Option<V1Frame>,
}

pub mod offline_frame {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
    #[repr(i32)]
    pub enum Version {
        UnknownVersion = 0,
        V1 = 1,
    }
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct V1Frame {
    #[prost(enumeration = "v1_frame::FrameType", optional, tag = "1")]
    pub r#type: Option<i32>,
    #[prost(message, optional, tag = "2")]
    pub connection_request: Option<ConnectionRequestFrame>,
    #[prost(message, optional, tag = "3")]
    pub connection_response: Option<ConnectionResponseFrame>,
    #[prost(message, optional, tag = "4")]
    pub payload_transfer: Option<PayloadTransferFrame>,
    #[prost(message, optional, tag = "6")]
    pub keep_alive: Option<KeepAliveFrame>,
    #[prost(message, optional, tag = "7")]
    pub disconnection: Option<DisconnectionFrame>,
}

pub mod v1_frame {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
    #[repr(i32)]
    pub enum FrameType {
        UnknownFrameType = 0,
        ConnectionRequest = 1,
        ConnectionResponse = 2,
        PayloadTransfer = 3,
        BandwidthUpgradeNegotiation = 4,
        KeepAlive = 5,
        Disconnection = 6,
        PairedKeyEncryption = 7,
    }
}

impl V1Frame {
    pub fn frame_type(&self) -> v1_frame::FrameType {
        self.r#type
            .and_then(|t| v1_frame::FrameType::try_from(t).ok())
            .unwrap_or(v1_frame::FrameType::UnknownFrameType)
    }
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct ConnectionRequestFrame {
    #[prost(string, optional, tag = "1")]
    pub endpoint_id: Option<String>,
    #[prost(string, optional, tag = "2")]
    pub endpoint_name: Option<String>,
    #[prost(
        enumeration = "connection_request_frame::Medium",
        repeated,
        packed = "false",
        tag = "5"
    )]
    pub mediums: Vec<i32>,
    #[prost(bytes = "vec", optional, tag = "6")]
    pub endpoint_info: Option<Vec<u8>>,
}

pub mod connection_request_frame {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
    #[repr(i32)]
    pub enum Medium {
        UnknownMedium = 0,
        Mdns = 1,
        Bluetooth = 2,
        WifiHotspot = 3,
        Ble = 4,
        WifiLan = 5,
        WifiAware = 6,
        Nfc = 7,
        WifiDirect = 8,
        WebRtc = 9,
    }
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct ConnectionResponseFrame {
    #[prost(int32, optional, tag = "1")]
    pub status: Option<i32>,
    #[prost(
        enumeration = "connection_response_frame::ResponseStatus",
        optional,
        tag = "3"
    )]
    pub response: Option<i32>,
    #[prost(message, optional, tag = "4")]
    pub os_info: Option<OsInfo>,
}

pub mod connection_response_frame {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
    #[repr(i32)]
    pub enum ResponseStatus {
        UnknownResponseStatus = 0,
        Accept = 1,
        Reject = 2,
    }
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct OsInfo {
    #[prost(enumeration = "os_info::OsType", optional, tag = "1")]
    pub r#type: Option<i32>,
}

pub mod os_info {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
    #[repr(i32)]
    pub enum OsType {
        UnknownOsType = 0,
        Android = 1,
        ChromeOs = 2,
        Windows = 3,
        Apple = 4,
        Linux = 100,
    }
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct PayloadTransferFrame {
    #[prost(
        enumeration = "payload_transfer_frame::PacketType",
        optional,
        tag = "1"
    )]
    pub packet_type: Option<i32>,
    #[prost(message, optional, tag = "2")]
    pub payload_header: Option<payload_transfer_frame::PayloadHeader>,
    #[prost(message, optional, tag = "3")]
    pub payload_chunk: Option<payload_transfer_frame::PayloadChunk>,
}

pub mod payload_transfer_frame {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
    #[repr(i32)]
    pub enum PacketType {
        UnknownPacketType = 0,
        Data = 1,
        Control = 2,
    }

    #[derive(Clone, PartialEq, prost::Message)]
    pub struct PayloadHeader {
        #[prost(int64, optional, tag = "1")]
        pub id: Option<i64>,
        #[prost(enumeration = "payload_header::PayloadType", optional, tag = "2")]
        pub r#type: Option<i32>,
        #[prost(int64, optional, tag = "3")]
        pub total_size: Option<i64>,
        #[prost(bool, optional, tag = "4")]
        pub is_sensitive: Option<bool>,
        #[prost(string, optional, tag = "5")]
        pub file_name: Option<String>,
    }

    pub mod payload_header {
        #[derive(
            Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration,
        )]
        #[repr(i32)]
        pub enum PayloadType {
            UnknownPayloadType = 0,
            Bytes = 1,
            File = 2,
            Stream = 3,
        }
    }

    #[derive(Clone, PartialEq, prost::Message)]
    pub struct PayloadChunk {
        /// Bit 0 marks the final chunk of the payload.
        #[prost(int32, optional, tag = "1")]
        pub flags: Option<i32>,
        #[prost(int64, optional, tag = "2")]
        pub offset: Option<i64>,
        #[prost(bytes = "vec", optional, tag = "3")]
        pub body: Option<Vec<u8>>,
    }
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct KeepAliveFrame {
    #[prost(bool, optional, tag = "1")]
    pub ack: Option<bool>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct DisconnectionFrame {
    #[prost(bool, optional, tag = "1")]
    pub request_safe_to_disconnect: Option<bool>,
    #[prost(bool, optional, tag = "2")]
    pub ack_safe_to_disconnect: Option<bool>,
}
