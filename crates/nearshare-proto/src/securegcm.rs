//! `securegcm` namespace: UKEY2 handshake messages and the device-to-device
//! plaintext wrapper.

#[derive(Clone, PartialEq, prost::Message)]
pub struct Ukey2Message {
    #[prost(enumeration = "ukey2_message::Type", optional, tag = "1")]
    pub message_type: Option<i32>,
    #[prost(bytes = "vec", optional, tag = "2")]
    pub message_data: Option<Vec<u8>>,
}

pub mod ukey2_message {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
    #[repr(i32)]
    pub enum Type {
        UnknownDoNotUse = 0,
        Alert = 1,
        ClientInit = 2,
        ServerInit = 3,
        ClientFinish = 4,
    }
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct Ukey2Alert {
    #[prost(enumeration = "ukey2_alert::AlertType", optional, tag = "1")]
    pub r#type: Option<i32>,
    #[prost(string, optional, tag = "2")]
    pub error_message: Option<String>,
}

pub mod ukey2_alert {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
    #[repr(i32)]
    pub enum AlertType {
        BadMessage = 1,
        BadMessageType = 2,
        IncorrectMessage = 3,
        BadMessageData = 4,
        BadVersion = 5,
        BadRandom = 6,
        BadHandshakeCipher = 7,
        BadNextProtocol = 8,
        BadPublicKey = 9,
        InternalError = 100,
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum Ukey2HandshakeCipher {
    Reserved = 0,
    P256Sha512 = 100,
    Curve25519Sha512 = 200,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct Ukey2ClientInit {
    #[prost(int32, optional, tag = "1")]
    pub version: Option<i32>,
    #[prost(bytes = "vec", optional, tag = "2")]
    pub random: Option<Vec<u8>>,
    /// One commitment per cipher the client is willing to speak; the
    /// commitment binds the forthcoming client-finish bytes.
    #[prost(message, repeated, tag = "3")]
    pub cipher_commitments: Vec<ukey2_client_init::CipherCommitment>,
    #[prost(string, optional, tag = "4")]
    pub next_protocol: Option<String>,
}

pub mod ukey2_client_init {
    #[derive(Clone, PartialEq, prost::Message)]
    pub struct CipherCommitment {
        #[prost(enumeration = "super::Ukey2HandshakeCipher", optional, tag = "1")]
        pub handshake_cipher: Option<i32>,
        #[prost(bytes = "vec", optional, tag = "2")]
        pub commitment: Option<Vec<u8>>,
    }
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct Ukey2ServerInit {
    #[prost(int32, optional, tag = "1")]
    pub version: Option<i32>,
    #[prost(bytes = "vec", optional, tag = "2")]
    pub random: Option<Vec<u8>>,
    #[prost(enumeration = "Ukey2HandshakeCipher", optional, tag = "3")]
    pub handshake_cipher: Option<i32>,
    /// Serialized `securemessage.GenericPublicKey`.
    #[prost(bytes = "vec", optional, tag = "4")]
    pub public_key: Option<Vec<u8>>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct Ukey2ClientFinished {
    /// Serialized `securemessage.GenericPublicKey`.
    #[prost(bytes = "vec", optional, tag = "1")]
    pub public_key: Option<Vec<u8>>,
}

/// Inner plaintext of the encrypted channel: a per-direction monotonic
/// sequence number plus an opaque serialized offline frame.
#[derive(Clone, PartialEq, prost::Message)]
pub struct DeviceToDeviceMessage {
    #[prost(int32, optional, tag = "1")]
    pub sequence_number: Option<i32>,
    #[prost(bytes = "vec", optional, tag = "2")]
    pub message: Option<Vec<u8>>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct GcmMetadata {
    #[prost(enumeration = "Type", required, tag = "1")]
    pub r#type: i32,
    #[prost(int32, optional, tag = "2")]
    pub version: Option<i32>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum Type {
    Enrollment = 0,
    Tickle = 1,
    TxRequest = 2,
    TxReply = 3,
    TxSyncRequest = 4,
    TxSyncReply = 5,
    TxPing = 6,
    DeviceInfoUpdate = 7,
    TxCancelRequest = 8,
    ProximityauthPairing = 10,
    Gcmv1IdentityAssertion = 11,
    DeviceToDeviceResponderHelloPayload = 12,
    DeviceToDeviceMessage = 13,
    DeviceProximityCallback = 14,
    UnlockKeySignedChallenge = 15,
}
