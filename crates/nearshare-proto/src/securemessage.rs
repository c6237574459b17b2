//! `securemessage` namespace: the outer signed envelope and key containers.

/// Outermost encrypted-channel message: serialized [`HeaderAndBody`] plus an
/// HMAC-SHA256 signature over those exact bytes.
#[derive(Clone, PartialEq, prost::Message)]
pub struct SecureMessage {
    #[prost(bytes = "vec", required, tag = "1")]
    pub header_and_body: Vec<u8>,
    #[prost(bytes = "vec", required, tag = "2")]
    pub signature: Vec<u8>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct Header {
    #[prost(enumeration = "SigScheme", required, tag = "1")]
    pub signature_scheme: i32,
    #[prost(enumeration = "EncScheme", required, tag = "2")]
    pub encryption_scheme: i32,
    #[prost(bytes = "vec", optional, tag = "3")]
    pub verification_key_id: Option<Vec<u8>>,
    #[prost(bytes = "vec", optional, tag = "4")]
    pub decryption_key_id: Option<Vec<u8>>,
    /// AES-CBC initialization vector, 16 bytes.
    #[prost(bytes = "vec", optional, tag = "5")]
    pub iv: Option<Vec<u8>>,
    /// Serialized [`super::securegcm::GcmMetadata`].
    #[prost(bytes = "vec", optional, tag = "6")]
    pub public_metadata: Option<Vec<u8>>,
    #[prost(uint32, optional, tag = "7")]
    pub associated_data_length: Option<u32>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct HeaderAndBody {
    #[prost(message, required, tag = "1")]
    pub header: Header,
    /// Ciphertext of a serialized `DeviceToDeviceMessage`.
    #[prost(bytes = "vec", required, tag = "2")]
    pub body: Vec<u8>,
}

/// NIST P-256 point with big-endian affine coordinates. Encoders left-pad
/// x/y to 33 bytes; decoders must tolerate the leading zero.
#[derive(Clone, PartialEq, prost::Message)]
pub struct EcP256PublicKey {
    #[prost(bytes = "vec", required, tag = "1")]
    pub x: Vec<u8>,
    #[prost(bytes = "vec", required, tag = "2")]
    pub y: Vec<u8>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct GenericPublicKey {
    #[prost(enumeration = "PublicKeyType", required, tag = "1")]
    pub r#type: i32,
    #[prost(message, optional, tag = "2")]
    pub ec_p256_public_key: Option<EcP256PublicKey>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum SigScheme {
    HmacSha256 = 1,
    EcdsaP256Sha256 = 2,
    Rsa2048Sha256 = 3,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum EncScheme {
    None = 1,
    Aes256Cbc = 2,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum PublicKeyType {
    EcP256 = 1,
    Rsa2048 = 2,
    Dh2048Modp = 3,
}
