//! UKEY2 handshake messages: send and validate pairs for client init,
//! client finish and server init.
//!
//! Both sides hand their init message to the cipher exactly as it appears
//! on the wire, since those bytes feed the key-derivation info.

use p256::elliptic_curve::sec1::ToEncodedPoint;
use p256::SecretKey;
use prost::Message;
use rand::rngs::OsRng;
use sha2::{Digest, Sha512};
use tokio::io::{AsyncRead, AsyncWrite};

use nearshare_proto::securegcm::ukey2_client_init::CipherCommitment;
use nearshare_proto::securegcm::ukey2_message::Type as UkeyMessageType;
use nearshare_proto::securegcm::{
    Ukey2ClientFinished, Ukey2ClientInit, Ukey2HandshakeCipher, Ukey2Message, Ukey2ServerInit,
};
use nearshare_proto::securemessage::{EcP256PublicKey, GenericPublicKey, PublicKeyType};

use super::Adapter;
use crate::error::{Error, Result};
use crate::random;

const TARGET_CIPHER: Ukey2HandshakeCipher = Ukey2HandshakeCipher::P256Sha512;
const NEXT_PROTOCOL: &str = "AES_256_CBC-HMAC_SHA256";

impl<S> Adapter<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Server side: checks the client offered `P256_SHA512` and stores the
    /// raw init bytes in the cipher.
    pub fn validate_client_init(&mut self, msg: &[u8]) -> Result<()> {
        let wrapper = Ukey2Message::decode(msg)?;
        if wrapper.message_type() != UkeyMessageType::ClientInit {
            return Err(Error::InvalidMessage);
        }
        let client_init = Ukey2ClientInit::decode(wrapper.message_data())?;

        let offers_sha512 = client_init
            .cipher_commitments
            .iter()
            .any(|c| c.handshake_cipher == Some(TARGET_CIPHER as i32));
        if !offers_sha512 {
            return Err(Error::InvalidMessage);
        }

        self.cipher.set_sender_init_message(msg)
    }

    /// Client side: sends CLIENT_INIT committing to the CLIENT_FINISH that
    /// immediately follows it.
    pub async fn send_client_init_with_client_finished(&mut self) -> Result<()> {
        let client_finished = self.marshal_client_finished()?;
        let commitment = Sha512::digest(&client_finished);

        let client_init_msg = Ukey2ClientInit {
            version: Some(1),
            random: Some(random::bytes(self.random.as_ref(), 32)),
            cipher_commitments: vec![CipherCommitment {
                handshake_cipher: Some(TARGET_CIPHER as i32),
                commitment: Some(commitment.to_vec()),
            }],
            next_protocol: Some(NEXT_PROTOCOL.to_string()),
        };
        let client_init = Ukey2Message {
            message_type: Some(UkeyMessageType::ClientInit as i32),
            message_data: Some(client_init_msg.encode_to_vec()),
        }
        .encode_to_vec();

        self.write_message(&client_init).await?;
        self.write_message(&client_finished).await?;

        self.cipher.set_receiver_init_message(&client_init)
    }

    /// Server side: generates our keypair, stores the private half and the
    /// exact SERVER_INIT wire bytes in the cipher, then sends it.
    pub async fn send_server_init(&mut self) -> Result<()> {
        let (private_key, public_key) = generate_key_pair();

        let server_init_msg = Ukey2ServerInit {
            version: Some(1),
            random: Some(random::bytes(self.random.as_ref(), 32)),
            handshake_cipher: Some(TARGET_CIPHER as i32),
            public_key: Some(public_key),
        };
        self.cipher.set_receiver_private_key(private_key);

        let server_init = Ukey2Message {
            message_type: Some(UkeyMessageType::ServerInit as i32),
            message_data: Some(server_init_msg.encode_to_vec()),
        }
        .encode_to_vec();
        self.cipher.set_receiver_init_message(&server_init)?;

        self.write_message(&server_init).await
    }

    /// Client side: checks the negotiated cipher and captures the server's
    /// public key and init bytes.
    pub fn validate_server_init(&mut self, msg: &[u8]) -> Result<()> {
        let wrapper = Ukey2Message::decode(msg)?;
        if wrapper.message_type() != UkeyMessageType::ServerInit {
            return Err(Error::InvalidMessage);
        }
        let server_init = Ukey2ServerInit::decode(wrapper.message_data())?;

        if server_init.handshake_cipher != Some(TARGET_CIPHER as i32) {
            return Err(Error::InvalidMessage);
        }

        let public_key =
            GenericPublicKey::decode(server_init.public_key.as_deref().unwrap_or_default())?;
        let Some(ec_key) = &public_key.ec_p256_public_key else {
            return Err(Error::InvalidMessage);
        };

        self.cipher.set_sender_public_key(ec_key)?;
        self.cipher.set_sender_init_message(msg)
    }

    /// Server side: captures the client's public key off the finish
    /// message.
    pub fn validate_client_finished(&mut self, msg: &[u8]) -> Result<()> {
        let wrapper = Ukey2Message::decode(msg)?;
        if wrapper.message_type() != UkeyMessageType::ClientFinish {
            return Err(Error::InvalidMessage);
        }
        let client_finished = Ukey2ClientFinished::decode(wrapper.message_data())?;

        let public_key =
            GenericPublicKey::decode(client_finished.public_key.as_deref().unwrap_or_default())?;
        let Some(ec_key) = &public_key.ec_p256_public_key else {
            return Err(Error::InvalidMessage);
        };

        self.cipher.set_sender_public_key(ec_key)
    }

    fn marshal_client_finished(&mut self) -> Result<Vec<u8>> {
        let (private_key, public_key) = generate_key_pair();
        self.cipher.set_receiver_private_key(private_key);

        let client_finished = Ukey2ClientFinished {
            public_key: Some(public_key),
        };

        Ok(Ukey2Message {
            message_type: Some(UkeyMessageType::ClientFinish as i32),
            message_data: Some(client_finished.encode_to_vec()),
        }
        .encode_to_vec())
    }
}

/// Fresh P-256 keypair; the public half is serialized as a
/// `GenericPublicKey` with coordinates left-padded to 33 bytes.
fn generate_key_pair() -> (SecretKey, Vec<u8>) {
    let private_key = SecretKey::random(&mut OsRng);
    let point = private_key.public_key().to_encoded_point(false);

    let generic = GenericPublicKey {
        r#type: PublicKeyType::EcP256 as i32,
        ec_p256_public_key: Some(EcP256PublicKey {
            x: pad_coordinate(point.x().map(|c| c.as_slice()).unwrap_or_default()),
            y: pad_coordinate(point.y().map(|c| c.as_slice()).unwrap_or_default()),
        }),
    };

    (private_key, generic.encode_to_vec())
}

fn pad_coordinate(coordinate: &[u8]) -> Vec<u8> {
    let mut padded = vec![0u8; 33 - coordinate.len().min(33)];
    padded.extend_from_slice(coordinate);
    padded
}
