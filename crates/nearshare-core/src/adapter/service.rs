//! Service-message recovery: keep-alives, disconnections and UKEY2 alerts
//! recognized out of band when the primary parse fails.

use prost::Message;
use tokio::io::{AsyncRead, AsyncWrite};

use nearshare_proto::connections::v1_frame::FrameType;
use nearshare_proto::connections::{KeepAliveFrame, OfflineFrame, V1Frame};
use nearshare_proto::securegcm::ukey2_alert::AlertType;
use nearshare_proto::securegcm::ukey2_message::Type as UkeyMessageType;
use nearshare_proto::securegcm::{Ukey2Alert, Ukey2Message};

use super::Adapter;
use crate::error::{Error, Result};

impl<S> Adapter<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Checks whether `msg` is a service message and reacts to it:
    /// keep-alives are acked, alerts are logged, a disconnection surfaces
    /// as [`Error::ConnEndedByPeer`]. Anything else is
    /// [`Error::NotServiceMessage`].
    pub async fn process_service_message(&mut self, msg: &[u8]) -> Result<()> {
        // A successful offline-frame parse wins; only unparseable bytes get
        // a second chance as a UKEY2 message.
        if let Ok(frame) = OfflineFrame::decode(msg) {
            match frame.v1.as_ref().map(V1Frame::frame_type) {
                Some(FrameType::KeepAlive) => {
                    self.send_keep_alive(true).await;
                    return Ok(());
                }
                Some(FrameType::Disconnection) => return Err(Error::ConnEndedByPeer),
                _ => {}
            }
        } else if let Ok(wrapper) = Ukey2Message::decode(msg) {
            if wrapper.message_type() == UkeyMessageType::Alert {
                log_ukey_alert(&wrapper);
                return Ok(());
            }
        }

        Err(Error::NotServiceMessage)
    }

    async fn send_keep_alive(&mut self, ack: bool) {
        let frame = V1Frame {
            r#type: Some(FrameType::KeepAlive as i32),
            keep_alive: Some(KeepAliveFrame { ack: Some(ack) }),
            ..Default::default()
        };

        let res = if self.is_encrypted {
            self.encrypt_and_write(&frame).await
        } else {
            self.write_offline_frame(&frame).await
        };
        match res {
            Ok(()) => tracing::debug!("sent keep alive message"),
            Err(err) => tracing::error!(%err, "send keep alive message"),
        }
    }
}

fn log_ukey_alert(wrapper: &Ukey2Message) {
    let Ok(alert) = Ukey2Alert::decode(wrapper.message_data()) else {
        return;
    };

    let alert_type = alert.r#type.and_then(|t| AlertType::try_from(t).ok());
    tracing::warn!(
        r#type = ?alert_type,
        message = alert.error_message.as_deref().unwrap_or_default(),
        "got an alert"
    );
}
