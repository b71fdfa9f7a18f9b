//! Outbound message sink: OSC over UDP, fire-and-forget.

use crate::domain::models::HeartRateMeasurement;
use crate::domain::settings::OscSettings;
use anyhow::{Context, Result};
use rosc::{OscMessage, OscPacket, OscType};
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use tracing::debug;

/// Anything that can deliver a forwarded measurement downstream.
///
/// The session drives this through one implementation per run; tests swap in
/// a recording double.
pub trait MessageSink {
    fn send(&mut self, measurement: &HeartRateMeasurement) -> Result<()>;
}

/// The text carried as the single OSC string argument.
pub(crate) fn message_text(measurement: &HeartRateMeasurement) -> String {
    format!("Heart Rate {}", measurement.bpm)
}

/// Sends each measurement as one OSC message to a destination fixed at
/// construction time. No acknowledgment, no retry: a datagram that fails to
/// leave the socket is logged and dropped.
pub struct OscSink {
    socket: UdpSocket,
    destination: SocketAddr,
    path: String,
}

impl OscSink {
    pub fn new(settings: &OscSettings) -> Result<Self> {
        let destination = settings
            .destination()
            .to_socket_addrs()
            .with_context(|| format!("resolving OSC destination {}", settings.destination()))?
            .next()
            .with_context(|| format!("OSC destination {} has no address", settings.destination()))?;

        let socket = UdpSocket::bind("0.0.0.0:0").context("binding OSC socket")?;

        Ok(Self {
            socket,
            destination,
            path: settings.path.clone(),
        })
    }
}

impl MessageSink for OscSink {
    fn send(&mut self, measurement: &HeartRateMeasurement) -> Result<()> {
        let packet = OscPacket::Message(OscMessage {
            addr: self.path.clone(),
            args: vec![OscType::String(message_text(measurement))],
        });
        let buffer = rosc::encoder::encode(&packet).context("encoding OSC message")?;

        // The transport has no confirmation channel; hand-off failures are
        // accepted as lost messages.
        if let Err(err) = self.socket.send_to(&buffer, self.destination) {
            debug!("OSC datagram not sent: {err}");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn sends_heart_rate_text_to_configured_path() {
        let receiver = UdpSocket::bind("127.0.0.1:0").unwrap();
        receiver
            .set_read_timeout(Some(Duration::from_secs(2)))
            .unwrap();

        let settings = OscSettings {
            host: "127.0.0.1".to_string(),
            port: receiver.local_addr().unwrap().port(),
            path: "/chatbox/input".to_string(),
        };
        let mut sink = OscSink::new(&settings).unwrap();
        sink.send(&HeartRateMeasurement { bpm: 72 }).unwrap();

        let mut buffer = [0u8; 512];
        let (received, _) = receiver.recv_from(&mut buffer).unwrap();
        let (_, packet) = rosc::decoder::decode_udp(&buffer[..received]).unwrap();

        let OscPacket::Message(message) = packet else {
            panic!("expected a single OSC message");
        };
        assert_eq!(message.addr, "/chatbox/input");
        assert_eq!(
            message.args,
            vec![OscType::String("Heart Rate 72".to_string())]
        );
    }

    #[test]
    fn unreachable_destination_is_not_an_error() {
        let settings = OscSettings {
            host: "127.0.0.1".to_string(),
            port: 9, // discard; nothing listens here
            path: "/chatbox/input".to_string(),
        };
        let mut sink = OscSink::new(&settings).unwrap();
        assert!(sink.send(&HeartRateMeasurement { bpm: 60 }).is_ok());
    }
}
