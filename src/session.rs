use crate::config::SessionConfig;
use crate::error::{Error, Result};
use crate::frame::{chunk_for_transfer, PACKET_SIZE};
use crate::info::FirmwareInfo;
use crate::protocol::{Step, EP_COMMAND_IN, EP_COMMAND_OUT, EP_DATA_IN, EP_DATA_OUT};
use crate::transport::Transport;
use std::fmt;

/// Progress of the startup handshake. Later states compare greater than earlier ones.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd)]
pub enum HandshakeState {
    Disconnected,
    ProgrammerDetected,
    ProgrammerSpeedSet,
    ChipDetected,
    /// The chip can be flashed, dumped and debugged.
    Ready,
}

impl fmt::Display for HandshakeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            HandshakeState::Disconnected => "disconnected",
            HandshakeState::ProgrammerDetected => "probe detected",
            HandshakeState::ProgrammerSpeedSet => "probe speed set",
            HandshakeState::ChipDetected => "chip detected",
            HandshakeState::Ready => "ready",
        })
    }
}

/// The handshake stages, each leading to the next [`HandshakeState`].
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum HandshakeStage {
    ProbeDetect,
    ProbeSpeed,
    ChipDetect,
    ChipSpeed,
}

impl HandshakeStage {
    /// State the session has to be in before this stage may run.
    pub fn precondition(self) -> HandshakeState {
        match self {
            HandshakeStage::ProbeDetect => HandshakeState::Disconnected,
            HandshakeStage::ProbeSpeed => HandshakeState::ProgrammerDetected,
            HandshakeStage::ChipDetect => HandshakeState::ProgrammerSpeedSet,
            HandshakeStage::ChipSpeed => HandshakeState::ChipDetected,
        }
    }

    /// State reached when this stage succeeds.
    pub fn outcome(self) -> HandshakeState {
        match self {
            HandshakeStage::ProbeDetect => HandshakeState::ProgrammerDetected,
            HandshakeStage::ProbeSpeed => HandshakeState::ProgrammerSpeedSet,
            HandshakeStage::ChipDetect => HandshakeState::ChipDetected,
            HandshakeStage::ChipSpeed => HandshakeState::Ready,
        }
    }
}

impl fmt::Display for HandshakeStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            HandshakeStage::ProbeDetect => "probe detect",
            HandshakeStage::ProbeSpeed => "probe speed",
            HandshakeStage::ChipDetect => "chip detect",
            HandshakeStage::ChipSpeed => "chip speed",
        })
    }
}

/// An open connection to a probe. Every operation goes through this session; it owns the
/// transport and tracks how far the handshake has progressed.
pub struct Session<T: Transport> {
    /// Endpoint access for the raw communication.
    pub(crate) transport: T,

    pub(crate) config: SessionConfig,

    pub(crate) state: HandshakeState,

    /// Probe firmware information, if the probe reported it.
    pub(crate) firmware_info: Option<FirmwareInfo>,
}

impl<T: Transport> Session<T> {
    /// Wraps a transport. No USB traffic happens until the handshake is started.
    pub fn new(transport: T, config: SessionConfig) -> Self {
        Self {
            transport,
            config,
            state: HandshakeState::Disconnected,
            firmware_info: None,
        }
    }

    /// Current handshake state.
    pub fn state(&self) -> HandshakeState {
        self.state
    }

    /// The configuration this session was opened with.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Probe firmware information, available after the probe-detect stage on LinkE probes.
    pub fn firmware_info(&self) -> Option<&FirmwareInfo> {
        self.firmware_info.as_ref()
    }

    /// Gives the transport back, ending the session.
    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Fails unless the handshake has progressed to at least `required`.
    pub(crate) fn require(&self, required: HandshakeState) -> Result<()> {
        if self.state >= required {
            Ok(())
        } else {
            Err(Error::NotReady {
                required,
                current: self.state,
            })
        }
    }

    /// Writes a whole buffer to an OUT endpoint.
    fn write_all(&mut self, endpoint: u8, data: &[u8]) -> Result<()> {
        let written = self
            .transport
            .write(endpoint, data, self.config.timeout)?;
        if written != data.len() {
            return Err(Error::ShortTransfer {
                endpoint,
                expected: data.len(),
                actual: written,
            });
        }
        Ok(())
    }

    /// Sends a command frame and returns the probe's reply frame.
    pub(crate) fn command(&mut self, frame: &[u8]) -> Result<Vec<u8>> {
        log::debug!("> {:02x?}", frame);
        self.write_all(EP_COMMAND_OUT, frame)?;

        let mut reply = vec![0u8; PACKET_SIZE];
        let length = self
            .transport
            .read(EP_COMMAND_IN, &mut reply, self.config.timeout)?;
        reply.truncate(length);
        log::debug!("< {:02x?}", reply);
        Ok(reply)
    }

    /// Sends a command frame and checks the reply against a literal acknowledgment.
    pub(crate) fn expect(&mut self, step: &'static str, frame: &[u8], ack: &[u8]) -> Result<()> {
        let reply = self.command(frame)?;
        if reply == ack {
            Ok(())
        } else {
            Err(Error::UnexpectedReply {
                step,
                expected: ack.to_vec(),
                actual: reply,
            })
        }
    }

    /// Runs one literal protocol step.
    pub(crate) fn exchange(&mut self, step: &Step) -> Result<()> {
        self.expect(step.name, &step.request(), &step.expected_reply())
    }

    /// Streams a payload to the data endpoint in padded, fixed-size packets. The probe does not
    /// answer individual packets.
    pub(crate) fn send_data(&mut self, data: &[u8]) -> Result<()> {
        let packets = chunk_for_transfer(data, PACKET_SIZE);
        log::debug!(
            "Sending {} bytes in {} packets",
            data.len(),
            packets.len()
        );
        for (i, packet) in packets.iter().enumerate() {
            log::trace!("packet {}: {:02x?}", i, packet);
            self.write_all(EP_DATA_OUT, packet)?;
        }
        Ok(())
    }

    /// Reads a single packet from the data endpoint.
    pub(crate) fn read_data(&mut self) -> Result<Vec<u8>> {
        let mut data = vec![0u8; PACKET_SIZE];
        let length = self
            .transport
            .read(EP_DATA_IN, &mut data, self.config.timeout)?;
        data.truncate(length);
        log::trace!("data: {:02x?}", data);
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::LOADER_BEGIN;
    use crate::transport::mock::MockTransport;

    #[test]
    fn test_state_order() {
        assert!(HandshakeState::Ready > HandshakeState::ChipDetected);
        assert!(HandshakeState::ProgrammerSpeedSet > HandshakeState::ProgrammerDetected);
        assert_eq!(
            HandshakeStage::ChipDetect.precondition(),
            HandshakeStage::ProbeSpeed.outcome()
        );
    }

    #[test]
    fn test_exchange_mismatch() {
        let mut transport = MockTransport::new();
        transport.reply(EP_COMMAND_IN, &[0x82, 0x02, 0x01, 0x06]);
        let mut session = Session::new(transport, SessionConfig::default());

        match session.exchange(&LOADER_BEGIN) {
            Err(Error::UnexpectedReply { step, actual, .. }) => {
                assert_eq!(step, "loader begin");
                assert_eq!(actual, vec![0x82, 0x02, 0x01, 0x06]);
            }
            other => panic!("unexpected result {:?}", other),
        }
        assert_eq!(
            session.into_transport().writes,
            vec![(EP_COMMAND_OUT, vec![0x81, 0x02, 0x01, 0x05])]
        );
    }

    #[test]
    fn test_require() {
        let session = Session::new(MockTransport::new(), SessionConfig::default());
        assert!(session.require(HandshakeState::Disconnected).is_ok());
        assert!(matches!(
            session.require(HandshakeState::Ready),
            Err(Error::NotReady {
                required: HandshakeState::Ready,
                current: HandshakeState::Disconnected,
            })
        ));
    }

    #[test]
    fn test_send_data_pads() {
        let mut session = Session::new(MockTransport::new(), SessionConfig::default());
        session.send_data(&[0x11; 300]).unwrap();
        let packets = session.into_transport().writes_to(EP_DATA_OUT);
        assert_eq!(packets.len(), 2);
        assert!(packets.iter().all(|p| p.len() == PACKET_SIZE));
        assert_eq!(packets[1][43], 0x11);
        assert_eq!(packets[1][44], 0xff);
    }
}
