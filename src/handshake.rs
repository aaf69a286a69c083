//! The ordered startup sequence: probe detect, probe speed, chip detect, chip speed.

use crate::error::{Error, Result};
use crate::frame::{encode_command, encode_reply, is_reply_to};
use crate::info::FirmwareInfo;
use crate::protocol::{
    control, opcodes, CHIP_TYPE_CH582, PROBE_SPEED_TARGET, SPEED_ACK,
};
use crate::session::{HandshakeStage, Session};
use crate::transport::Transport;

impl<T: Transport> Session<T> {
    /// Runs the complete handshake. On success the session is `Ready`.
    pub fn handshake(&mut self) -> Result<()> {
        self.attach_probe()?;
        self.attach_chip()
    }

    /// Detects the probe and sets the host to probe link speed.
    pub fn attach_probe(&mut self) -> Result<()> {
        self.run_stage(HandshakeStage::ProbeDetect)?;
        self.run_stage(HandshakeStage::ProbeSpeed)
    }

    /// Detects the chip and sets the probe to chip link speed. Requires
    /// [`attach_probe`](#method.attach_probe) to have succeeded.
    pub fn attach_chip(&mut self) -> Result<()> {
        self.run_stage(HandshakeStage::ChipDetect)?;
        self.run_stage(HandshakeStage::ChipSpeed)
    }

    fn run_stage(&mut self, stage: HandshakeStage) -> Result<()> {
        // Stages are strictly ordered and never repeated
        if self.state != stage.precondition() {
            return Err(Error::Handshake {
                stage,
                source: Box::new(Error::NotReady {
                    required: stage.precondition(),
                    current: self.state,
                }),
            });
        }

        let result = match stage {
            HandshakeStage::ProbeDetect => self.detect_probe(),
            HandshakeStage::ProbeSpeed => {
                let speed = self.config.probe_speed;
                self.expect(
                    "probe speed",
                    &encode_command(opcodes::SET_SPEED, &[PROBE_SPEED_TARGET, speed.code()]),
                    &encode_reply(opcodes::SET_SPEED, SPEED_ACK),
                )
            }
            HandshakeStage::ChipDetect => self.detect_chip(),
            HandshakeStage::ChipSpeed => {
                let speed = self.config.chip_speed;
                self.expect(
                    "chip speed",
                    &encode_command(opcodes::SET_SPEED, &[CHIP_TYPE_CH582, speed.code()]),
                    &encode_reply(opcodes::SET_SPEED, SPEED_ACK),
                )
            }
        };

        match result {
            Ok(()) => {
                self.state = stage.outcome();
                log::debug!("Handshake: {} done, session {}", stage, self.state);
                Ok(())
            }
            Err(source) => Err(Error::Handshake {
                stage,
                source: Box::new(source),
            }),
        }
    }

    fn detect_probe(&mut self) -> Result<()> {
        let reply = self.command(&encode_command(
            opcodes::CONTROL,
            &[control::PROBE_DETECT],
        ))?;
        if !is_reply_to(&reply, opcodes::CONTROL) {
            return Err(Error::MalformedReply {
                step: "probe detect",
                actual: reply,
            });
        }

        self.firmware_info = FirmwareInfo::from_reply(&reply);
        match &self.firmware_info {
            Some(info) => log::info!("{} found", info),
            None => log::info!("Probe found"),
        }
        Ok(())
    }

    fn detect_chip(&mut self) -> Result<()> {
        let reply = self.command(&encode_command(
            opcodes::CONTROL,
            &[control::CHIP_DETECT],
        ))?;
        if !is_reply_to(&reply, opcodes::CONTROL) || reply.len() < 4 {
            return Err(Error::MalformedReply {
                step: "chip detect",
                actual: reply,
            });
        }

        match reply[3] {
            CHIP_TYPE_CH582 => {
                log::info!(
                    "CH582 found, setting speed to {}",
                    self.config.chip_speed
                );
                Ok(())
            }
            found => Err(Error::ChipMismatch {
                expected: CHIP_TYPE_CH582,
                found,
            }),
        }
    }
}
