//! Programming the target's flash through an uploaded bootstrap loader.
//!
//! The probe cannot write target flash itself. It first receives a small loader which runs on
//! the target, then streams the firmware image to that loader. Every phase has to be
//! acknowledged before the next byte stream is sent.

use crate::error::{Error, Result};
use crate::frame::{encode_command, encode_reply, push_u32};
use crate::operation::Operation;
use crate::protocol::{
    opcodes, FLASH_BASE, FLASH_FINALIZE, FLASH_PREPARE_ACK, LOADER_ACTIVATE, LOADER_BEGIN,
    LOADER_END,
};
use crate::session::{HandshakeState, Session};
use crate::transport::Transport;
use std::fmt;

/// Machine code run on the CH582 to erase, write and verify its flash.
pub const FLASH_LOADER: &[u8] = include_bytes!("../blobs/ch582_flashloader.bin");

/// Minimal CH582 firmware blinking PA8 and printing a greeting on the debug interface.
pub const BLINK_IMAGE: &[u8] = include_bytes!("../blobs/ch582_blink.bin");

/// The phases of a flash operation, in the only order the probe accepts.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum FlashPhase {
    Prepare,
    LoaderBegin,
    LoaderUpload,
    LoaderEnd,
    LoaderActivate,
    FirmwareUpload,
    Finalize,
}

impl FlashPhase {
    /// All phases in execution order.
    pub const SEQUENCE: [FlashPhase; 7] = [
        FlashPhase::Prepare,
        FlashPhase::LoaderBegin,
        FlashPhase::LoaderUpload,
        FlashPhase::LoaderEnd,
        FlashPhase::LoaderActivate,
        FlashPhase::FirmwareUpload,
        FlashPhase::Finalize,
    ];
}

impl fmt::Display for FlashPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FlashPhase::Prepare => "prepare",
            FlashPhase::LoaderBegin => "loader begin",
            FlashPhase::LoaderUpload => "loader upload",
            FlashPhase::LoaderEnd => "loader end",
            FlashPhase::LoaderActivate => "loader activate",
            FlashPhase::FirmwareUpload => "firmware upload",
            FlashPhase::Finalize => "finalize",
        })
    }
}

/// A running flash operation. Created by [`Session::flash`].
///
/// A failure in any phase leaves the target partially programmed; there is no rollback.
pub struct Flash<'a, 'd, T: Transport> {
    session: &'a mut Session<T>,
    image: &'d [u8],
    phase: usize,
    done: bool,
}

impl<T: Transport> Flash<'_, '_, T> {
    /// The phase the next call to `next` will run, if any.
    pub fn next_phase(&self) -> Option<FlashPhase> {
        if self.done {
            None
        } else {
            FlashPhase::SEQUENCE.get(self.phase).copied()
        }
    }
}

impl<T: Transport> Operation for Flash<'_, '_, T> {
    fn total(&self) -> usize {
        FlashPhase::SEQUENCE.len()
    }
}

impl<T: Transport> Iterator for Flash<'_, '_, T> {
    type Item = Result<usize>;

    fn next(&mut self) -> Option<Self::Item> {
        let phase = self.next_phase()?;

        Some(match self.session.run_flash_phase(phase, self.image) {
            Ok(()) => {
                self.phase += 1;
                self.done = self.phase == FlashPhase::SEQUENCE.len();
                Ok(self.phase)
            }
            Err(error) => {
                // Ensure that the iterator is fused after an error occurs
                self.done = true;
                log::error!(
                    "Flashing failed during {}, target flash is in an undefined state",
                    phase
                );
                Err(error)
            }
        })
    }
}

impl<T: Transport> Session<T> {
    /// Prepares flashing `image` to the start of the target flash. Nothing is sent before the
    /// returned operation is driven.
    pub fn flash<'d>(&mut self, image: &'d [u8]) -> Result<Flash<'_, 'd, T>> {
        self.require(HandshakeState::Ready)?;
        if image.is_empty() {
            return Err(Error::InvalidInput("firmware image is empty".into()));
        }
        if u32::try_from(image.len()).is_err() {
            return Err(Error::InvalidInput(format!(
                "firmware image of {} bytes is too large",
                image.len()
            )));
        }

        Ok(Flash {
            session: self,
            image,
            phase: 0,
            done: false,
        })
    }

    /// Prepares flashing the built-in blink firmware.
    pub fn flash_blink(&mut self) -> Result<Flash<'_, 'static, T>> {
        self.flash(BLINK_IMAGE)
    }

    fn run_flash_phase(&mut self, phase: FlashPhase, image: &[u8]) -> Result<()> {
        log::debug!("Flash phase: {}", phase);
        match phase {
            FlashPhase::Prepare => {
                let mut fields = Vec::with_capacity(8);
                push_u32(&mut fields, FLASH_BASE);
                // Length was checked to fit when the operation was created
                push_u32(&mut fields, image.len() as u32);
                log::info!("Flashing {} bytes at 0x{:08x}", image.len(), FLASH_BASE);
                self.expect(
                    "flash prepare",
                    &encode_command(opcodes::FLASH_PREPARE, &fields),
                    &encode_reply(opcodes::FLASH_PREPARE, FLASH_PREPARE_ACK),
                )
            }
            FlashPhase::LoaderBegin => self.exchange(&LOADER_BEGIN),
            FlashPhase::LoaderUpload => self.send_data(FLASH_LOADER),
            FlashPhase::LoaderEnd => self.exchange(&LOADER_END),
            FlashPhase::LoaderActivate => self.exchange(&LOADER_ACTIVATE),
            FlashPhase::FirmwareUpload => self.send_data(image),
            FlashPhase::Finalize => self.exchange(&FLASH_FINALIZE),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionConfig;
    use crate::frame::PACKET_SIZE;
    use crate::protocol::{EP_COMMAND_IN, EP_COMMAND_OUT, EP_DATA_OUT};
    use crate::transport::mock::MockTransport;

    fn flash_replies(transport: &mut MockTransport) {
        transport
            .reply(EP_COMMAND_IN, &[0x82, 0x01, 0x01, 0x01])
            .reply(EP_COMMAND_IN, &[0x82, 0x02, 0x01, 0x05])
            .reply(EP_COMMAND_IN, &[0x82, 0x02, 0x01, 0x07])
            .reply(EP_COMMAND_IN, &[0x82, 0x02, 0x01, 0x02])
            .reply(EP_COMMAND_IN, &[0x82, 0x02, 0x01, 0x08]);
    }

    fn ready_session(transport: MockTransport) -> Session<MockTransport> {
        let mut session = Session::new(transport, SessionConfig::default());
        session.handshake().unwrap();
        session.transport.clear_writes();
        session
    }

    #[test]
    fn test_blobs() {
        assert_eq!(FLASH_LOADER.len(), 1326);
        assert_eq!(BLINK_IMAGE.len(), 872);
    }

    #[test]
    fn test_flash_sequence() {
        let mut transport = MockTransport::new();
        transport.handshake_replies();
        flash_replies(&mut transport);
        let mut session = ready_session(transport);

        let image = [0x5a; 256];
        let mut flash = session.flash(&image).unwrap();
        assert_eq!(flash.total(), 7);
        flash.execute().unwrap();

        let transport = session.into_transport();
        assert_eq!(transport.pending_replies(), 0);

        // 1326 loader bytes take 6 packets, the aligned image takes one extra filler packet
        let loader_packets = 6;
        let expected_commands: Vec<(u8, Vec<u8>)> = vec![
            (
                EP_COMMAND_OUT,
                vec![0x81, 0x01, 0x08, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00],
            ),
            (EP_COMMAND_OUT, vec![0x81, 0x02, 0x01, 0x05]),
        ];
        assert_eq!(&transport.writes[..2], &expected_commands[..]);

        let loader: Vec<u8> = transport.writes[2..2 + loader_packets]
            .iter()
            .inspect(|(ep, packet)| {
                assert_eq!(*ep, EP_DATA_OUT);
                assert_eq!(packet.len(), PACKET_SIZE);
            })
            .flat_map(|(_, packet)| packet.clone())
            .collect();
        assert_eq!(&loader[..FLASH_LOADER.len()], FLASH_LOADER);
        assert!(loader[FLASH_LOADER.len()..].iter().all(|&b| b == 0xff));

        let rest = &transport.writes[2 + loader_packets..];
        assert_eq!(rest.len(), 5);
        assert_eq!(rest[0], (EP_COMMAND_OUT, vec![0x81, 0x02, 0x01, 0x07]));
        assert_eq!(rest[1], (EP_COMMAND_OUT, vec![0x81, 0x02, 0x01, 0x02]));
        assert_eq!(rest[2], (EP_DATA_OUT, vec![0x5a; 256]));
        assert_eq!(rest[3], (EP_DATA_OUT, vec![0xff; 256]));
        assert_eq!(rest[4], (EP_COMMAND_OUT, vec![0x81, 0x02, 0x01, 0x08]));
    }

    #[test]
    fn test_flash_progress() {
        let mut transport = MockTransport::new();
        transport.handshake_replies();
        flash_replies(&mut transport);
        let mut session = ready_session(transport);

        let mut flash = session.flash_blink().unwrap();
        assert_eq!(flash.next_phase(), Some(FlashPhase::Prepare));
        let progress: Vec<usize> = flash.by_ref().map(|step| step.unwrap()).collect();
        assert_eq!(progress, vec![1, 2, 3, 4, 5, 6, 7]);
        assert_eq!(flash.next_phase(), None);
        assert!(flash.next().is_none());

        let transport = session.into_transport();
        assert_eq!(&transport.writes[0].1[7..], &[0x00, 0x00, 0x03, 0x68]);
    }

    #[test]
    fn test_flash_aborts_on_bad_ack() {
        let mut transport = MockTransport::new();
        transport
            .handshake_replies()
            .reply(EP_COMMAND_IN, &[0x82, 0x01, 0x01, 0x01])
            .reply(EP_COMMAND_IN, &[0x82, 0x02, 0x01, 0x00]);
        let mut session = ready_session(transport);

        let image = [0x00; 16];
        let mut flash = session.flash(&image).unwrap();
        assert!(matches!(flash.next(), Some(Ok(1))));
        assert!(matches!(
            flash.next(),
            Some(Err(Error::UnexpectedReply {
                step: "loader begin",
                ..
            }))
        ));
        assert!(flash.next().is_none());

        // Neither loader nor firmware may reach the data endpoint
        assert!(session.into_transport().writes_to(EP_DATA_OUT).is_empty());
    }

    #[test]
    fn test_flash_requires_ready() {
        let mut session = Session::new(MockTransport::new(), SessionConfig::default());
        assert!(matches!(
            session.flash(BLINK_IMAGE),
            Err(Error::NotReady { .. })
        ));
    }

    #[test]
    fn test_flash_rejects_empty_image() {
        let mut transport = MockTransport::new();
        transport.handshake_replies();
        let mut session = ready_session(transport);
        assert!(matches!(session.flash(&[]), Err(Error::InvalidInput(_))));
        assert!(session.into_transport().writes.is_empty());
    }
}
