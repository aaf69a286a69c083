//! Bridging the target's debug output to a local byte stream.
//!
//! Firmware on the target writes one character at a time into a debug data register together
//! with a marker. The probe is polled until the marker shows up, the character is emitted and
//! two acknowledgments clear the register for the next one.

use crate::error::{Error, Result};
use crate::frame::{encode_command, is_reply_to};
use crate::protocol::{
    opcodes, TERMINAL_ACK1, TERMINAL_ACK2, TERMINAL_CHAR_OFFSET, TERMINAL_MARKER,
    TERMINAL_MARKER_OFFSET, TERMINAL_POLL, TERMINAL_SETUP,
};
use crate::session::{HandshakeState, Session};
use crate::transport::Transport;
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared flag used to stop the terminal loop from another thread or a signal handler.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation. The terminal loop stops before its next poll.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Result of decoding a poll reply.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum PollStatus {
    /// No character pending.
    Idle,
    /// A character was received and has to be acknowledged.
    Received(u8),
}

/// Decodes the reply to a terminal poll.
pub fn decode_poll(reply: &[u8]) -> Result<PollStatus> {
    if !is_reply_to(reply, opcodes::DEBUG_REGISTER) || reply.len() <= TERMINAL_MARKER_OFFSET {
        return Err(Error::MalformedReply {
            step: "terminal poll",
            actual: reply.to_vec(),
        });
    }
    if reply[TERMINAL_MARKER_OFFSET] == TERMINAL_MARKER {
        Ok(PollStatus::Received(reply[TERMINAL_CHAR_OFFSET]))
    } else {
        Ok(PollStatus::Idle)
    }
}

impl<T: Transport> Session<T> {
    /// Enables debug output interception and copies every received byte to `output` until
    /// `cancel` is triggered. Returns the number of bytes received.
    ///
    /// Cancellation is checked once per poll. No teardown command is sent when the loop ends.
    pub fn open_terminal<W: Write>(
        &mut self,
        output: &mut W,
        cancel: &CancelToken,
    ) -> Result<usize> {
        self.require(HandshakeState::Ready)?;
        for step in TERMINAL_SETUP.iter() {
            self.exchange(step)?;
        }
        log::info!("Terminal open");

        let poll = encode_command(opcodes::DEBUG_REGISTER, TERMINAL_POLL);
        let mut received = 0;
        while !cancel.is_cancelled() {
            let reply = self.command(&poll)?;
            match decode_poll(&reply)? {
                PollStatus::Received(byte) => {
                    output.write_all(&[byte])?;
                    output.flush()?;
                    received += 1;
                    self.exchange(&TERMINAL_ACK1)?;
                    self.exchange(&TERMINAL_ACK2)?;
                }
                PollStatus::Idle => {
                    if !self.config.poll_interval.is_zero() {
                        std::thread::sleep(self.config.poll_interval);
                    }
                }
            }
        }

        log::info!("Terminal closed after {} bytes", received);
        Ok(received)
    }
}
