use crate::session::{HandshakeStage, HandshakeState};
use std::result::Result as StdResult;
use thiserror::Error;

/// Errors which can occur during probe setup and communication.
#[derive(Debug, Error)]
pub enum Error {
    /// No probe with the expected USB vendor and product ID is connected.
    #[error("WCH-LinkE probe not found (VID:1a86 PID:8010)")]
    ProbeNotFound,

    /// The request was not specific enough and returned in multiple matches where only a single one
    /// is supported.
    #[error("More than one probe connected, select one by bus and address")]
    TooManyMatches,

    /// An error occurred during the raw USB communication.
    #[error("USB transfer failed: {0}")]
    Usb(#[from] rusb::Error),

    /// Fewer bytes than requested were written to an endpoint.
    #[error("Short transfer on endpoint 0x{endpoint:02x}: {actual} of {expected} bytes")]
    ShortTransfer {
        endpoint: u8,
        expected: usize,
        actual: usize,
    },

    /// A reply did not match the literal acknowledgment of a protocol step.
    #[error("Unexpected reply to {step}: expected {expected:02x?}, got {actual:02x?}")]
    UnexpectedReply {
        step: &'static str,
        expected: Vec<u8>,
        actual: Vec<u8>,
    },

    /// A reply was too short or carried the wrong header to be decoded.
    #[error("Malformed reply to {step}: {actual:02x?}")]
    MalformedReply { step: &'static str, actual: Vec<u8> },

    /// The chip attached to the probe is not of the supported family.
    #[error("Unsupported chip type 0x{found:02x} (expected 0x{expected:02x})")]
    ChipMismatch { expected: u8, found: u8 },

    /// One of the handshake stages failed.
    #[error("Handshake failed at {stage}: {source}")]
    Handshake {
        stage: HandshakeStage,
        #[source]
        source: Box<Error>,
    },

    /// An operation was attempted before the handshake reached the state it needs.
    #[error("Operation requires {required}, but the session is {current}")]
    NotReady {
        required: HandshakeState,
        current: HandshakeState,
    },

    /// Caller supplied input was rejected before any USB traffic took place.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Writing received terminal output failed.
    #[error("Terminal output failed: {0}")]
    Output(#[from] std::io::Error),
}

/// Coarse classification of an [`Error`], for callers that branch on the kind of failure.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ErrorKind {
    /// Device discovery, claiming or USB I/O failed.
    Transport,

    /// The probe answered, but not with what the protocol requires.
    Protocol,

    /// The request was rejected before talking to the probe.
    Input,

    /// The local output sink failed.
    Output,
}

impl Error {
    /// Returns the class of this error. Handshake failures report the kind of their cause.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::ProbeNotFound
            | Error::TooManyMatches
            | Error::Usb(_)
            | Error::ShortTransfer { .. } => ErrorKind::Transport,
            Error::UnexpectedReply { .. }
            | Error::MalformedReply { .. }
            | Error::ChipMismatch { .. } => ErrorKind::Protocol,
            Error::Handshake { source, .. } => source.kind(),
            Error::NotReady { .. } | Error::InvalidInput(_) => ErrorKind::Input,
            Error::Output(_) => ErrorKind::Output,
        }
    }
}

/// Shorthand for a Result with the crate's own Error type.
pub type Result<T> = StdResult<T, Error>;
