//! This crate drives a WCH-LinkE debug probe connected via USB to flash, dump and debug a CH582
//! microcontroller.
//!
//! # Example: Basic flashing
//! ```rust, no_run
//! use wchlink::{Context, Operation, SessionConfig};
//! use std::fs::File;
//! use std::io::Read;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Open binary file and read contents
//! let mut file = File::open("firmware.bin")?;
//! let mut buff = Vec::new();
//! file.read_to_end(&mut buff)?;
//!
//! // Find the probe and run the handshake
//! let context = Context::new()?;
//! let mut session = context.pick_probe(None)?.open(&context, SessionConfig::default())?;
//! session.handshake()?;
//!
//! // Upload the flash loader and program the image
//! session.flash(buff.as_slice())?.execute()?;
//!
//! // Start the new firmware
//! session.reset()?;
//!
//! println!("Done!");
//! # Ok(())
//! # }
//! ```
//!
//! Flashing can also be driven phase by phase for progress feedback, see the [`Operation`]
//! trait. Besides flashing, a [`Session`] can dump target memory, bridge the target's debug
//! output and power cycle the target.
//!
//! [`Operation`]: trait.Operation.html
//! [`Session`]: struct.Session.html

mod config;
mod context;
mod error;
mod flash;
mod handshake;
mod info;
mod memory;
mod operation;
mod power;
mod probe;
mod session;
mod terminal;
mod transport;

pub mod frame;
pub mod protocol;

pub use config::{Speed, SessionConfig, DEFAULT_POWER_CYCLE_DELAY, DEFAULT_TIMEOUT};
pub use context::Context;
pub use error::{Error, ErrorKind, Result};
pub use flash::{Flash, FlashPhase, BLINK_IMAGE, FLASH_LOADER};
pub use info::{FirmwareInfo, Version};
pub use memory::{
    normalize_dump_address, normalize_dump_length, parse_address, parse_length, DumpRequest,
    MemoryDump, DEFAULT_DUMP_LENGTH,
};
pub use operation::Operation;
pub use power::Rail;
pub use probe::ProbeInfo;
pub use rusb::UsbContext;
pub use session::{HandshakeStage, HandshakeState, Session};
pub use terminal::{decode_poll, CancelToken, PollStatus};
pub use transport::{Transport, UsbTransport};
