//! USB identifiers, opcodes and the literal exchanges understood by the WCH-LinkE probe.
//!
//! Many of the exchanges below have no documented meaning. They are kept as named, ordered
//! [`Step`]s so the sequences stay auditable.

use crate::frame::{encode_command, encode_reply};

/// USB vendor ID of the probe.
pub const USB_VENDOR_ID: u16 = 0x1a86;
/// USB product ID of the probe.
pub const USB_PRODUCT_ID: u16 = 0x8010;
/// Interface claimed for all transfers.
pub const USB_INTERFACE: u8 = 0;

/// Endpoint for command frames sent to the probe.
pub const EP_COMMAND_OUT: u8 = 0x01;
/// Endpoint for bulk data sent to the probe.
pub const EP_DATA_OUT: u8 = 0x02;
/// Endpoint for reply frames from the probe.
pub const EP_COMMAND_IN: u8 = 0x81;
/// Endpoint for bulk data from the probe.
pub const EP_DATA_IN: u8 = 0x82;

/// Chip type reported by the chip-detect command for the CH582 family.
pub const CHIP_TYPE_CH582: u8 = 0x07;

/// Model byte reported by LinkE probes in the probe-detect reply.
pub const MODEL_LINK_E: u8 = 0x12;

/// Flash address the firmware image is written to.
pub const FLASH_BASE: u32 = 0x0000_0000;

pub mod opcodes {
    pub const FLASH_PREPARE: u8 = 0x01;
    pub const PROGRAM: u8 = 0x02;
    pub const MEMORY_READ: u8 = 0x03;
    pub const DEBUG_REGISTER: u8 = 0x08;
    pub const RESET: u8 = 0x0b;
    pub const SET_SPEED: u8 = 0x0c;
    pub const CONTROL: u8 = 0x0d;
}

/// Sub-opcodes of [`opcodes::CONTROL`].
pub mod control {
    pub const PROBE_DETECT: u8 = 0x01;
    pub const CHIP_DETECT: u8 = 0x02;
    pub const POWER_3V3_ON: u8 = 0x09;
    pub const POWER_3V3_OFF: u8 = 0x0a;
    pub const POWER_5V_ON: u8 = 0x0b;
    pub const POWER_5V_OFF: u8 = 0x0c;
    pub const DISCONNECT: u8 = 0xff;
}

/// Field placed before the speed code in the probe-speed command.
pub const PROBE_SPEED_TARGET: u8 = 0x01;

/// Fields of the acknowledgment to both speed commands.
pub const SPEED_ACK: &[u8] = &[0x01];

/// Fields of the acknowledgment to the flash-prepare command.
pub const FLASH_PREPARE_ACK: &[u8] = &[0x01];

/// Value of the poll reply's marker byte when a character is pending.
pub const TERMINAL_MARKER: u8 = 0x85;
/// Position of the marker byte in the poll reply.
pub const TERMINAL_MARKER_OFFSET: usize = 7;
/// Position of the received character in the poll reply.
pub const TERMINAL_CHAR_OFFSET: usize = 6;

/// A literal request/acknowledgment exchange.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct Step {
    /// Name used in logs and error messages.
    pub name: &'static str,
    pub opcode: u8,
    /// Request fields following the length byte.
    pub fields: &'static [u8],
    /// Fields the probe must send back after the opcode and length.
    pub ack: &'static [u8],
}

impl Step {
    /// The command frame to send.
    pub fn request(&self) -> Vec<u8> {
        encode_command(self.opcode, self.fields)
    }

    /// The exact reply frame expected from the probe.
    pub fn expected_reply(&self) -> Vec<u8> {
        encode_reply(self.opcode, self.ack)
    }
}

const fn program_step(name: &'static str, sub: &'static [u8]) -> Step {
    Step {
        name,
        opcode: opcodes::PROGRAM,
        fields: sub,
        ack: sub,
    }
}

const fn control_step(name: &'static str, sub: &'static [u8]) -> Step {
    Step {
        name,
        opcode: opcodes::CONTROL,
        fields: sub,
        ack: sub,
    }
}

pub const LOADER_BEGIN: Step = program_step("loader begin", &[0x05]);
pub const LOADER_END: Step = program_step("loader end", &[0x07]);
pub const LOADER_ACTIVATE: Step = program_step("loader activate", &[0x02]);
pub const FLASH_FINALIZE: Step = program_step("flash finalize", &[0x08]);
pub const MEMORY_FETCH: Step = program_step("memory fetch", &[0x0c]);

pub const RESET_TARGET: Step = Step {
    name: "target reset",
    opcode: opcodes::RESET,
    fields: &[0x01],
    ack: &[0x01],
};
pub const DISCONNECT: Step = control_step("probe disconnect", &[control::DISCONNECT]);

pub const POWER_3V3_OFF: Step = control_step("3.3V off", &[control::POWER_3V3_OFF]);
pub const POWER_3V3_ON: Step = control_step("3.3V on", &[control::POWER_3V3_ON]);
pub const POWER_5V_OFF: Step = control_step("5V off", &[control::POWER_5V_OFF]);
pub const POWER_5V_ON: Step = control_step("5V on", &[control::POWER_5V_ON]);

/// Debug register exchanges enabling interception of the target's debug output, in order.
pub const TERMINAL_SETUP: [Step; 5] = [
    Step {
        name: "terminal setup 1",
        opcode: opcodes::DEBUG_REGISTER,
        fields: &[0x10, 0x80, 0x00, 0x00, 0x01, 0x02],
        ack: &[0x10, 0x80, 0x00, 0x00, 0x01, 0x00],
    },
    Step {
        name: "terminal setup 2",
        opcode: opcodes::DEBUG_REGISTER,
        fields: &[0x10, 0x80, 0x00, 0x00, 0x03, 0x02],
        ack: &[0x10, 0x80, 0x00, 0x00, 0x03, 0x00],
    },
    Step {
        name: "terminal setup 3",
        opcode: opcodes::DEBUG_REGISTER,
        fields: &[0x10, 0x80, 0x00, 0x00, 0x01, 0x02],
        ack: &[0x10, 0x80, 0x00, 0x00, 0x01, 0x00],
    },
    Step {
        name: "terminal setup 4",
        opcode: opcodes::DEBUG_REGISTER,
        fields: &[0x16, 0x00, 0x00, 0x07, 0x00, 0x02],
        ack: &[0x16, 0x00, 0x00, 0x07, 0x00, 0x00],
    },
    Step {
        name: "terminal setup 5",
        opcode: opcodes::DEBUG_REGISTER,
        fields: &[0x10, 0x40, 0x00, 0x00, 0x01, 0x02],
        ack: &[0x10, 0x40, 0x00, 0x00, 0x01, 0x00],
    },
];

/// Fields of the terminal poll command. Its reply is decoded, not compared.
pub const TERMINAL_POLL: &[u8] = &[0x04, 0x00, 0x00, 0x00, 0x00, 0x01];

pub const TERMINAL_ACK1: Step = Step {
    name: "terminal ack 1",
    opcode: opcodes::DEBUG_REGISTER,
    fields: &[0x05, 0x00, 0x00, 0x00, 0x00, 0x02],
    ack: &[0x05, 0x00, 0x00, 0x00, 0x00, 0x00],
};

pub const TERMINAL_ACK2: Step = Step {
    name: "terminal ack 2",
    opcode: opcodes::DEBUG_REGISTER,
    fields: &[0x04, 0x00, 0x00, 0x00, 0x04, 0x02],
    ack: &[0x04, 0x00, 0x00, 0x00, 0x04, 0x00],
};
