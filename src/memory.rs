//! Reading target memory in single-packet dumps.

use crate::error::{Error, Result};
use crate::frame::{encode_command, push_u32, swap_words, PACKET_SIZE};
use crate::protocol::{opcodes, MEMORY_FETCH};
use crate::session::{HandshakeState, Session};
use crate::transport::Transport;
use std::fmt;

/// Number of bytes dumped if no length is given.
pub const DEFAULT_DUMP_LENGTH: u32 = 4;

/// Rounds an address down to a word boundary.
pub fn normalize_dump_address(address: u32) -> u32 {
    address - (address % 4)
}

/// Rounds a length up to a whole number of words. Zero is treated as
/// [`DEFAULT_DUMP_LENGTH`]. Returns `None` if the rounded length does not fit into a `u32`.
pub fn normalize_dump_length(length: u32) -> Option<u32> {
    match length {
        0 => Some(DEFAULT_DUMP_LENGTH),
        n if n % 4 == 0 => Some(n),
        n => n.checked_add(4 - n % 4),
    }
}

/// Parses an address given as hexadecimal text, with or without a `0x` prefix.
pub fn parse_address(text: &str) -> Result<u32> {
    let text = text.trim();
    let digits = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .unwrap_or(text);
    u32::from_str_radix(digits, 16)
        .map_err(|e| Error::InvalidInput(format!("invalid address '{}': {}", text, e)))
}

/// Parses a length given as `0x`-prefixed hexadecimal or decimal text. A missing length means
/// [`DEFAULT_DUMP_LENGTH`].
pub fn parse_length(text: Option<&str>) -> Result<u32> {
    let text = match text {
        Some(text) => text.trim(),
        None => return Ok(DEFAULT_DUMP_LENGTH),
    };
    let parsed = if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16)
    } else {
        text.parse::<u32>()
    };
    parsed.map_err(|e| Error::InvalidInput(format!("invalid length '{}': {}", text, e)))
}

/// A normalized, word-aligned request for a single packet of memory.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct DumpRequest {
    address: u32,
    length: u32,
}

impl DumpRequest {
    /// Normalizes address and length. Fails if the result does not fit into one packet.
    pub fn new(address: u32, length: u32) -> Result<Self> {
        let length = match normalize_dump_length(length) {
            Some(length) if length as usize <= PACKET_SIZE => length,
            _ => {
                return Err(Error::InvalidInput(format!(
                    "cannot dump {} bytes at once, at most {} are supported",
                    length, PACKET_SIZE
                )))
            }
        };
        Ok(Self {
            address: normalize_dump_address(address),
            length,
        })
    }

    /// Builds a request from command line style text.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use wchlink::DumpRequest;
    ///
    /// let request = DumpRequest::parse("20000001", Some("5")).unwrap();
    /// assert_eq!(request.address(), 0x2000_0000);
    /// assert_eq!(request.length(), 8);
    /// ```
    pub fn parse(address: &str, length: Option<&str>) -> Result<Self> {
        Self::new(parse_address(address)?, parse_length(length)?)
    }

    /// Word-aligned start address.
    pub fn address(&self) -> u32 {
        self.address
    }

    /// Length in bytes, a multiple of four.
    pub fn length(&self) -> u32 {
        self.length
    }

    fn command(&self) -> Vec<u8> {
        let mut fields = Vec::with_capacity(8);
        push_u32(&mut fields, self.address);
        push_u32(&mut fields, self.length);
        encode_command(opcodes::MEMORY_READ, &fields)
    }
}

/// Memory contents read back from the target, with every word in display byte order.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct MemoryDump {
    pub address: u32,
    pub data: Vec<u8>,
}

impl fmt::Display for MemoryDump {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08x}: [", self.address)?;
        for (i, byte) in self.data.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "0x{:x}", byte)?;
        }
        f.write_str("]")
    }
}

impl<T: Transport> Session<T> {
    /// Reads one packet of target memory.
    pub fn dump(&mut self, request: &DumpRequest) -> Result<MemoryDump> {
        self.require(HandshakeState::Ready)?;
        log::info!(
            "Dumping {} bytes at 0x{:08x}",
            request.length,
            request.address
        );

        // The probe answers the request itself with nothing meaningful
        self.command(&request.command())?;
        self.exchange(&MEMORY_FETCH)?;

        let raw = self.read_data()?;
        let data = swap_words(&raw).ok_or_else(|| Error::MalformedReply {
            step: "memory read",
            actual: raw.clone(),
        })?;

        Ok(MemoryDump {
            address: request.address,
            data,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionConfig;
    use crate::error::ErrorKind;
    use crate::protocol::{EP_COMMAND_IN, EP_COMMAND_OUT, EP_DATA_IN};
    use crate::transport::mock::MockTransport;

    #[test]
    fn test_normalize_address() {
        for address in [0, 1, 2, 3, 4, 0x2000_0001, 0x2000_0003, u32::MAX] {
            let normalized = normalize_dump_address(address);
            assert_eq!(normalized % 4, 0);
            assert!(address - normalized < 4);
            assert_eq!(normalize_dump_address(normalized), normalized);
        }
    }

    #[test]
    fn test_normalize_length() {
        assert_eq!(normalize_dump_length(0), Some(4));
        assert_eq!(normalize_dump_length(1), Some(4));
        assert_eq!(normalize_dump_length(4), Some(4));
        assert_eq!(normalize_dump_length(5), Some(8));
        assert_eq!(normalize_dump_length(255), Some(256));
        assert_eq!(normalize_dump_length(u32::MAX - 3), Some(u32::MAX - 3));
        assert_eq!(normalize_dump_length(u32::MAX - 1), None);
        assert_eq!(normalize_dump_length(u32::MAX), None);
    }

    #[test]
    fn test_request_rejects_overflowing_length() {
        let error = DumpRequest::new(0, u32::MAX - 1).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Input);
    }

    #[test]
    fn test_parse() {
        assert_eq!(parse_address("0x20000000").unwrap(), 0x2000_0000);
        assert_eq!(parse_address("20000010").unwrap(), 0x2000_0010);
        assert_eq!(parse_length(None).unwrap(), 4);
        assert_eq!(parse_length(Some("0x10")).unwrap(), 16);
        assert_eq!(parse_length(Some("10")).unwrap(), 10);

        assert_eq!(parse_address("zz").unwrap_err().kind(), ErrorKind::Input);
        assert_eq!(parse_length(Some("ten")).unwrap_err().kind(), ErrorKind::Input);
    }

    #[test]
    fn test_request_normalization() {
        let request = DumpRequest::parse("0x20000001", Some("5")).unwrap();
        assert_eq!(request.address(), 0x2000_0000);
        assert_eq!(request.length(), 8);

        assert!(DumpRequest::new(0, 256).is_ok());
        assert!(matches!(
            DumpRequest::new(0, 257),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_dump() {
        let mut transport = MockTransport::new();
        transport
            .handshake_replies()
            .reply(EP_COMMAND_IN, &[0x82, 0x03, 0x01, 0x01])
            .reply(EP_COMMAND_IN, &[0x82, 0x02, 0x01, 0x0c])
            .reply(EP_DATA_IN, &[0x37, 0x13, 0x00, 0x20, 0xef, 0xbe, 0xad, 0xde]);
        let mut session = Session::new(transport, SessionConfig::default());
        session.handshake().unwrap();

        let request = DumpRequest::parse("0x20000001", Some("5")).unwrap();
        let dump = session.dump(&request).unwrap();
        assert_eq!(dump.address, 0x2000_0000);
        assert_eq!(
            dump.data,
            vec![0x20, 0x00, 0x13, 0x37, 0xde, 0xad, 0xbe, 0xef]
        );
        assert_eq!(
            dump.to_string(),
            "20000000: [0x20, 0x0, 0x13, 0x37, 0xde, 0xad, 0xbe, 0xef]"
        );

        let writes = session.into_transport().writes_to(EP_COMMAND_OUT);
        assert_eq!(
            &writes[4..],
            &[
                vec![0x81, 0x03, 0x08, 0x20, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x08],
                vec![0x81, 0x02, 0x01, 0x0c],
            ]
        );
    }

    #[test]
    fn test_dump_partial_word() {
        let mut transport = MockTransport::new();
        transport
            .handshake_replies()
            .reply(EP_COMMAND_IN, &[0x82, 0x03, 0x01, 0x01])
            .reply(EP_COMMAND_IN, &[0x82, 0x02, 0x01, 0x0c])
            .reply(EP_DATA_IN, &[0x01, 0x02, 0x03]);
        let mut session = Session::new(transport, SessionConfig::default());
        session.handshake().unwrap();

        let error = session.dump(&DumpRequest::new(0, 4).unwrap()).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Protocol);
    }
}
