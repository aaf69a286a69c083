//! Contains data structures for information the probe reports back to the connecting PC.

use crate::protocol::MODEL_LINK_E;
use std::fmt;

/// Firmware information read back from the probe during probe detection.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct FirmwareInfo {
    /// Probe firmware version.
    pub version: Version,

    /// Model byte, [`MODEL_LINK_E`](crate::protocol::MODEL_LINK_E) for LinkE probes.
    pub model: u8,
}

impl FirmwareInfo {
    /// Decodes the probe-detect reply. Returns `None` if the reply is too short or was not sent
    /// by a LinkE, whose version bytes are the only ones known.
    pub fn from_reply(reply: &[u8]) -> Option<Self> {
        match reply {
            [_, _, _, major, minor, model, ..] if *model == MODEL_LINK_E => Some(Self {
                version: Version {
                    major: *major,
                    minor: *minor,
                },
                model: *model,
            }),
            _ => None,
        }
    }
}

impl fmt::Display for FirmwareInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WCH-LinkE v{}", self.version)
    }
}

/// Represents a version number as used for the probe firmware version.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct Version {
    pub major: u8,
    pub minor: u8,
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_reply() {
        let info = FirmwareInfo::from_reply(&[0x82, 0x0d, 0x04, 0x02, 0x0a, 0x12]).unwrap();
        assert_eq!(info.version, Version { major: 2, minor: 10 });
        assert_eq!(info.to_string(), "WCH-LinkE v2.10");

        assert_eq!(
            FirmwareInfo::from_reply(&[0x82, 0x0d, 0x04, 0x02, 0x0a, 0x01]),
            None
        );
        assert_eq!(FirmwareInfo::from_reply(&[0x82, 0x0d, 0x01]), None);
    }
}
