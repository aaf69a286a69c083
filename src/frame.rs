//! Framing of command packets and chunking of bulk payloads.
//!
//! A command frame is laid out as `[tag, opcode, length, fields...]`, where `length` counts
//! the opcode-specific fields only. Replies use the same layout with the probe tag.

/// Size of every packet exchanged on either endpoint pair.
pub const PACKET_SIZE: usize = 256;

/// Direction tag of frames sent from the host to the probe.
pub const HOST_TAG: u8 = 0x81;

/// Direction tag of frames sent from the probe to the host.
pub const PROBE_TAG: u8 = 0x82;

/// Filler used to pad the last bulk packet.
pub const FILL_BYTE: u8 = 0xff;

/// Largest number of fields a single frame can describe in its length byte.
pub const MAX_FIELDS: usize = u8::MAX as usize;

fn encode(tag: u8, opcode: u8, fields: &[u8]) -> Vec<u8> {
    assert!(
        fields.len() <= MAX_FIELDS,
        "{} frame fields do not fit the length byte",
        fields.len()
    );
    let mut frame = Vec::with_capacity(fields.len() + 3);
    frame.push(tag);
    frame.push(opcode);
    frame.push(fields.len() as u8);
    frame.extend_from_slice(fields);
    frame
}

/// Builds a host to probe command frame.
///
/// # Panics
///
/// Panics if `fields` is longer than [`MAX_FIELDS`].
///
/// # Examples
///
/// ```rust
/// use wchlink::frame::encode_command;
///
/// assert_eq!(encode_command(0x0d, &[0x01]), vec![0x81, 0x0d, 0x01, 0x01]);
/// ```
pub fn encode_command(opcode: u8, fields: &[u8]) -> Vec<u8> {
    encode(HOST_TAG, opcode, fields)
}

/// Builds the reply frame the probe sends for `opcode` with the given fields. Used to spell out
/// literal acknowledgments.
///
/// # Panics
///
/// Panics if `fields` is longer than [`MAX_FIELDS`].
pub fn encode_reply(opcode: u8, fields: &[u8]) -> Vec<u8> {
    encode(PROBE_TAG, opcode, fields)
}

/// Checks that a reply carries the probe tag and echoes the request's opcode.
pub fn is_reply_to(reply: &[u8], opcode: u8) -> bool {
    reply.len() >= 3 && reply[0] == PROBE_TAG && reply[1] == opcode
}

/// Appends a big-endian 32 bit field to a list of frame fields.
pub fn push_u32(fields: &mut Vec<u8>, value: u32) {
    fields.extend_from_slice(&value.to_be_bytes());
}

/// Splits a payload into packets of exactly `packet_size` bytes, padding the last one with
/// [`FILL_BYTE`].
///
/// The filler length is `packet_size - len % packet_size`, so a payload which is already a
/// multiple of the packet size is followed by one packet consisting of filler only. The probe
/// has only ever been driven this way, so the extra packet is kept.
///
/// # Panics
///
/// Panics if `packet_size` is zero.
///
/// # Examples
///
/// ```rust
/// use wchlink::frame::chunk_for_transfer;
///
/// let packets = chunk_for_transfer(&[0u8; 256], 256);
/// assert_eq!(packets.len(), 2);
/// assert!(packets[1].iter().all(|&b| b == 0xff));
/// ```
pub fn chunk_for_transfer(data: &[u8], packet_size: usize) -> Vec<Vec<u8>> {
    assert!(packet_size > 0, "packet size must not be zero");
    let padding = packet_size - (data.len() % packet_size);

    let mut padded = Vec::with_capacity(data.len() + padding);
    padded.extend_from_slice(data);
    padded.resize(data.len() + padding, FILL_BYTE);

    padded
        .chunks(packet_size)
        .map(|chunk| chunk.to_vec())
        .collect()
}

/// Reverses the byte order of every 32 bit word in a buffer. Returns `None` if the buffer does
/// not consist of whole words.
pub fn swap_words(data: &[u8]) -> Option<Vec<u8>> {
    if data.len() % 4 != 0 {
        return None;
    }
    Some(
        data.chunks(4)
            .flat_map(|word| word.iter().rev().copied())
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_command() {
        let mut fields = vec![0x00, 0x00, 0x00, 0x00];
        push_u32(&mut fields, 872);
        assert_eq!(
            encode_command(0x01, &fields),
            vec![0x81, 0x01, 0x08, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x03, 0x68]
        );
        assert_eq!(encode_reply(0x0c, &[0x01]), vec![0x82, 0x0c, 0x01, 0x01]);
    }

    #[test]
    fn test_encode_longest_frame() {
        let frame = encode_command(0x02, &[0xaa; MAX_FIELDS]);
        assert_eq!(frame.len(), MAX_FIELDS + 3);
        assert_eq!(frame[2], 0xff);
    }

    #[test]
    #[should_panic(expected = "do not fit the length byte")]
    fn test_encode_too_many_fields() {
        encode_command(0x01, &[0u8; 256]);
    }

    #[test]
    #[should_panic(expected = "packet size must not be zero")]
    fn test_chunk_zero_packet_size() {
        chunk_for_transfer(&[1, 2], 0);
    }

    #[test]
    fn test_is_reply_to() {
        assert!(is_reply_to(&[0x82, 0x0d, 0x01, 0x07], 0x0d));
        assert!(!is_reply_to(&[0x81, 0x0d, 0x01, 0x07], 0x0d));
        assert!(!is_reply_to(&[0x82, 0x0c, 0x01, 0x07], 0x0d));
        assert!(!is_reply_to(&[0x82, 0x0d], 0x0d));
    }

    #[test]
    fn test_chunk_packet_count() {
        for (length, expected) in [(0, 1), (1, 1), (255, 1), (256, 2), (257, 2), (512, 3)] {
            let data = vec![0x55u8; length];
            let packets = chunk_for_transfer(&data, PACKET_SIZE);
            assert_eq!(packets.len(), expected, "length {}", length);
            assert!(packets.iter().all(|p| p.len() == PACKET_SIZE));
        }
    }

    #[test]
    fn test_chunk_padding() {
        let data: Vec<u8> = (0..300u32).map(|i| i as u8).collect();
        let packets = chunk_for_transfer(&data, PACKET_SIZE);
        assert_eq!(packets.len(), 2);
        assert_eq!(&packets[0][..], &data[..256]);
        assert_eq!(&packets[1][..44], &data[256..]);
        assert!(packets[1][44..].iter().all(|&b| b == FILL_BYTE));
    }

    #[test]
    fn test_swap_words() {
        assert_eq!(
            swap_words(&[0x01, 0x02, 0x03, 0x04, 0xaa, 0xbb, 0xcc, 0xdd]),
            Some(vec![0x04, 0x03, 0x02, 0x01, 0xdd, 0xcc, 0xbb, 0xaa])
        );
        assert_eq!(swap_words(&[]), Some(vec![]));
        assert_eq!(swap_words(&[0x01, 0x02, 0x03]), None);
    }
}
