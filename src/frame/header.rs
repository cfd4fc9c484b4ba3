use super::types::FrameType;
use num_traits::{FromPrimitive, ToPrimitive};

/// The 9-byte frame header common to every frame type:
/// `length(3) | type(1) | flags(1) | R + stream_id(4)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub length: u32,
    pub raw_type: u8,
    pub flags: u8,
    pub stream_id: u32,
}

pub const HEADER_LEN: usize = 9;

impl FrameHeader {
    pub fn frame_type(&self) -> Option<FrameType> {
        FrameType::from_u8(self.raw_type)
    }

    pub fn parse(bytes: &[u8; HEADER_LEN]) -> Self {
        let length = u32::from_be_bytes([0, bytes[0], bytes[1], bytes[2]]);
        let raw_type = bytes[3];
        let flags = bytes[4];
        // top bit (R) is reserved and MUST be ignored on receipt.
        let stream_id = u32::from_be_bytes([bytes[5], bytes[6], bytes[7], bytes[8]]) & !(1 << 31);
        Self {
            length,
            raw_type,
            flags,
            stream_id,
        }
    }

    pub fn new(length: u32, ty: FrameType, flags: u8, stream_id: u32) -> Self {
        Self {
            length,
            raw_type: ty.to_u8().expect("FrameType fits in u8"),
            flags,
            stream_id,
        }
    }

    pub fn write(&self, out: &mut Vec<u8>) {
        let len = self.length.to_be_bytes();
        out.extend_from_slice(&len[1..]);
        out.push(self.raw_type);
        out.push(self.flags);
        out.extend_from_slice(&(self.stream_id & !(1 << 31)).to_be_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let header = FrameHeader::new(42, FrameType::Headers, 0x5, 17);
        let mut buf = Vec::new();
        header.write(&mut buf);
        assert_eq!(buf.len(), HEADER_LEN);
        let parsed = FrameHeader::parse(buf[..HEADER_LEN].try_into().unwrap());
        assert_eq!(parsed, header);
    }

    #[test]
    fn reserved_bit_is_cleared_on_parse() {
        let mut buf = [0u8; HEADER_LEN];
        buf[5] = 0x80; // set reserved bit
        buf[8] = 0x01;
        let parsed = FrameHeader::parse(&buf);
        assert_eq!(parsed.stream_id, 1);
    }
}
