//! Byte-level framing for [`Pdu`] over a stream transport.
//!
//! Each [`Frame`] is written as a 4-byte big-endian length, a single
//! more-flag byte (`1` if another frame follows in the same PDU, `0` if this
//! is the last), and then the frame's payload bytes. This is the concrete
//! framing a stream socket (concordd's reactor, `cw-run`) needs underneath
//! the frame/PDU model of §4.3; it carries no semantics of its own.

use crate::error::{ApiError, Result};
use crate::kind::Kind;
use crate::transport::{Frame, Pdu};

const LEN_BYTES: usize = 4;
const MORE_BYTES: usize = 1;
const HEADER_LEN: usize = LEN_BYTES + MORE_BYTES;

pub fn encode_frame(frame: &Frame, out: &mut Vec<u8>) {
    let len = frame.bytes.len() as u32;
    out.extend_from_slice(&len.to_be_bytes());
    out.push(if frame.more { 1 } else { 0 });
    out.extend_from_slice(&frame.bytes);
}

pub fn encode_pdu(pdu: &Pdu) -> Vec<u8> {
    let mut out = Vec::new();
    for frame in pdu.to_frames() {
        encode_frame(&frame, &mut out);
    }
    out
}

/// Pull exactly one frame off the front of `buf`, returning it and the
/// number of bytes consumed. `None` when `buf` does not yet hold a complete
/// frame (the caller should read more bytes from the socket and retry).
pub fn decode_frame(buf: &[u8]) -> Result<Option<(Frame, usize)>> {
    if buf.len() < HEADER_LEN {
        return Ok(None);
    }
    let len = u32::from_be_bytes(buf[0..LEN_BYTES].try_into().unwrap()) as usize;
    let more = buf[LEN_BYTES] != 0;
    let total = HEADER_LEN + len;
    if buf.len() < total {
        return Ok(None);
    }
    let bytes = buf[HEADER_LEN..total].to_vec();
    Ok(Some((Frame { bytes, more }, total)))
}

/// Pull one complete PDU (a run of frames ending in `more == false`) off the
/// front of `buf`. `None` when `buf` does not yet hold a complete PDU.
pub fn decode_pdu(buf: &[u8], expect_identity: bool) -> Result<Option<(Pdu, usize)>> {
    let mut frames = Vec::new();
    let mut offset = 0;
    loop {
        let Some((frame, consumed)) = decode_frame(&buf[offset..])? else {
            return Ok(None);
        };
        offset += consumed;
        let more = frame.more;
        frames.push(frame);
        if !more {
            break;
        }
    }
    if frames.is_empty() {
        return Err(ApiError::new(Kind::ParseError, "PDU has no frames"));
    }
    let pdu = Pdu::from_frames(&frames, expect_identity)?;
    Ok(Some((pdu, offset)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::PduType;

    #[test]
    fn pdu_roundtrips_through_wire_framing() {
        let pdu = Pdu::new(PduType::Ping, vec![]);
        let bytes = encode_pdu(&pdu);
        let (decoded, consumed) = decode_pdu(&bytes, false).unwrap().unwrap();
        assert_eq!(consumed, bytes.len());
        assert_eq!(decoded.pdu_type(), Some(PduType::Ping));
    }

    #[test]
    fn partial_buffer_yields_none_instead_of_error() {
        let pdu = Pdu::new(PduType::Hello, vec![b"v1".to_vec()]);
        let bytes = encode_pdu(&pdu);
        assert!(decode_pdu(&bytes[..bytes.len() - 1], false).unwrap().is_none());
    }

    #[test]
    fn two_pdus_back_to_back_decode_independently() {
        let a = Pdu::new(PduType::Ping, vec![]);
        let b = Pdu::new(PduType::Pong, vec![]);
        let mut bytes = encode_pdu(&a);
        bytes.extend(encode_pdu(&b));

        let (first, consumed) = decode_pdu(&bytes, false).unwrap().unwrap();
        assert_eq!(first.pdu_type(), Some(PduType::Ping));
        let (second, _) = decode_pdu(&bytes[consumed..], false).unwrap().unwrap();
        assert_eq!(second.pdu_type(), Some(PduType::Pong));
    }
}
