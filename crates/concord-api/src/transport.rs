//! Frames and PDUs (spec §4.3).
//!
//! A PDU is an ordered, non-empty sequence of frames, optionally preceded
//! by a single identity frame (an opaque 8-byte peer cookie). The first
//! payload frame is always a printable ASCII type name.

use crate::error::{ApiError, Result};
use crate::kind::Kind;

pub const IDENTITY_LEN: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub bytes: Vec<u8>,
    pub more: bool,
}

impl Frame {
    pub fn new(bytes: impl Into<Vec<u8>>, more: bool) -> Self {
        Self { bytes: bytes.into(), more }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PduType {
    Hello,
    Ping,
    Pong,
    Facts,
    Policy,
    File,
    Data,
    GetCert,
    SendCert,
    Report,
    Request,
    Submitted,
    Check,
    Result,
    Optout,
    Done,
    Error,
    Bye,
}

impl PduType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PduType::Hello => "HELLO",
            PduType::Ping => "PING",
            PduType::Pong => "PONG",
            PduType::Facts => "FACTS",
            PduType::Policy => "POLICY",
            PduType::File => "FILE",
            PduType::Data => "DATA",
            PduType::GetCert => "GET_CERT",
            PduType::SendCert => "SEND_CERT",
            PduType::Report => "REPORT",
            PduType::Request => "REQUEST",
            PduType::Submitted => "SUBMITTED",
            PduType::Check => "CHECK",
            PduType::Result => "RESULT",
            PduType::Optout => "OPTOUT",
            PduType::Done => "DONE",
            PduType::Error => "ERROR",
            PduType::Bye => "BYE",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "HELLO" => PduType::Hello,
            "PING" => PduType::Ping,
            "PONG" => PduType::Pong,
            "FACTS" => PduType::Facts,
            "POLICY" => PduType::Policy,
            "FILE" => PduType::File,
            "DATA" => PduType::Data,
            "GET_CERT" => PduType::GetCert,
            "SEND_CERT" => PduType::SendCert,
            "REPORT" => PduType::Report,
            "REQUEST" => PduType::Request,
            "SUBMITTED" => PduType::Submitted,
            "CHECK" => PduType::Check,
            "RESULT" => PduType::Result,
            "OPTOUT" => PduType::Optout,
            "DONE" => PduType::Done,
            "ERROR" => PduType::Error,
            "BYE" => PduType::Bye,
            _ => return None,
        })
    }
}

/// An assembled multi-frame message, ready to hand to a reactor handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pdu {
    pub identity: Option<[u8; IDENTITY_LEN]>,
    /// `None` when the type frame's text is not a recognized type name; the
    /// reactor routes these (and the empty-string case) to its ignore path
    /// rather than invoking a handler (spec §8).
    pub raw_type: String,
    pub payload: Vec<Vec<u8>>,
}

impl Pdu {
    pub fn new(pdu_type: PduType, payload: Vec<Vec<u8>>) -> Self {
        Self {
            identity: None,
            raw_type: pdu_type.as_str().to_string(),
            payload,
        }
    }

    pub fn with_identity(mut self, identity: [u8; IDENTITY_LEN]) -> Self {
        self.identity = Some(identity);
        self
    }

    pub fn pdu_type(&self) -> Option<PduType> {
        PduType::parse(&self.raw_type)
    }

    pub fn error(kind: Kind, message: &str) -> Self {
        Pdu::new(PduType::Error, vec![kind.as_str().as_bytes().to_vec(), message.as_bytes().to_vec()])
    }

    pub fn to_frames(&self) -> Vec<Frame> {
        let mut frames = Vec::new();
        if let Some(identity) = self.identity {
            frames.push(Frame::new(identity.to_vec(), true));
        }
        if self.payload.is_empty() {
            frames.push(Frame::new(self.raw_type.as_bytes().to_vec(), false));
        } else {
            frames.push(Frame::new(self.raw_type.as_bytes().to_vec(), true));
            for (i, part) in self.payload.iter().enumerate() {
                let more = i + 1 < self.payload.len();
                frames.push(Frame::new(part.clone(), more));
            }
        }
        frames
    }

    /// Reassemble a PDU from its wire frames. `expect_identity` mirrors
    /// whether the receiving socket is one that prepends a peer identity
    /// frame (a ROUTER-style endpoint does; a point-to-point one doesn't).
    pub fn from_frames(frames: &[Frame], expect_identity: bool) -> Result<Self> {
        let mut iter = frames.iter();
        let mut identity = None;

        if expect_identity {
            let id_frame = iter
                .next()
                .ok_or_else(|| ApiError::new(Kind::ParseError, "PDU is missing its identity frame"))?;
            let bytes: [u8; IDENTITY_LEN] = id_frame
                .bytes
                .as_slice()
                .try_into()
                .map_err(|_| ApiError::new(Kind::ParseError, "identity frame must be 8 bytes"))?;
            identity = Some(bytes);
        }

        let type_frame = iter
            .next()
            .ok_or_else(|| ApiError::new(Kind::ParseError, "PDU is missing its type frame"))?;
        let raw_type = String::from_utf8(type_frame.bytes.clone())
            .map_err(|_| ApiError::new(Kind::ParseError, "PDU type frame is not valid UTF-8"))?;

        let payload: Vec<Vec<u8>> = iter.map(|f| f.bytes.clone()).collect();

        Ok(Pdu { identity, raw_type, payload })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_preserves_frame_sequence_modulo_identity() {
        let pdu = Pdu::new(PduType::Facts, vec![b"os=linux".to_vec(), b"arch=x86_64".to_vec()])
            .with_identity([1, 2, 3, 4, 5, 6, 7, 8]);
        let frames = pdu.to_frames();
        let back = Pdu::from_frames(&frames, true).unwrap();
        assert_eq!(back.payload, pdu.payload);
        assert_eq!(back.raw_type, pdu.raw_type);
        assert_eq!(back.identity, pdu.identity);
    }

    #[test]
    fn empty_type_is_not_a_recognized_pdu_type() {
        let pdu = Pdu {
            identity: None,
            raw_type: String::new(),
            payload: vec![],
        };
        assert!(pdu.pdu_type().is_none());
    }

    #[test]
    fn ping_with_no_payload_roundtrips() {
        let pdu = Pdu::new(PduType::Ping, vec![]);
        let frames = pdu.to_frames();
        assert_eq!(frames.len(), 1);
        assert!(!frames[0].more);
        let back = Pdu::from_frames(&frames, false).unwrap();
        assert_eq!(back.pdu_type(), Some(PduType::Ping));
    }
}
