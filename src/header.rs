use std::fmt;
use std::ops::Deref;

use crate::error::Error;

/// Synchronization source identifier, a 32-bit value identifying one RTP stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Ssrc(u32);

impl Deref for Ssrc {
    type Target = u32;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<u32> for Ssrc {
    fn from(v: u32) -> Self {
        Ssrc(v)
    }
}

impl From<Ssrc> for u32 {
    fn from(v: Ssrc) -> Self {
        v.0
    }
}

impl fmt::Display for Ssrc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The parts of the RTP fixed header (RFC 3550) the transforms need.
///
/// This is deliberately not a full RTP parser. Protection only needs to know
/// where the encrypted portion starts, the sequence number and the SSRC.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RtpHeader {
    pub sequence_number: u16,
    pub ssrc: Ssrc,
    /// Length of fixed header + CSRC list + extension, i.e. where the
    /// encrypted portion starts.
    pub header_len: usize,
}

impl RtpHeader {
    pub fn parse(buf: &[u8]) -> Result<RtpHeader, Error> {
        if buf.len() < 12 {
            return Err(Error::BadPacket("rtp header shorter than 12 bytes"));
        }

        if buf[0] >> 6 != 2 {
            return Err(Error::BadPacket("rtp version is not 2"));
        }

        let has_extension = buf[0] & 0x10 > 0;
        let csrc_count = (buf[0] & 0x0f) as usize;

        let sequence_number = u16::from_be_bytes([buf[2], buf[3]]);
        let ssrc = u32::from_be_bytes([buf[8], buf[9], buf[10], buf[11]]).into();

        let mut header_len = 12 + 4 * csrc_count;

        if has_extension {
            if buf.len() < header_len + 4 {
                return Err(Error::BadPacket("rtp extension header truncated"));
            }
            let words = u16::from_be_bytes([buf[header_len + 2], buf[header_len + 3]]) as usize;
            header_len += 4 + 4 * words;
        }

        if buf.len() < header_len {
            return Err(Error::BadPacket("rtp header exceeds packet"));
        }

        Ok(RtpHeader {
            sequence_number,
            ssrc,
            header_len,
        })
    }
}

/// The parts of the RTCP fixed header (RFC 3550) the transforms need.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RtcpHeader {
    pub ssrc: Ssrc,
}

impl RtcpHeader {
    pub fn parse(buf: &[u8]) -> Result<RtcpHeader, Error> {
        if buf.len() < 8 {
            return Err(Error::BadPacket("rtcp header shorter than 8 bytes"));
        }

        if buf[0] >> 6 != 2 {
            return Err(Error::BadPacket("rtcp version is not 2"));
        }

        let ssrc = u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]).into();

        Ok(RtcpHeader { ssrc })
    }
}

/// "extend" a 16 bit sequence number into a 64 bit packet index by using the
/// knowledge of the previous such index.
///
/// The index of the SRTP packet corresponding to a given ROC and RTP
/// sequence number is the 48-bit quantity i = 2^16 * ROC + SEQ.
///
/// https://tools.ietf.org/html/rfc3711#appendix-A
pub(crate) fn extend_seq(prev_index: Option<u64>, seq: u16) -> u64 {
    let seq = seq as u64;

    let Some(prev_index) = prev_index else {
        // No wrap-around so far.
        return seq;
    };

    let roc = prev_index >> 16; // how many wrap-arounds.
    let prev_seq = prev_index & 0xffff;

    let v = if prev_seq < 32_768 {
        if seq > 32_768 + prev_seq {
            // A late packet from before the last wrap-around. At roc 0 there
            // is nothing to go back to; the replay window rejects it as old.
            roc.saturating_sub(1) & 0xffff_ffff
        } else {
            roc
        }
    } else {
        if prev_seq > seq + 32_768 {
            (roc + 1) & 0xffff_ffff
        } else {
            roc
        }
    };

    v * 65_536 + seq
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parse_fixed_header() {
        let buf = [
            0x80, 0x08, 0x00, 0x07, //
            0x00, 0x00, 0x00, 0x00, //
            0x00, 0x00, 0x30, 0x39, //
            0xd4, 0xd4,
        ];
        let h = RtpHeader::parse(&buf).unwrap();
        assert_eq!(h.sequence_number, 7);
        assert_eq!(*h.ssrc, 12345);
        assert_eq!(h.header_len, 12);
    }

    #[test]
    fn parse_header_with_csrc_and_extension() {
        let mut buf = vec![
            0x91, 0x08, 0x12, 0x34, //
            0x00, 0x00, 0x00, 0x00, //
            0x00, 0x00, 0x30, 0x39, //
        ];
        // one CSRC
        buf.extend_from_slice(&[0, 0, 0, 1]);
        // extension, 2 words
        buf.extend_from_slice(&[0xbe, 0xde, 0x00, 0x02]);
        buf.extend_from_slice(&[0; 8]);
        buf.extend_from_slice(&[0xd4; 4]);

        let h = RtpHeader::parse(&buf).unwrap();
        assert_eq!(h.header_len, 12 + 4 + 4 + 8);
    }

    #[test]
    fn parse_rejects_bad_version() {
        let buf = [0u8; 12];
        assert!(matches!(
            RtpHeader::parse(&buf),
            Err(Error::BadPacket("rtp version is not 2"))
        ));
    }

    #[test]
    fn parse_rejects_truncated_extension() {
        let buf = [
            0x90, 0x08, 0x00, 0x07, //
            0x00, 0x00, 0x00, 0x00, //
            0x00, 0x00, 0x30, 0x39, //
        ];
        assert!(RtpHeader::parse(&buf).is_err());
    }

    #[test]
    fn extend_seq_no_previous() {
        assert_eq!(extend_seq(None, 0), 0);
        assert_eq!(extend_seq(None, 65_535), 65_535);
    }

    #[test]
    fn extend_seq_rollover() {
        // previous index right before the wrap, new seq after it.
        assert_eq!(extend_seq(Some(65_534), 2), 65_536 + 2);
        // in-order within the same roc.
        assert_eq!(extend_seq(Some(65_536 + 2), 3), 65_536 + 3);
        // late packet from before the wrap.
        assert_eq!(extend_seq(Some(65_536 + 2), 65_530), 65_530);
    }
}
