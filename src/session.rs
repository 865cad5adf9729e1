use std::collections::HashMap;
use std::fmt;

use crate::crypto;
use crate::crypto::srtp::{MAX_MKI_LEN, MAX_TAG_LEN, SRTCP_INDEX_LEN};
use crate::error::Error;
use crate::header::{RtcpHeader, RtpHeader, Ssrc};
use crate::policy::{Policy, SsrcRule};
use crate::stream::{StreamContext, StreamTemplate};

/// Worst-case bytes SRTP protection can append: auth tag + MKI.
pub const SRTP_MAX_TRAILER_LEN: usize = MAX_TAG_LEN + MAX_MKI_LEN;

/// Worst-case bytes SRTCP protection can append: index + auth tag + MKI.
pub const SRTCP_MAX_TRAILER_LEN: usize = SRTCP_INDEX_LEN + MAX_TAG_LEN + MAX_MKI_LEN;

/// Size of the per-session transform buffer, and with it the largest
/// packet a session can process.
const SCRATCH_LEN: usize = 1500;

/// SRTP session, which may comprise several streams.
///
/// A session owns one stream context per bound SSRC plus up to one wildcard
/// template per direction. Streams are bound either explicitly via
/// [`Session::add_stream`] (a [`SsrcRule::Specific`] policy) or lazily when
/// a packet with a new SSRC matches a wildcard policy.
///
/// A session with no streams is legal and useful as a receiver that
/// acquires streams through an [`SsrcRule::AnyInbound`] policy.
///
/// All operations are synchronous and CPU-bound. The internal transform
/// buffer is reused across calls, so a `Session` must not be shared between
/// threads without external locking.
pub struct Session {
    streams: HashMap<Ssrc, StreamContext>,
    inbound: Option<StreamTemplate>,
    outbound: Option<StreamTemplate>,
    scratch: Vec<u8>,
}

impl Session {
    /// New session with zero streams.
    pub fn new() -> Session {
        crypto::ensure_init();

        Session {
            streams: HashMap::new(),
            inbound: None,
            outbound: None,
            scratch: vec![0; SCRATCH_LEN],
        }
    }

    /// New session with one stream created from `policy`.
    ///
    /// The policy's key and suites are validated here; a wildcard policy
    /// without a key fails now, not at protect time.
    pub fn with_policy(policy: &Policy) -> Result<Session, Error> {
        let mut session = Session::new();
        session.add_stream(policy)?;
        Ok(session)
    }

    /// Add a stream to the session, applying the given `policy` to it.
    ///
    /// The policy is consumed by value semantics: key material is copied
    /// and later mutation of `policy` has no effect on the stream.
    pub fn add_stream(&mut self, policy: &Policy) -> Result<(), Error> {
        let template = StreamTemplate::from_policy(policy)?;

        match policy.ssrc_rule() {
            SsrcRule::Undefined => Err(Error::UnsupportedParameter("undefined ssrc rule")),
            SsrcRule::Specific(ssrc) => {
                if self.streams.contains_key(&ssrc) {
                    return Err(Error::StreamExists(ssrc));
                }
                let ctx = template.spawn(ssrc)?;
                debug!("Bind stream for ssrc {}", ssrc);
                self.streams.insert(ssrc, ctx);
                Ok(())
            }
            SsrcRule::AnyInbound => {
                if self.inbound.is_some() {
                    return Err(Error::UnsupportedParameter(
                        "an inbound wildcard stream already exists",
                    ));
                }
                self.inbound = Some(template);
                Ok(())
            }
            SsrcRule::AnyOutbound => {
                if self.outbound.is_some() {
                    return Err(Error::UnsupportedParameter(
                        "an outbound wildcard stream already exists",
                    ));
                }
                self.outbound = Some(template);
                Ok(())
            }
        }
    }

    /// Remove the stream bound to `ssrc`, destroying its context.
    ///
    /// The caller always passes a concrete SSRC, also when the stream was
    /// bound through a wildcard rule that resolved to this value. Fails
    /// with [`Error::NoContextFound`] when nothing is bound to `ssrc`,
    /// which is the expected outcome of a double removal.
    pub fn remove_stream(&mut self, ssrc: impl Into<Ssrc>) -> Result<(), Error> {
        let ssrc = ssrc.into();
        match self.streams.remove(&ssrc) {
            Some(_) => {
                debug!("Unbind stream for ssrc {}", ssrc);
                Ok(())
            }
            None => Err(Error::NoContextFound),
        }
    }

    /// Apply SRTP protection to an RTP packet.
    ///
    /// The returned packet is the input plus exactly the suite's trailer.
    pub fn protect(&mut self, packet: &[u8]) -> Result<Vec<u8>, Error> {
        let max = SCRATCH_LEN - SRTP_MAX_TRAILER_LEN;
        if packet.len() > max {
            return Err(Error::PacketTooLong {
                len: packet.len(),
                max,
            });
        }

        let header = RtpHeader::parse(packet)?;

        let Session {
            streams,
            outbound,
            scratch,
            ..
        } = self;

        let n = match streams.get_mut(&header.ssrc) {
            Some(stream) => stream.protect_rtp(packet, &header, scratch)?,
            None => {
                let template = outbound.as_ref().ok_or(Error::NoContextFound)?;
                let mut stream = template.spawn(header.ssrc)?;
                let n = stream.protect_rtp(packet, &header, scratch)?;
                debug!("Bind outbound stream for ssrc {}", header.ssrc);
                streams.insert(header.ssrc, stream);
                n
            }
        };

        Ok(scratch[..n].to_vec())
    }

    /// Verify and remove SRTP protection from a packet.
    ///
    /// [`Error::ReplayFail`], [`Error::ReplayOld`] and
    /// [`Error::AuthenticationFailure`] are per-packet outcomes: drop the
    /// packet and keep using the session.
    pub fn unprotect(&mut self, packet: &[u8]) -> Result<Vec<u8>, Error> {
        if packet.len() > SCRATCH_LEN {
            return Err(Error::PacketTooLong {
                len: packet.len(),
                max: SCRATCH_LEN,
            });
        }

        let header = RtpHeader::parse(packet)?;

        let Session {
            streams,
            inbound,
            scratch,
            ..
        } = self;

        let n = match streams.get_mut(&header.ssrc) {
            Some(stream) => stream.unprotect_rtp(packet, &header, scratch)?,
            None => {
                let template = inbound.as_ref().ok_or(Error::NoContextFound)?;
                // The packet must authenticate before the new SSRC binds a
                // stream; a spoofed SSRC must not occupy the table.
                let mut stream = template.spawn(header.ssrc)?;
                let n = stream.unprotect_rtp(packet, &header, scratch)?;
                debug!("Bind inbound stream for ssrc {}", header.ssrc);
                streams.insert(header.ssrc, stream);
                n
            }
        };

        Ok(scratch[..n].to_vec())
    }

    /// Apply SRTCP protection to an RTCP packet.
    pub fn protect_rtcp(&mut self, packet: &[u8]) -> Result<Vec<u8>, Error> {
        let max = SCRATCH_LEN - SRTCP_MAX_TRAILER_LEN;
        if packet.len() > max {
            return Err(Error::PacketTooLong {
                len: packet.len(),
                max,
            });
        }

        let header = RtcpHeader::parse(packet)?;

        let Session {
            streams,
            outbound,
            scratch,
            ..
        } = self;

        let n = match streams.get_mut(&header.ssrc) {
            Some(stream) => stream.protect_rtcp(packet, scratch)?,
            None => {
                let template = outbound.as_ref().ok_or(Error::NoContextFound)?;
                let mut stream = template.spawn(header.ssrc)?;
                let n = stream.protect_rtcp(packet, scratch)?;
                debug!("Bind outbound stream for ssrc {}", header.ssrc);
                streams.insert(header.ssrc, stream);
                n
            }
        };

        Ok(scratch[..n].to_vec())
    }

    /// Verify and remove SRTCP protection from a packet.
    pub fn unprotect_rtcp(&mut self, packet: &[u8]) -> Result<Vec<u8>, Error> {
        if packet.len() > SCRATCH_LEN {
            return Err(Error::PacketTooLong {
                len: packet.len(),
                max: SCRATCH_LEN,
            });
        }

        let header = RtcpHeader::parse(packet)?;

        let Session {
            streams,
            inbound,
            scratch,
            ..
        } = self;

        let n = match streams.get_mut(&header.ssrc) {
            Some(stream) => stream.unprotect_rtcp(packet, scratch)?,
            None => {
                let template = inbound.as_ref().ok_or(Error::NoContextFound)?;
                let mut stream = template.spawn(header.ssrc)?;
                let n = stream.unprotect_rtcp(packet, scratch)?;
                debug!("Bind inbound stream for ssrc {}", header.ssrc);
                streams.insert(header.ssrc, stream);
                n
            }
        };

        Ok(scratch[..n].to_vec())
    }
}

impl Default for Session {
    fn default() -> Self {
        Session::new()
    }
}

// The cipher contexts inside the stream table have no derivable Debug.
impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("streams", &self.streams.keys())
            .finish_non_exhaustive()
    }
}
