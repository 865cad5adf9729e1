use thiserror::Error;

use crate::crypto::CryptoError;
use crate::header::Ssrc;

/// Errors for the whole SRTP session layer.
///
/// Callers are expected to branch on the variant, not the message. The
/// per-packet variants ([`Error::ReplayFail`], [`Error::ReplayOld`],
/// [`Error::AuthenticationFailure`]) mean "drop this packet and carry on";
/// they never invalidate the [`Session`][crate::Session].
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The packet does not fit the transform buffer together with the
    /// worst-case protection trailer.
    #[error("packet is too long ({len} bytes, max {max})")]
    PacketTooLong {
        /// Length of the offending packet.
        len: usize,
        /// Largest acceptable packet length.
        max: usize,
    },

    /// The packet does not look like RTP/RTCP at all.
    #[error("malformed packet: {0}")]
    BadPacket(&'static str),

    /// Master key material shorter than the crypto suite requires.
    #[error("key must contain at least {min} bytes, got {len}")]
    KeyTooShort {
        /// Length of the rejected key.
        len: usize,
        /// Minimum length for the configured suite (master key + salt).
        min: usize,
    },

    /// The policy cannot be turned into a stream context as configured.
    #[error("unsupported parameter: {0}")]
    UnsupportedParameter(&'static str),

    /// `add_stream` for an SSRC that already has a bound stream.
    #[error("a stream is already bound for ssrc {0}")]
    StreamExists(Ssrc),

    /// The operation references an SSRC no stream is bound to and no
    /// wildcard rule matches.
    #[error("no appropriate stream context found")]
    NoContextFound,

    /// The packet index was already seen inside the replay window.
    #[error("replay check failed (bad index)")]
    ReplayFail,

    /// The packet index is older than the replay window floor.
    #[error("replay check failed (index too old)")]
    ReplayOld,

    /// The authentication tag did not verify.
    #[error("authentication failure")]
    AuthenticationFailure,

    /// Failure inside the crypto engine.
    #[error("cipher failure: {0}")]
    Cipher(#[from] CryptoError),
}

impl Error {
    /// Whether this is a per-packet outcome the caller should treat by
    /// discarding the packet, as opposed to a configuration or usage error.
    pub fn is_per_packet(&self) -> bool {
        use Error::*;
        matches!(
            self,
            BadPacket(_) | ReplayFail | ReplayOld | AuthenticationFailure
        )
    }
}
