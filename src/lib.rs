//! Sans I/O SRTP/SRTCP session layer.
//!
//! This crate is the policy/session glue between raw crypto primitives and
//! application code exchanging media packets: configure a [`Policy`] per
//! stream (crypto suite, SSRC matching rule, replay window), multiplex any
//! number of streams inside one [`Session`], and push packets through
//! [`Session::protect`] / [`Session::unprotect`] (and their RTCP twins).
//! No sockets, no threads, no async; every call completes synchronously.
//!
//! Wire behavior follows RFC 3711 (SRTP) and RFC 7714 (AEAD suites). Key
//! exchange is out of scope: master keys arrive pre-agreed, e.g. from
//! DTLS-SRTP or SDES.
//!
//! # Usage
//!
//! ```
//! use srtp_session::{Policy, Session, SrtpProfile, SsrcRule};
//!
//! // 16 byte master key + 14 byte master salt.
//! let key = [0u8; 30];
//!
//! let mut policy = Policy::new(SrtpProfile::Aes128CmSha1_80);
//! policy.set_key(Some(&key))?;
//! policy.set_ssrc_rule(SsrcRule::AnyOutbound);
//!
//! let mut session = Session::with_policy(&policy)?;
//!
//! // A minimal RTP packet: fixed header, ssrc 12345, no payload.
//! let rtp = [
//!     0x80, 0x08, 0x00, 0x00, //
//!     0x00, 0x00, 0x00, 0x00, //
//!     0x00, 0x00, 0x30, 0x39, //
//! ];
//!
//! let protected = session.protect(&rtp)?;
//! assert_eq!(protected.len(), rtp.len() + 10); // 80-bit auth tag
//! # Ok::<(), srtp_session::Error>(())
//! ```
//!
//! A receiving session is the mirror image: an [`SsrcRule::AnyInbound`]
//! (or [`SsrcRule::Specific`]) policy with the same key, and
//! [`Session::unprotect`] per packet. Replay rejections and
//! authentication failures are per-packet errors; drop the packet and
//! keep the session.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

#[macro_use]
extern crate tracing;

mod crypto;
pub use crypto::CryptoError;

mod error;
pub use error::Error;

mod header;
pub use header::Ssrc;

mod policy;
pub use policy::{AuthType, CipherType, CryptoSuite, Policy, SrtpProfile, SsrcRule};

mod replay;

mod session;
pub use session::{Session, SRTCP_MAX_TRAILER_LEN, SRTP_MAX_TRAILER_LEN};

mod stream;
