use std::fmt;

use crate::error::Error;
use crate::header::Ssrc;

/// Named SRTP protection profiles (RFC 5764 / RFC 7714 registry names).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SrtpProfile {
    /// AES-128 counter mode with 80-bit HMAC-SHA1 tag (the default).
    Aes128CmSha1_80,
    /// AES-128 counter mode with 32-bit HMAC-SHA1 tag.
    Aes128CmSha1_32,
    /// AEAD AES-128 GCM.
    AeadAes128Gcm,
    /// AEAD AES-256 GCM.
    AeadAes256Gcm,
}

impl SrtpProfile {
    /// The crypto suite this profile selects for RTP.
    pub fn rtp_suite(&self) -> CryptoSuite {
        match self {
            SrtpProfile::Aes128CmSha1_80 => CryptoSuite::AES_CM_128_HMAC_SHA1_80,
            SrtpProfile::Aes128CmSha1_32 => CryptoSuite::AES_CM_128_HMAC_SHA1_32,
            SrtpProfile::AeadAes128Gcm => CryptoSuite::AEAD_AES_128_GCM,
            SrtpProfile::AeadAes256Gcm => CryptoSuite::AEAD_AES_256_GCM,
        }
    }

    /// The crypto suite this profile selects for RTCP.
    ///
    /// A 32-bit tag on RTCP would not be RFC 3711 compliant, so like
    /// libsrtp we do not honor it and use the 80-bit suite instead.
    pub fn rtcp_suite(&self) -> CryptoSuite {
        match self {
            SrtpProfile::Aes128CmSha1_80 | SrtpProfile::Aes128CmSha1_32 => {
                CryptoSuite::AES_CM_128_HMAC_SHA1_80
            }
            SrtpProfile::AeadAes128Gcm => CryptoSuite::AEAD_AES_128_GCM,
            SrtpProfile::AeadAes256Gcm => CryptoSuite::AEAD_AES_256_GCM,
        }
    }

    /// Master key + master salt length this profile expects.
    pub fn keying_material_len(&self) -> usize {
        self.rtp_suite().keying_material_len()
    }
}

impl fmt::Display for SrtpProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SrtpProfile::Aes128CmSha1_80 => write!(f, "SRTP_AES128_CM_SHA1_80"),
            SrtpProfile::Aes128CmSha1_32 => write!(f, "SRTP_AES128_CM_SHA1_32"),
            SrtpProfile::AeadAes128Gcm => write!(f, "SRTP_AEAD_AES_128_GCM"),
            SrtpProfile::AeadAes256Gcm => write!(f, "SRTP_AEAD_AES_256_GCM"),
        }
    }
}

/// Cipher algorithm of a [`CryptoSuite`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CipherType {
    /// No encryption.
    Null,
    /// AES-128 in counter mode.
    AesCm128,
    /// AES-128 GCM.
    AesGcm128,
    /// AES-256 GCM.
    AesGcm256,
}

/// Authentication algorithm of a [`CryptoSuite`].
///
/// AEAD suites carry [`AuthType::Null`]; their tag comes from the cipher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthType {
    /// No separate authentication function.
    Null,
    /// HMAC-SHA1 with a truncated tag.
    HmacSha1,
}

/// One concrete combination of cipher, key lengths and tag length.
///
/// Either produced from a named [`SrtpProfile`] or picked directly from the
/// associated constants (the discrete crypto-policy path); both roads lead
/// to the same value, there is no separate configuration type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CryptoSuite {
    /// Cipher algorithm.
    pub cipher: CipherType,
    /// Session encryption key length in bytes.
    pub cipher_key_len: usize,
    /// Session salt length in bytes.
    pub salt_len: usize,
    /// Authentication algorithm.
    pub auth: AuthType,
    /// Session authentication key length in bytes.
    pub auth_key_len: usize,
    /// Authentication tag length in bytes (the AEAD tag for GCM suites).
    pub auth_tag_len: usize,
}

impl CryptoSuite {
    /// AES-128 counter mode, HMAC-SHA1 with 80-bit tag.
    pub const AES_CM_128_HMAC_SHA1_80: CryptoSuite = CryptoSuite {
        cipher: CipherType::AesCm128,
        cipher_key_len: 16,
        salt_len: 14,
        auth: AuthType::HmacSha1,
        auth_key_len: 20,
        auth_tag_len: 10,
    };

    /// AES-128 counter mode, HMAC-SHA1 with 32-bit tag.
    pub const AES_CM_128_HMAC_SHA1_32: CryptoSuite = CryptoSuite {
        auth_tag_len: 4,
        ..CryptoSuite::AES_CM_128_HMAC_SHA1_80
    };

    /// AEAD AES-128 GCM (RFC 7714).
    pub const AEAD_AES_128_GCM: CryptoSuite = CryptoSuite {
        cipher: CipherType::AesGcm128,
        cipher_key_len: 16,
        salt_len: 12,
        auth: AuthType::Null,
        auth_key_len: 0,
        auth_tag_len: 16,
    };

    /// AEAD AES-256 GCM (RFC 7714).
    pub const AEAD_AES_256_GCM: CryptoSuite = CryptoSuite {
        cipher: CipherType::AesGcm256,
        cipher_key_len: 32,
        ..CryptoSuite::AEAD_AES_128_GCM
    };

    /// Authentication only, no encryption. Only reachable through the
    /// discrete suite path; no named profile selects it.
    pub const NULL_HMAC_SHA1_80: CryptoSuite = CryptoSuite {
        cipher: CipherType::Null,
        ..CryptoSuite::AES_CM_128_HMAC_SHA1_80
    };

    /// Master key length in bytes.
    pub fn master_key_len(&self) -> usize {
        self.cipher_key_len
    }

    /// Master salt length in bytes.
    pub fn master_salt_len(&self) -> usize {
        self.salt_len
    }

    /// Expected caller-supplied key material length: master key + salt.
    /// Computed from the suite, never from caller input.
    pub fn keying_material_len(&self) -> usize {
        self.cipher_key_len + self.salt_len
    }

    /// Whether the suite is an AEAD construction.
    pub fn is_aead(&self) -> bool {
        matches!(self.cipher, CipherType::AesGcm128 | CipherType::AesGcm256)
    }

    /// Whether this suite provides confidentiality.
    pub fn confidentiality(&self) -> bool {
        self.cipher != CipherType::Null
    }

    /// Whether this suite provides authentication.
    pub fn authentication(&self) -> bool {
        self.auth != AuthType::Null || self.is_aead()
    }

    /// Exact number of bytes protection appends to an RTP packet.
    pub fn rtp_trailer_len(&self) -> usize {
        self.auth_tag_len
    }

    /// Exact number of bytes protection appends to an RTCP packet. This
    /// includes the explicit SRTCP index field.
    pub fn rtcp_trailer_len(&self) -> usize {
        crate::crypto::srtp::SRTCP_INDEX_LEN + self.auth_tag_len
    }
}

/// How a stream policy binds to SSRC values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SsrcRule {
    /// Not yet decided. A policy with this rule cannot create a stream.
    #[default]
    Undefined,
    /// Exactly one SSRC value.
    Specific(Ssrc),
    /// Any not-yet-bound SSRC observed on received packets.
    AnyInbound,
    /// Any not-yet-bound SSRC observed on sent packets.
    AnyOutbound,
}

impl fmt::Display for SsrcRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SsrcRule::Undefined => write!(f, "undefined"),
            SsrcRule::Specific(ssrc) => write!(f, "ssrc {}", ssrc),
            SsrcRule::AnyInbound => write!(f, "any inbound"),
            SsrcRule::AnyOutbound => write!(f, "any outbound"),
        }
    }
}

/// Configuration for a single SRTP stream or stream-class.
///
/// Pure data. A policy is only inspected when a [`Session`][crate::Session]
/// creates a stream context from it; mutating it afterwards has no effect
/// on contexts that already exist.
#[derive(Debug, Clone)]
pub struct Policy {
    rtp: CryptoSuite,
    rtcp: CryptoSuite,
    ssrc_rule: SsrcRule,
    key: Option<Vec<u8>>,
    window_size: u32,
    allow_repeat_tx: bool,
}

impl Policy {
    /// New policy with the suites of the given profile, no key and an
    /// undefined SSRC rule.
    pub fn new(profile: SrtpProfile) -> Policy {
        Policy {
            rtp: profile.rtp_suite(),
            rtcp: profile.rtcp_suite(),
            ssrc_rule: SsrcRule::Undefined,
            key: None,
            window_size: 0,
            allow_repeat_tx: false,
        }
    }

    /// The master key + master salt, if set.
    pub fn key(&self) -> Option<&[u8]> {
        self.key.as_deref()
    }

    /// Set (or with `None` clear) the master key + master salt.
    ///
    /// The key must contain at least [`CryptoSuite::keying_material_len`]
    /// bytes for the configured suites. Longer keys are accepted and the
    /// excess ignored, to tolerate material with appended MKI bytes. On
    /// rejection the previously set key remains in place.
    pub fn set_key(&mut self, key: Option<&[u8]>) -> Result<(), Error> {
        let Some(key) = key else {
            self.key = None;
            return Ok(());
        };

        let min = self.required_key_len();
        if key.len() < min {
            return Err(Error::KeyTooShort {
                len: key.len(),
                min,
            });
        }

        self.key = Some(key.to_vec());
        Ok(())
    }

    /// The SSRC matching rule.
    pub fn ssrc_rule(&self) -> SsrcRule {
        self.ssrc_rule
    }

    /// Set the SSRC matching rule.
    pub fn set_ssrc_rule(&mut self, rule: SsrcRule) {
        self.ssrc_rule = rule;
    }

    /// Replay protection window size in packets. 0 selects the engine
    /// default (128).
    pub fn window_size(&self) -> u32 {
        self.window_size
    }

    /// Set the replay protection window size.
    pub fn set_window_size(&mut self, window_size: u32) {
        self.window_size = window_size;
    }

    /// Whether retransmissions of packets with the same sequence number
    /// are allowed.
    pub fn allow_repeat_tx(&self) -> bool {
        self.allow_repeat_tx
    }

    /// Allow or disallow repeat transmissions.
    pub fn set_allow_repeat_tx(&mut self, allow_repeat_tx: bool) {
        self.allow_repeat_tx = allow_repeat_tx;
    }

    /// Replace both suites from a named profile.
    ///
    /// An already set key is not revalidated here; a key that is too short
    /// for the new suites is rejected when the policy is consumed.
    pub fn set_profile(&mut self, profile: SrtpProfile) {
        self.rtp = profile.rtp_suite();
        self.rtcp = profile.rtcp_suite();
    }

    /// Replace the suites with discrete selections, the equivalent of the
    /// crypto-policy constants in libsrtp.
    pub fn set_crypto_suites(&mut self, rtp: CryptoSuite, rtcp: CryptoSuite) {
        self.rtp = rtp;
        self.rtcp = rtcp;
    }

    /// The suite protecting RTP.
    pub fn rtp_suite(&self) -> CryptoSuite {
        self.rtp
    }

    /// The suite protecting RTCP.
    pub fn rtcp_suite(&self) -> CryptoSuite {
        self.rtcp
    }

    pub(crate) fn required_key_len(&self) -> usize {
        self.rtp
            .keying_material_len()
            .max(self.rtcp.keying_material_len())
    }
}

impl Default for Policy {
    fn default() -> Self {
        Policy::new(SrtpProfile::Aes128CmSha1_80)
    }
}
