//! Per-suite cipher contexts and the SRTP/SRTCP IV and tag formation.
//!
//! The OpenSSL `CipherCtx` instances are created once per stream and reused
//! for every packet; only the IV changes between calls.

use std::fmt;

use openssl::cipher;
use openssl::cipher_ctx::CipherCtx;

use crate::crypto::{sha1_hmac, CryptoError};
use crate::header::Ssrc;
use crate::policy::{CipherType, CryptoSuite};

/// Largest authentication tag any supported suite produces.
pub(crate) const MAX_TAG_LEN: usize = 16;

/// Largest master key identifier the trailer budget reserves for. MKI is a
/// data-model hook only; no MKI bytes are ever emitted or parsed.
pub(crate) const MAX_MKI_LEN: usize = 128;

/// The explicit SRTCP index field ahead of the RTCP tag/MKI trailer.
pub(crate) const SRTCP_INDEX_LEN: usize = 4;

/// AEAD suites use a fixed 96-bit IV and 16 byte tag (RFC 7714).
pub(crate) const AEAD_IV_LEN: usize = 12;
pub(crate) const AEAD_TAG_LEN: usize = 16;

/// Reusable cipher state for one direction-agnostic stream, RTP or RTCP.
pub(crate) enum SrtpCipher {
    /// AES counter mode. The tag is an HMAC-SHA1 the caller computes
    /// separately over the authenticated portion.
    Cm { enc: CipherCtx, dec: CipherCtx },
    /// AES-GCM. Tag formation and verification happen inside the cipher.
    Aead { enc: CipherCtx, dec: CipherCtx },
    /// No confidentiality, authentication only.
    Null,
}

impl SrtpCipher {
    pub fn new(suite: &CryptoSuite, key: &[u8]) -> Result<SrtpCipher, CryptoError> {
        match suite.cipher {
            CipherType::Null => Ok(SrtpCipher::Null),
            CipherType::AesCm128 => {
                let t = cipher::Cipher::aes_128_ctr();

                let mut enc = CipherCtx::new()?;
                enc.encrypt_init(Some(t), Some(key), None)?;

                let mut dec = CipherCtx::new()?;
                dec.decrypt_init(Some(t), Some(key), None)?;

                Ok(SrtpCipher::Cm { enc, dec })
            }
            CipherType::AesGcm128 | CipherType::AesGcm256 => {
                let t = if suite.cipher == CipherType::AesGcm128 {
                    cipher::Cipher::aes_128_gcm()
                } else {
                    cipher::Cipher::aes_256_gcm()
                };

                let mut enc = CipherCtx::new()?;
                enc.encrypt_init(Some(t), Some(key), None)?;
                enc.set_iv_length(AEAD_IV_LEN)?;
                enc.set_padding(false);

                let mut dec = CipherCtx::new()?;
                dec.decrypt_init(Some(t), Some(key), None)?;

                Ok(SrtpCipher::Aead { enc, dec })
            }
        }
    }

    /// Counter-mode/null encryption. `output` must be exactly `input` long.
    pub fn encrypt(
        &mut self,
        iv: &[u8; 16],
        input: &[u8],
        output: &mut [u8],
    ) -> Result<(), CryptoError> {
        match self {
            SrtpCipher::Cm { enc, .. } => {
                enc.encrypt_init(None, None, Some(iv))?;
                let count = enc.cipher_update(input, Some(output))?;
                enc.cipher_final(&mut output[count..])?;
                Ok(())
            }
            SrtpCipher::Null => {
                output.copy_from_slice(input);
                Ok(())
            }
            SrtpCipher::Aead { .. } => unreachable!("aead suite used via aead_encrypt"),
        }
    }

    /// Counter-mode/null decryption. `output` must be exactly `input` long.
    pub fn decrypt(
        &mut self,
        iv: &[u8; 16],
        input: &[u8],
        output: &mut [u8],
    ) -> Result<(), CryptoError> {
        match self {
            SrtpCipher::Cm { dec, .. } => {
                dec.decrypt_init(None, None, Some(iv))?;
                let count = dec.cipher_update(input, Some(output))?;
                dec.cipher_final(&mut output[count..])?;
                Ok(())
            }
            SrtpCipher::Null => {
                output.copy_from_slice(input);
                Ok(())
            }
            SrtpCipher::Aead { .. } => unreachable!("aead suite used via aead_decrypt"),
        }
    }

    /// AEAD encryption. `output` must hold `input` plus the 16 byte tag.
    pub fn aead_encrypt(
        &mut self,
        iv: &[u8; AEAD_IV_LEN],
        aads: &[&[u8]],
        input: &[u8],
        output: &mut [u8],
    ) -> Result<(), CryptoError> {
        let SrtpCipher::Aead { enc, .. } = self else {
            unreachable!("non-aead suite used via aead_encrypt");
        };

        enc.encrypt_init(None, None, Some(iv))?;

        // Omitting the output argument informs OpenSSL we are providing AAD.
        for aad in aads {
            enc.cipher_update(aad, None)?;
        }

        let count = enc.cipher_update(input, Some(output))?;
        let final_count = enc.cipher_final(&mut output[count..])?;

        // The authentication tag goes right after the ciphertext.
        let tag_offset = count + final_count;
        enc.tag(&mut output[tag_offset..tag_offset + AEAD_TAG_LEN])?;

        Ok(())
    }

    /// AEAD decryption of `input` (ciphertext + trailing tag). Returns the
    /// plaintext length, or an error when the tag does not verify.
    pub fn aead_decrypt(
        &mut self,
        iv: &[u8; AEAD_IV_LEN],
        aads: &[&[u8]],
        input: &[u8],
        output: &mut [u8],
    ) -> Result<usize, CryptoError> {
        let SrtpCipher::Aead { dec, .. } = self else {
            unreachable!("non-aead suite used via aead_decrypt");
        };

        let (cipher_text, tag) = input.split_at(input.len() - AEAD_TAG_LEN);

        dec.decrypt_init(None, None, Some(iv))?;

        for aad in aads {
            dec.cipher_update(aad, None)?;
        }

        dec.set_tag(tag)?;

        let count = dec.cipher_update(cipher_text, Some(output))?;
        let final_count = dec.cipher_final(&mut output[count..])?;

        Ok(count + final_count)
    }
}

/// Counter-mode IV per RFC 3711 section 4.1.1. The same formation serves
/// SRTCP with the 31-bit SRTCP index in place of the packet index.
pub(crate) fn cm_iv(salt: &[u8], ssrc: Ssrc, index: u64) -> [u8; 16] {
    let mut iv = [0; 16];

    let ssrc_be = ssrc.to_be_bytes();
    let index_be = index.to_be_bytes();

    iv[4..8].copy_from_slice(&ssrc_be);

    for i in 0..8 {
        iv[i + 6] ^= index_be[i];
    }
    for (i, s) in salt.iter().take(14).enumerate() {
        iv[i] ^= s;
    }

    iv
}

/// AEAD RTP IV per RFC 7714 section 8.1.
pub(crate) fn aead_rtp_iv(salt: &[u8], ssrc: Ssrc, roc: u32, seq: u16) -> [u8; AEAD_IV_LEN] {
    let mut iv = [0; AEAD_IV_LEN];

    iv[2..6].copy_from_slice(&ssrc.to_be_bytes());
    iv[6..10].copy_from_slice(&roc.to_be_bytes());
    iv[10..12].copy_from_slice(&seq.to_be_bytes());

    for (i, s) in salt.iter().take(AEAD_IV_LEN).enumerate() {
        iv[i] ^= s;
    }

    iv
}

/// AEAD RTCP IV per RFC 7714 section 9.1.
pub(crate) fn aead_rtcp_iv(salt: &[u8], ssrc: Ssrc, index: u32) -> [u8; AEAD_IV_LEN] {
    let mut iv = [0; AEAD_IV_LEN];

    iv[2..6].copy_from_slice(&ssrc.to_be_bytes());
    iv[8..12].copy_from_slice(&index.to_be_bytes());

    for (i, s) in salt.iter().take(AEAD_IV_LEN).enumerate() {
        iv[i] ^= s;
    }

    iv
}

/// Append an HMAC-SHA1 tag over `buf[..tag_start]` plus the rollover
/// counter. The tag lands at `buf[tag_start..tag_start + tag_len]`.
pub(crate) fn rtp_hmac(key: &[u8], buf: &mut [u8], roc: u32, tag_start: usize, tag_len: usize) {
    let tag = sha1_hmac(key, &[&buf[..tag_start], &roc.to_be_bytes()]);
    buf[tag_start..(tag_start + tag_len)].copy_from_slice(&tag[..tag_len]);
}

/// Verify the RTP authentication tag.
pub(crate) fn rtp_verify(key: &[u8], buf: &[u8], roc: u32, cmp: &[u8]) -> bool {
    let tag = sha1_hmac(key, &[buf, &roc.to_be_bytes()]);
    &tag[..cmp.len()] == cmp
}

/// Append an HMAC-SHA1 tag over `buf[..tag_start]` (which already includes
/// the E-flag and SRTCP index).
pub(crate) fn rtcp_hmac(key: &[u8], buf: &mut [u8], tag_start: usize, tag_len: usize) {
    let tag = sha1_hmac(key, &[&buf[..tag_start]]);
    buf[tag_start..(tag_start + tag_len)].copy_from_slice(&tag[..tag_len]);
}

/// Verify the RTCP authentication tag.
pub(crate) fn rtcp_verify(key: &[u8], buf: &[u8], cmp: &[u8]) -> bool {
    let tag = sha1_hmac(key, &[buf]);
    &tag[..cmp.len()] == cmp
}

impl fmt::Debug for SrtpCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SrtpCipher::Cm { .. } => write!(f, "SrtpCipher::Cm"),
            SrtpCipher::Aead { .. } => write!(f, "SrtpCipher::Aead"),
            SrtpCipher::Null => write!(f, "SrtpCipher::Null"),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn cm_iv_formation() {
        // Zero salt leaves ssrc and index visible in the block.
        let iv = cm_iv(&[0; 14], 0x1234_5678.into(), 0xabcd_0001);
        assert_eq!(&iv[4..6], &[0x12, 0x34]);
        // Bytes 6..8 are ssrc xor the top of the shifted index (zero here).
        assert_eq!(&iv[6..8], &[0x56, 0x78]);
        assert_eq!(&iv[10..14], &0xabcd_0001_u32.to_be_bytes());
        assert_eq!(&iv[14..16], &[0, 0]);
    }

    #[test]
    fn cm_round_trip() {
        let suite = CryptoSuite::AES_CM_128_HMAC_SHA1_80;
        let mut c = SrtpCipher::new(&suite, &[9; 16]).unwrap();

        let iv = cm_iv(&[1; 14], 7.into(), 42);
        let input = [0xd4; 37];

        let mut enc = [0; 37];
        c.encrypt(&iv, &input, &mut enc).unwrap();
        assert_ne!(enc, input);

        let mut dec = [0; 37];
        c.decrypt(&iv, &enc, &mut dec).unwrap();
        assert_eq!(dec, input);
    }

    #[test]
    fn aead_round_trip_and_tamper() {
        let suite = CryptoSuite::AEAD_AES_128_GCM;
        let mut c = SrtpCipher::new(&suite, &[9; 16]).unwrap();

        let iv = aead_rtp_iv(&[1; 12], 7.into(), 0, 42);
        let aad = [0x80u8, 0x08, 0, 42];
        let input = [0xd4; 20];

        let mut enc = [0; 20 + AEAD_TAG_LEN];
        c.aead_encrypt(&iv, &[&aad], &input, &mut enc).unwrap();

        let mut dec = [0; 20];
        let n = c.aead_decrypt(&iv, &[&aad], &enc, &mut dec).unwrap();
        assert_eq!(n, 20);
        assert_eq!(dec, input);

        // Flip a ciphertext bit: tag must not verify.
        enc[3] ^= 1;
        assert!(c.aead_decrypt(&iv, &[&aad], &enc, &mut dec).is_err());
    }

    #[test]
    fn hmac_tag_truncation() {
        let key = [5u8; 20];
        let mut buf = [0u8; 30];
        buf[..20].copy_from_slice(&[0xd4; 20]);

        rtp_hmac(&key, &mut buf, 3, 20, 10);
        assert!(rtp_verify(&key, &buf[..20], 3, &buf[20..30]));
        assert!(!rtp_verify(&key, &buf[..20], 4, &buf[20..30]));

        // 32-bit truncated tag is a prefix of the 80-bit one.
        let mut buf4 = [0u8; 24];
        buf4[..20].copy_from_slice(&[0xd4; 20]);
        rtp_hmac(&key, &mut buf4, 3, 20, 4);
        assert_eq!(buf4[20..24], buf[20..24]);
    }
}
