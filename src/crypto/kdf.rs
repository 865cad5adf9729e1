//! RFC 3711 section 4.3 key derivation, AES-CM flavour.
//!
//! Generalized over 128/256-bit master keys (RFC 7714 uses the same KDF
//! keyed with the larger master key) and 112/96-bit master salts. A shorter
//! salt is zero-padded at the end of the KDF input block, which is what
//! libsrtp does for the AEAD suites.

use openssl::symm::{Cipher, Crypter, Mode};

use crate::crypto::CryptoError;
use crate::policy::CryptoSuite;

const LABEL_RTP_CIPHER: u8 = 0;
const LABEL_RTP_AUTH: u8 = 1;
const LABEL_RTP_SALT: u8 = 2;
const LABEL_RTCP_CIPHER: u8 = 3;
const LABEL_RTCP_AUTH: u8 = 4;
const LABEL_RTCP_SALT: u8 = 5;

/// Session keys derived from one master key + salt.
///
/// Shared by every stream minted from the same policy; the per-stream parts
/// (rollover counter, replay windows) live in the stream context.
#[derive(Clone)]
pub(crate) struct SessionKeys {
    pub rtp_cipher: Vec<u8>,
    pub rtp_auth: Vec<u8>,
    pub rtp_salt: Vec<u8>,
    pub rtcp_cipher: Vec<u8>,
    pub rtcp_auth: Vec<u8>,
    pub rtcp_salt: Vec<u8>,
}

impl SessionKeys {
    pub fn derive(
        master_key: &[u8],
        master_salt: &[u8],
        rtp: &CryptoSuite,
        rtcp: &CryptoSuite,
    ) -> Result<SessionKeys, CryptoError> {
        let mut keys = SessionKeys {
            rtp_cipher: vec![0; rtp.cipher_key_len],
            rtp_auth: vec![0; rtp.auth_key_len],
            rtp_salt: vec![0; rtp.salt_len],
            rtcp_cipher: vec![0; rtcp.cipher_key_len],
            rtcp_auth: vec![0; rtcp.auth_key_len],
            rtcp_salt: vec![0; rtcp.salt_len],
        };

        let run = |label: u8, out: &mut [u8]| -> Result<(), CryptoError> {
            derive(master_key, master_salt, label, out)
        };

        run(LABEL_RTP_CIPHER, &mut keys.rtp_cipher)?;
        run(LABEL_RTP_AUTH, &mut keys.rtp_auth)?;
        run(LABEL_RTP_SALT, &mut keys.rtp_salt)?;
        run(LABEL_RTCP_CIPHER, &mut keys.rtcp_cipher)?;
        run(LABEL_RTCP_AUTH, &mut keys.rtcp_auth)?;
        run(LABEL_RTCP_SALT, &mut keys.rtcp_salt)?;

        Ok(keys)
    }
}

fn derive(
    master_key: &[u8],
    master_salt: &[u8],
    label: u8,
    out: &mut [u8],
) -> Result<(), CryptoError> {
    let mut i = 0; // index in out

    // input layout: [salt[14] || label, round[2]] (|| is xor 7th byte)
    let mut input = [0; 16];

    let salt_len = master_salt.len().min(14);
    input[0..salt_len].copy_from_slice(&master_salt[..salt_len]);
    input[7] ^= label;

    let cipher = match master_key.len() {
        16 => Cipher::aes_128_ecb(),
        32 => Cipher::aes_256_ecb(),
        // Master key length is validated before derivation.
        _ => unreachable!("unexpected master key length"),
    };

    let mut buf = [0; 16 + 16]; // output from each AES
    let mut round: u16 = 0; // counter for each AES round

    // loop each AES round
    loop {
        if i == out.len() {
            break;
        }

        // splice in round at bottom of input
        input[14..].copy_from_slice(&round.to_be_bytes()[..]);

        // the key derivation function runs AES in counter mode over the
        // xored salt/label/round block
        let mut aes = Crypter::new(cipher, Mode::Encrypt, master_key, None)?;

        let count = aes.update(&input[..], &mut buf[..])?;
        aes.finalize(&mut buf[count..])?;

        // Even if the finalize produces a padding block, only the first 16
        // bytes are keystream. That matches the tests in the RFC.
        for j in buf.iter().take(16) {
            if i == out.len() {
                break;
            }
            out[i] = *j;
            i += 1;
        }

        round += 1;
    }

    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn derive_key() {
        // https://tools.ietf.org/html/rfc3711#appendix-B.3
        //
        // Key Derivation Test Vectors.

        let master = [
            0xE1, 0xF9, 0x7A, 0x0D, 0x3E, 0x01, 0x8B, 0xE0, //
            0xD6, 0x4F, 0xA3, 0x2C, 0x06, 0xDE, 0x41, 0x39,
        ];

        let salt = [
            0x0E, 0xC6, 0x75, 0xAD, 0x49, 0x8A, 0xFE, //
            0xEB, 0xB6, 0x96, 0x0B, 0x3A, 0xAB, 0xE6,
        ];

        // aes crypto key
        let mut out = [0_u8; 16];
        derive(&master, &salt, 0, &mut out[..]).unwrap();

        assert_eq!(
            out,
            [
                0xC6, 0x1E, 0x7A, 0x93, 0x74, 0x4F, 0x39, 0xEE, //
                0x10, 0x73, 0x4A, 0xFE, 0x3F, 0xF7, 0xA0, 0x87
            ]
        );

        // hmac
        let mut out = [0_u8; 20];
        derive(&master, &salt, 1, &mut out[..]).unwrap();

        assert_eq!(
            out,
            [
                0xCE, 0xBE, 0x32, 0x1F, 0x6F, 0xF7, 0x71, 0x6B, //
                0x6F, 0xD4, 0xAB, 0x49, 0xAF, 0x25, 0x6A, 0x15, //
                0x6D, 0x38, 0xBA, 0xA4
            ]
        );

        // salt
        let mut out = [0_u8; 14];
        derive(&master, &salt, 2, &mut out[..]).unwrap();

        assert_eq!(
            out,
            [
                0x30, 0xCB, 0xBC, 0x08, 0x86, 0x3D, 0x8C, //
                0x85, 0xD4, 0x9D, 0xB3, 0x4A, 0x9A, 0xE1
            ]
        );
    }

    #[test]
    fn derive_all_session_keys() {
        let master = [7u8; 16];
        let salt = [3u8; 14];
        let suite = CryptoSuite::AES_CM_128_HMAC_SHA1_80;

        let keys = SessionKeys::derive(&master, &salt, &suite, &suite).unwrap();
        assert_eq!(keys.rtp_cipher.len(), 16);
        assert_eq!(keys.rtp_auth.len(), 20);
        assert_eq!(keys.rtp_salt.len(), 14);
        assert_eq!(keys.rtcp_cipher.len(), 16);

        // RTP and RTCP keys come from different labels.
        assert_ne!(keys.rtp_cipher, keys.rtcp_cipher);
        assert_ne!(keys.rtp_salt, keys.rtcp_salt);
    }
}
