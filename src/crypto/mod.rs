//! Boundary towards the cryptographic engine (OpenSSL).
//!
//! Everything that touches key material during a transform lives under this
//! module and `stream.rs`. The rest of the crate only deals in byte layout
//! and policy.

use once_cell::sync::OnceCell;
use thiserror::Error;

mod kdf;
pub(crate) use kdf::SessionKeys;

pub(crate) mod srtp;

static ENGINE_INIT: OnceCell<()> = OnceCell::new();

/// Process-wide one-time engine initialization. Idempotent; invoked lazily
/// on first [`Session`][crate::Session] construction.
pub(crate) fn ensure_init() {
    ENGINE_INIT.get_or_init(|| {
        openssl::init();
        trace!("Crypto engine initialized");
    });
}

/// SHA1 HMAC as used for SRTP/SRTCP authentication tags.
pub(crate) fn sha1_hmac(key: &[u8], payloads: &[&[u8]]) -> [u8; 20] {
    use hmac::Hmac;
    use hmac::Mac;
    use sha1::Sha1;

    let mut hmac = Hmac::<Sha1>::new_from_slice(key).expect("hmac to normalize size to 20");

    for payload in payloads {
        hmac.update(payload);
    }

    hmac.finalize().into_bytes().into()
}

/// Errors surfaced by the crypto engine itself.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Some error from the OpenSSL layer.
    #[error("{0}")]
    OpenSsl(#[from] openssl::error::ErrorStack),
}
