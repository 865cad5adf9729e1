use crate::crypto::srtp::{aead_rtcp_iv, aead_rtp_iv, cm_iv};
use crate::crypto::srtp::{rtcp_hmac, rtcp_verify, rtp_hmac, rtp_verify};
use crate::crypto::srtp::{SrtpCipher, AEAD_TAG_LEN, SRTCP_INDEX_LEN};
use crate::crypto::SessionKeys;
use crate::error::Error;
use crate::header::{extend_seq, RtpHeader, Ssrc};
use crate::policy::{CryptoSuite, Policy};
use crate::replay::{ReplayWindow, DEFAULT_WINDOW_BITS, MAX_WINDOW_BITS};

/// The validated, derived form of a [`Policy`]: everything needed to mint
/// stream contexts. Wildcard rules keep one of these around and spawn a
/// concrete [`StreamContext`] per SSRC on first matching packet.
pub(crate) struct StreamTemplate {
    rtp_suite: CryptoSuite,
    rtcp_suite: CryptoSuite,
    keys: SessionKeys,
    window_bits: u32,
    allow_repeat_tx: bool,
}

impl StreamTemplate {
    /// Validate the policy and derive session keys from its master key.
    ///
    /// All policy validation that does not need a packet happens here, so
    /// a bad policy fails at `add_stream` time, never at protect time.
    pub fn from_policy(policy: &Policy) -> Result<StreamTemplate, Error> {
        let rtp_suite = policy.rtp_suite();
        let rtcp_suite = policy.rtcp_suite();

        for suite in [&rtp_suite, &rtcp_suite] {
            if !suite.authentication() {
                return Err(Error::UnsupportedParameter(
                    "suite without authentication",
                ));
            }
            if suite.is_aead() && suite.auth_tag_len != AEAD_TAG_LEN {
                return Err(Error::UnsupportedParameter("aead tag length"));
            }
            if !suite.is_aead() && !matches!(suite.master_key_len(), 0 | 16) {
                return Err(Error::UnsupportedParameter("cipher key length"));
            }
        }

        // One master key drives both directions of the KDF; mixed suites
        // must agree on its shape.
        if rtp_suite.master_key_len() != rtcp_suite.master_key_len()
            || rtp_suite.master_salt_len() != rtcp_suite.master_salt_len()
        {
            return Err(Error::UnsupportedParameter(
                "rtp/rtcp suites disagree on master key shape",
            ));
        }

        let Some(key) = policy.key() else {
            return Err(Error::UnsupportedParameter("no key material set"));
        };

        // The suites may have changed since the key was set.
        let min = policy.required_key_len();
        if key.len() < min {
            return Err(Error::KeyTooShort {
                len: key.len(),
                min,
            });
        }

        if policy.window_size() > MAX_WINDOW_BITS {
            return Err(Error::UnsupportedParameter("window size above 2^15"));
        }
        let window_bits = if policy.window_size() == 0 {
            DEFAULT_WINDOW_BITS
        } else {
            policy.window_size()
        };

        // Over-long key material is accepted; only the first key+salt
        // bytes are used (trailing MKI bytes are ignored).
        let key_len = rtp_suite.master_key_len();
        let salt_len = rtp_suite.master_salt_len();
        let (master_key, rest) = key.split_at(key_len);
        let master_salt = &rest[..salt_len];

        let keys = SessionKeys::derive(master_key, master_salt, &rtp_suite, &rtcp_suite)?;

        Ok(StreamTemplate {
            rtp_suite,
            rtcp_suite,
            keys,
            window_bits,
            allow_repeat_tx: policy.allow_repeat_tx(),
        })
    }

    /// Create the stream context for one concrete SSRC.
    pub fn spawn(&self, ssrc: Ssrc) -> Result<StreamContext, Error> {
        Ok(StreamContext {
            ssrc,
            rtp_suite: self.rtp_suite,
            rtcp_suite: self.rtcp_suite,
            rtp_cipher: SrtpCipher::new(&self.rtp_suite, &self.keys.rtp_cipher)?,
            rtcp_cipher: SrtpCipher::new(&self.rtcp_suite, &self.keys.rtcp_cipher)?,
            keys: self.keys.clone(),
            tx_window: ReplayWindow::new(self.window_bits),
            rx_window: ReplayWindow::new(self.window_bits),
            srtcp_tx_index: 0,
            srtcp_rx_window: ReplayWindow::new(self.window_bits),
            allow_repeat_tx: self.allow_repeat_tx,
        })
    }
}

/// Per-stream cryptographic state: derived keys, reusable cipher contexts,
/// rollover tracking and replay windows. Owned by the session, destroyed
/// on `remove_stream` or session teardown.
pub(crate) struct StreamContext {
    ssrc: Ssrc,
    rtp_suite: CryptoSuite,
    rtcp_suite: CryptoSuite,
    keys: SessionKeys,
    rtp_cipher: SrtpCipher,
    rtcp_cipher: SrtpCipher,
    /// Indices of sent RTP packets, for repeat-transmission detection and
    /// rollover tracking on the send side.
    tx_window: ReplayWindow,
    /// Indices of received RTP packets, RFC 3711 anti-replay.
    rx_window: ReplayWindow,
    /// Counter for outgoing SRTCP packets, 31 bits.
    srtcp_tx_index: u32,
    /// Indices of received SRTCP packets.
    srtcp_rx_window: ReplayWindow,
    allow_repeat_tx: bool,
}

// SRTP layout (RFC 3711):
// [header, encrypted payload, (MKI), auth tag]
//
// SRTCP layout:
// [header+ssrc, encrypted rest, E-flag | srtcp index, (MKI), auth tag]
// For the AEAD suites (RFC 7714) the tag sits inside the AEAD output and
// the E|index word moves to the very end of the packet.

impl StreamContext {
    /// Protect one RTP packet into `out`. Returns the protected length:
    /// input length plus exactly the suite's RTP trailer.
    pub fn protect_rtp(
        &mut self,
        packet: &[u8],
        header: &RtpHeader,
        out: &mut [u8],
    ) -> Result<usize, Error> {
        let index = extend_seq(self.tx_window.latest(), header.sequence_number);

        if !self.allow_repeat_tx {
            self.tx_window.check(index)?;
        }
        self.tx_window.add(index);

        let roc = (index >> 16) as u32;
        let hlen = header.header_len;
        let len = packet.len();

        out[..hlen].copy_from_slice(&packet[..hlen]);

        if self.rtp_suite.is_aead() {
            let iv = aead_rtp_iv(&self.keys.rtp_salt, self.ssrc, roc, header.sequence_number);
            self.rtp_cipher.aead_encrypt(
                &iv,
                &[&packet[..hlen]],
                &packet[hlen..],
                &mut out[hlen..len + AEAD_TAG_LEN],
            )?;
            return Ok(len + AEAD_TAG_LEN);
        }

        let iv = cm_iv(&self.keys.rtp_salt, self.ssrc, index);
        self.rtp_cipher
            .encrypt(&iv, &packet[hlen..], &mut out[hlen..len])?;

        let tag_len = self.rtp_suite.auth_tag_len;
        rtp_hmac(&self.keys.rtp_auth, out, roc, len, tag_len);

        Ok(len + tag_len)
    }

    /// Verify and decrypt one SRTP packet into `out`. Returns the original
    /// RTP length. Replay state only advances after the tag verifies.
    pub fn unprotect_rtp(
        &mut self,
        packet: &[u8],
        header: &RtpHeader,
        out: &mut [u8],
    ) -> Result<usize, Error> {
        let index = extend_seq(self.rx_window.latest(), header.sequence_number);
        self.rx_window.check(index)?;

        let roc = (index >> 16) as u32;
        let hlen = header.header_len;

        if self.rtp_suite.is_aead() {
            if packet.len() < hlen + AEAD_TAG_LEN {
                return Err(Error::BadPacket("srtp packet shorter than aead tag"));
            }

            let iv = aead_rtp_iv(&self.keys.rtp_salt, self.ssrc, roc, header.sequence_number);
            out[..hlen].copy_from_slice(&packet[..hlen]);

            let n = self
                .rtp_cipher
                .aead_decrypt(&iv, &[&packet[..hlen]], &packet[hlen..], &mut out[hlen..])
                .map_err(|_| {
                    trace!("unprotect_rtp aead verify fail");
                    Error::AuthenticationFailure
                })?;

            self.rx_window.add(index);
            return Ok(hlen + n);
        }

        let tag_len = self.rtp_suite.auth_tag_len;
        if packet.len() < hlen + tag_len {
            return Err(Error::BadPacket("srtp packet shorter than auth tag"));
        }

        let tag_start = packet.len() - tag_len;
        if !rtp_verify(
            &self.keys.rtp_auth,
            &packet[..tag_start],
            roc,
            &packet[tag_start..],
        ) {
            trace!("unprotect_rtp hmac verify fail");
            return Err(Error::AuthenticationFailure);
        }

        let iv = cm_iv(&self.keys.rtp_salt, self.ssrc, index);
        out[..hlen].copy_from_slice(&packet[..hlen]);
        self.rtp_cipher
            .decrypt(&iv, &packet[hlen..tag_start], &mut out[hlen..tag_start])?;

        self.rx_window.add(index);
        Ok(tag_start)
    }

    /// Protect one RTCP packet into `out`. Returns the protected length:
    /// input length plus exactly the suite's RTCP trailer.
    pub fn protect_rtcp(&mut self, packet: &[u8], out: &mut [u8]) -> Result<usize, Error> {
        // The SRTCP index MUST be set to zero before the first packet is
        // sent, and MUST be incremented by one, modulo 2^31, after each
        // packet is sent. https://tools.ietf.org/html/rfc3711#page-15
        let index = self.srtcp_tx_index;
        self.srtcp_tx_index = (self.srtcp_tx_index + 1) & 0x7fff_ffff;

        let len = packet.len();
        let encrypted = self.rtcp_suite.confidentiality();
        let e_and_si = if encrypted { 0x8000_0000 | index } else { index };

        out[..8].copy_from_slice(&packet[..8]);

        if self.rtcp_suite.is_aead() {
            let iv = aead_rtcp_iv(&self.keys.rtcp_salt, self.ssrc, index);
            self.rtcp_cipher.aead_encrypt(
                &iv,
                &[&packet[..8], &e_and_si.to_be_bytes()],
                &packet[8..],
                &mut out[8..len + AEAD_TAG_LEN],
            )?;
            // RFC 7714 places the E|index word last, after the AEAD tag.
            out[len + AEAD_TAG_LEN..len + AEAD_TAG_LEN + SRTCP_INDEX_LEN]
                .copy_from_slice(&e_and_si.to_be_bytes());
            return Ok(len + AEAD_TAG_LEN + SRTCP_INDEX_LEN);
        }

        if encrypted {
            let iv = cm_iv(&self.keys.rtcp_salt, self.ssrc, index as u64);
            self.rtcp_cipher
                .encrypt(&iv, &packet[8..], &mut out[8..len])?;
        } else {
            out[8..len].copy_from_slice(&packet[8..]);
        }

        out[len..len + SRTCP_INDEX_LEN].copy_from_slice(&e_and_si.to_be_bytes());

        let tag_len = self.rtcp_suite.auth_tag_len;
        rtcp_hmac(
            &self.keys.rtcp_auth,
            out,
            len + SRTCP_INDEX_LEN,
            tag_len,
        );

        Ok(len + SRTCP_INDEX_LEN + tag_len)
    }

    /// Verify and decrypt one SRTCP packet into `out`. Returns the original
    /// RTCP length.
    pub fn unprotect_rtcp(&mut self, packet: &[u8], out: &mut [u8]) -> Result<usize, Error> {
        if self.rtcp_suite.is_aead() {
            return self.unprotect_rtcp_aead(packet, out);
        }

        let tag_len = self.rtcp_suite.auth_tag_len;
        if packet.len() < 8 + SRTCP_INDEX_LEN + tag_len {
            return Err(Error::BadPacket("srtcp packet shorter than trailer"));
        }

        let tag_start = packet.len() - tag_len;
        if !rtcp_verify(&self.keys.rtcp_auth, &packet[..tag_start], &packet[tag_start..]) {
            trace!("unprotect_rtcp hmac verify fail");
            return Err(Error::AuthenticationFailure);
        }

        let idx_start = tag_start - SRTCP_INDEX_LEN;
        let e_and_si = u32::from_be_bytes([
            packet[idx_start],
            packet[idx_start + 1],
            packet[idx_start + 2],
            packet[idx_start + 3],
        ]);

        let is_encrypted = e_and_si & 0x8000_0000 > 0;
        let index = e_and_si & 0x7fff_ffff;

        self.srtcp_rx_window.check(index as u64)?;

        if is_encrypted {
            if !self.rtcp_suite.confidentiality() {
                return Err(Error::BadPacket("encrypted srtcp under null cipher"));
            }
            let iv = cm_iv(&self.keys.rtcp_salt, self.ssrc, index as u64);
            out[..8].copy_from_slice(&packet[..8]);
            self.rtcp_cipher
                .decrypt(&iv, &packet[8..idx_start], &mut out[8..idx_start])?;
        } else {
            out[..idx_start].copy_from_slice(&packet[..idx_start]);
        }

        self.srtcp_rx_window.add(index as u64);
        Ok(idx_start)
    }

    fn unprotect_rtcp_aead(&mut self, packet: &[u8], out: &mut [u8]) -> Result<usize, Error> {
        if packet.len() < 8 + AEAD_TAG_LEN + SRTCP_INDEX_LEN {
            return Err(Error::BadPacket("srtcp packet shorter than trailer"));
        }

        let idx_start = packet.len() - SRTCP_INDEX_LEN;
        let e_and_si = u32::from_be_bytes([
            packet[idx_start],
            packet[idx_start + 1],
            packet[idx_start + 2],
            packet[idx_start + 3],
        ]);
        let index = e_and_si & 0x7fff_ffff;

        self.srtcp_rx_window.check(index as u64)?;

        let iv = aead_rtcp_iv(&self.keys.rtcp_salt, self.ssrc, index);
        out[..8].copy_from_slice(&packet[..8]);

        let n = self
            .rtcp_cipher
            .aead_decrypt(
                &iv,
                &[&packet[..8], &packet[idx_start..]],
                &packet[8..idx_start],
                &mut out[8..],
            )
            .map_err(|_| {
                trace!("unprotect_rtcp aead verify fail");
                Error::AuthenticationFailure
            })?;

        self.srtcp_rx_window.add(index as u64);
        Ok(8 + n)
    }
}
