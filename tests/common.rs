#![allow(unused)]
use std::sync::Once;

use srtp_session::{Policy, SrtpProfile, SsrcRule};

/// RTP packet from the RFC-style interop scenario: fixed header with
/// ssrc 12345, 160 bytes of 0xd4 payload. 172 bytes total.
pub fn sample_rtp() -> Vec<u8> {
    let mut rtp = vec![
        0x80, 0x08, 0x00, 0x00, // version, packet type, sequence number
        0x00, 0x00, 0x00, 0x00, // timestamp
        0x00, 0x00, 0x30, 0x39, // ssrc: 12345
    ];
    rtp.extend_from_slice(&[0xd4; 160]);
    rtp
}

/// A 28 byte RTCP sender report from the same source as [`sample_rtp`]
/// (ssrc 12345).
pub fn sample_rtcp() -> Vec<u8> {
    vec![
        0x80, 0xc8, 0x00, 0x06, 0x00, 0x00, 0x30, 0x39, //
        0x83, 0xab, 0x03, 0xa1, 0xeb, 0x02, 0x0b, 0x3a, //
        0x00, 0x00, 0x94, 0x20, 0x00, 0x00, 0x00, 0x9e, //
        0x00, 0x00, 0x9b, 0x88,
    ]
}

/// Key material of sequential bytes 0x00, 0x01, ... long enough for any
/// supported suite. Truncate to the suite's expected length.
pub fn sample_key(len: usize) -> Vec<u8> {
    (0..len as u8).collect()
}

/// Policy with the given profile, rule and a sequential test key of the
/// profile's exact expected length.
pub fn keyed_policy(profile: SrtpProfile, rule: SsrcRule) -> Policy {
    let mut policy = Policy::new(profile);
    policy
        .set_key(Some(&sample_key(profile.keying_material_len())))
        .unwrap();
    policy.set_ssrc_rule(rule);
    policy
}

pub fn init_log() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));

    static START: Once = Once::new();

    START.call_once(|| {
        tracing_subscriber::registry()
            .with(fmt::layer())
            .with(env_filter)
            .init();
    });
}
