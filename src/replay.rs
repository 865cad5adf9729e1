use crate::error::Error;

/// Window size used when the policy leaves it at 0.
pub(crate) const DEFAULT_WINDOW_BITS: u32 = 128;

/// Smallest window RFC 3711 allows.
pub(crate) const MIN_WINDOW_BITS: u32 = 64;

/// Largest window we accept, same bound as libsrtp.
pub(crate) const MAX_WINDOW_BITS: u32 = 1 << 15;

/// Sliding anti-replay window over 64-bit packet indices.
///
/// Bit `d` of the bitmap records whether index `latest - d` has been seen.
/// Used on the receive path for RFC 3711 anti-replay and on the send path
/// to catch repeat transmissions of the same index.
#[derive(Debug, Clone)]
pub(crate) struct ReplayWindow {
    bits: u64,
    latest: Option<u64>,
    bitmap: Vec<u64>,
}

impl ReplayWindow {
    pub fn new(bits: u32) -> Self {
        let bits = (bits.max(MIN_WINDOW_BITS) as u64 + 63) / 64 * 64;
        ReplayWindow {
            bits,
            latest: None,
            bitmap: vec![0; (bits / 64) as usize],
        }
    }

    /// Highest index seen so far.
    pub fn latest(&self) -> Option<u64> {
        self.latest
    }

    /// Check whether `index` would be acceptable, without updating state.
    pub fn check(&self, index: u64) -> Result<(), Error> {
        let Some(latest) = self.latest else {
            return Ok(());
        };

        if index > latest {
            return Ok(());
        }

        let delta = latest - index;
        if delta >= self.bits {
            return Err(Error::ReplayOld);
        }

        if self.is_set(delta) {
            Err(Error::ReplayFail)
        } else {
            Ok(())
        }
    }

    /// Record `index` as seen, advancing the window if it is the new highest.
    pub fn add(&mut self, index: u64) {
        match self.latest {
            None => {
                self.latest = Some(index);
                self.set(0);
            }
            Some(latest) if index > latest => {
                self.shift(index - latest);
                self.latest = Some(index);
                self.set(0);
            }
            Some(latest) => {
                let delta = latest - index;
                if delta < self.bits {
                    self.set(delta);
                }
            }
        }
    }

    fn is_set(&self, d: u64) -> bool {
        self.bitmap[(d / 64) as usize] & (1 << (d % 64)) != 0
    }

    fn set(&mut self, d: u64) {
        self.bitmap[(d / 64) as usize] |= 1 << (d % 64);
    }

    /// Slide the window forward by `n` indices: bit `d` moves to `d + n`.
    fn shift(&mut self, n: u64) {
        if n >= self.bits {
            self.bitmap.iter_mut().for_each(|w| *w = 0);
            return;
        }

        let word_shift = (n / 64) as usize;
        let bit_shift = (n % 64) as u32;

        for i in (0..self.bitmap.len()).rev() {
            let mut w = if i >= word_shift {
                self.bitmap[i - word_shift] << bit_shift
            } else {
                0
            };
            if bit_shift > 0 && i > word_shift {
                w |= self.bitmap[i - word_shift - 1] >> (64 - bit_shift);
            }
            self.bitmap[i] = w;
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn fresh_window_accepts_anything() {
        let w = ReplayWindow::new(128);
        assert!(w.check(0).is_ok());
        assert!(w.check(1_000_000).is_ok());
    }

    #[test]
    fn duplicate_is_replay_fail() {
        let mut w = ReplayWindow::new(128);
        w.add(10);
        assert!(matches!(w.check(10), Err(Error::ReplayFail)));
        assert!(w.check(9).is_ok());
        assert!(w.check(11).is_ok());
    }

    #[test]
    fn older_than_window_is_replay_old() {
        let mut w = ReplayWindow::new(128);
        w.add(500);
        assert!(matches!(w.check(500 - 128), Err(Error::ReplayOld)));
        assert!(w.check(500 - 127).is_ok());
    }

    #[test]
    fn out_of_order_within_window() {
        let mut w = ReplayWindow::new(128);
        w.add(100);
        w.add(105);
        assert!(w.check(103).is_ok());
        w.add(103);
        assert!(matches!(w.check(103), Err(Error::ReplayFail)));
        assert!(matches!(w.check(105), Err(Error::ReplayFail)));
        assert!(matches!(w.check(100), Err(Error::ReplayFail)));
        assert!(w.check(104).is_ok());
    }

    #[test]
    fn shift_across_word_boundary() {
        let mut w = ReplayWindow::new(128);
        for i in 0..70 {
            w.add(i);
        }
        for i in 0..70 {
            assert!(matches!(w.check(i), Err(Error::ReplayFail)), "index {i}");
        }
        assert!(w.check(70).is_ok());
    }

    #[test]
    fn large_jump_clears_history() {
        let mut w = ReplayWindow::new(64);
        w.add(5);
        w.add(10_000);
        assert!(matches!(w.check(10_000), Err(Error::ReplayFail)));
        assert!(w.check(10_000 - 63).is_ok());
        assert!(matches!(w.check(5), Err(Error::ReplayOld)));
    }

    #[test]
    fn size_is_rounded_to_whole_words() {
        let w = ReplayWindow::new(100);
        assert_eq!(w.bits, 128);
        let w = ReplayWindow::new(0);
        assert_eq!(w.bits, 64);
    }
}
