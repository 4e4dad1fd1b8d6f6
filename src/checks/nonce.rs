use std::collections::VecDeque;

use crate::error::Error;

/// A bounded, FIFO-evicting set over the `0..=255` sequence space, used to
/// deduplicate retransmitted `ServerMessage` packets (spec §3, §4.2).
#[derive(Debug, Clone)]
pub struct NonceCheck {
    window: usize,
    seen: VecDeque<u8>,
    // A 256-bit presence bitmap, mirroring `seen`, so membership tests
    // don't need a linear scan of `seen`.
    present: [bool; 256],
}

impl NonceCheck {
    /// Creates a new `NonceCheck` that remembers the most recent `window`
    /// sequences.
    ///
    /// Fails with [`Error::InvalidNonceWindow`] if `window` is `0` or
    /// greater than `255`.
    pub fn new(window: usize) -> Result<Self, Error> {
        if window == 0 || window > 255 {
            return Err(Error::InvalidNonceWindow(window));
        }
        Ok(Self {
            window,
            seen: VecDeque::with_capacity(window),
            present: [false; 256],
        })
    }

    /// Records `seq` as seen, returning `true` if it had not been seen
    /// within the current window (i.e. this is a fresh message), or
    /// `false` if it is a duplicate.
    ///
    /// Acknowledgement is the caller's responsibility regardless of the
    /// return value — §4.2 requires an ack to be sent every time.
    pub fn insert(&mut self, seq: u8) -> bool {
        if self.present[seq as usize] {
            return false;
        }

        if self.seen.len() >= self.window {
            if let Some(evicted) = self.seen.pop_front() {
                self.present[evicted as usize] = false;
            }
        }
        self.seen.push_back(seq);
        self.present[seq as usize] = true;
        true
    }

    /// Clears all recorded sequences. Called on reconnect, since the
    /// dedup window is scoped to one authenticated session (spec §3).
    pub fn reset(&mut self) {
        self.seen.clear();
        self.present = [false; 256];
    }

    /// The configured window size.
    pub fn window(&self) -> usize {
        self.window
    }
}
