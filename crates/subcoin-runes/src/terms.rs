use serde::{Deserialize, Serialize};

/// Open mint policy of an etched rune.
///
/// `height` bounds are absolute block heights, `offset` bounds are relative to the etching
/// block. Starts are inclusive, ends are exclusive.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Terms {
    pub amount: Option<u128>,
    pub cap: Option<u128>,
    pub height: (Option<u64>, Option<u64>),
    pub offset: (Option<u64>, Option<u64>),
}

impl Terms {
    /// First height at which minting is open, the later of both start bounds.
    pub fn start(&self, etched_at: u64) -> Option<u64> {
        let relative = self
            .offset
            .0
            .map(|offset| etched_at.saturating_add(offset));

        self.height.0.max(relative)
    }

    /// First height at which minting is closed, the later of both end bounds.
    pub fn end(&self, etched_at: u64) -> Option<u64> {
        let relative = self
            .offset
            .1
            .map(|offset| etched_at.saturating_add(offset));

        self.height.1.max(relative)
    }

    /// Whether a mint at `height` falls inside the mint window.
    pub fn is_open(&self, etched_at: u64, height: u64) -> bool {
        let started = self.start(etched_at).is_none_or(|start| height >= start);
        let ended = self.end(etched_at).is_some_and(|end| height >= end);

        started && !ended
    }
}
