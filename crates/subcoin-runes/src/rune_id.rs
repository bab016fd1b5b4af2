use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

/// Rune id parsing error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("missing `:` separator")]
    Separator,
    #[error("invalid block height: {0}")]
    Block(ParseIntError),
    #[error("invalid transaction index: {0}")]
    Transaction(ParseIntError),
    #[error("transaction index must be 0 in block 0")]
    Genesis,
}

/// Location of the transaction that etched a rune, `block:tx`.
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(into = "String", try_from = "String")]
pub struct RuneId {
    pub block: u64,
    pub tx: u32,
}

impl RuneId {
    /// Returns `None` for ids in block 0 with a non-zero transaction index.
    pub fn new(block: u64, tx: u32) -> Option<Self> {
        let id = Self { block, tx };

        if id.block == 0 && id.tx > 0 {
            return None;
        }

        Some(id)
    }

    /// Delta of `next` against `self`, as stored in a runestone body.
    ///
    /// The transaction delta is only relative when both ids are in the same block.
    pub fn delta(self, next: Self) -> Option<(u128, u128)> {
        let block = next.block.checked_sub(self.block)?;

        let tx = if block == 0 {
            next.tx.checked_sub(self.tx)?
        } else {
            next.tx
        };

        Some((block.into(), tx.into()))
    }

    /// Inverse of [`Self::delta`].
    pub fn next(self, block: u128, tx: u128) -> Option<Self> {
        Self::new(
            self.block.checked_add(block.try_into().ok()?)?,
            if block == 0 {
                self.tx.checked_add(tx.try_into().ok()?)?
            } else {
                tx.try_into().ok()?
            },
        )
    }
}

impl fmt::Display for RuneId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}", self.block, self.tx)
    }
}

impl FromStr for RuneId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (block, tx) = s.split_once(':').ok_or(Error::Separator)?;

        Self::new(
            block.parse().map_err(Error::Block)?,
            tx.parse().map_err(Error::Transaction)?,
        )
        .ok_or(Error::Genesis)
    }
}

impl From<RuneId> for String {
    fn from(id: RuneId) -> Self {
        id.to_string()
    }
}

impl TryFrom<String> for RuneId {
    type Error = Error;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_rejects_block_zero_transactions() {
        assert_eq!(RuneId::new(0, 0), Some(RuneId { block: 0, tx: 0 }));
        assert_eq!(RuneId::new(0, 1), None);
        assert_eq!(RuneId::new(1, 0), Some(RuneId { block: 1, tx: 0 }));
    }

    #[test]
    fn delta() {
        let mut ids = vec![
            RuneId { block: 4, tx: 2 },
            RuneId { block: 1, tx: 2 },
            RuneId { block: 1, tx: 1 },
            RuneId { block: 3, tx: 1 },
            RuneId { block: 2, tx: 0 },
        ];
        ids.sort();

        let mut previous = RuneId::default();
        let mut deltas = Vec::new();
        for id in &ids {
            deltas.push(previous.delta(*id).unwrap());
            previous = *id;
        }

        assert_eq!(deltas, [(1, 1), (0, 1), (1, 0), (1, 1), (1, 2)]);

        let mut previous = RuneId::default();
        let mut decoded = Vec::new();
        for (block, tx) in deltas {
            let next = previous.next(block, tx).unwrap();
            decoded.push(next);
            previous = next;
        }

        assert_eq!(decoded, ids);
    }

    #[test]
    fn delta_rejects_unsorted_ids() {
        let id = RuneId { block: 2, tx: 5 };
        assert_eq!(id.delta(RuneId { block: 1, tx: 9 }), None);
        assert_eq!(id.delta(RuneId { block: 2, tx: 4 }), None);
    }

    #[test]
    fn next_checks_ranges() {
        let id = RuneId { block: u64::MAX, tx: u32::MAX };
        assert_eq!(id.next(1, 0), None);
        assert_eq!(id.next(0, 1), None);
        assert_eq!(RuneId::default().next(0, 1), None);
        assert_eq!(RuneId::default().next(1, u128::from(u32::MAX) + 1), None);
    }

    #[test]
    fn display_and_parse() {
        let id = RuneId { block: 840_000, tx: 1 };
        assert_eq!(id.to_string(), "840000:1");
        assert_eq!("840000:1".parse::<RuneId>(), Ok(id));
        assert_eq!("840000".parse::<RuneId>(), Err(Error::Separator));
        assert!(matches!("x:1".parse::<RuneId>(), Err(Error::Block(_))));
        assert!(matches!("1:x".parse::<RuneId>(), Err(Error::Transaction(_))));
        assert_eq!("0:1".parse::<RuneId>(), Err(Error::Genesis));
    }

    #[test]
    fn serde_uses_display_form() {
        let id = RuneId { block: 1, tx: 2 };
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"1:2\"");
        assert_eq!(serde_json::from_str::<RuneId>("\"1:2\"").unwrap(), id);
    }
}
