use crate::RuneId;
use bitcoin::Transaction;
use serde::{Deserialize, Serialize};

/// Transfer of `amount` of rune `id` to output `output`.
///
/// An `output` equal to the number of transaction outputs spreads the amount over every
/// non-`OP_RETURN` output.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edict {
    pub id: RuneId,
    pub amount: u128,
    pub output: u32,
}

impl Edict {
    pub fn from_integers(tx: &Transaction, id: RuneId, amount: u128, output: u128) -> Option<Self> {
        let output = u32::try_from(output).ok()?;

        if usize::try_from(output).ok()? > tx.output.len() {
            return None;
        }

        Some(Self { id, amount, output })
    }
}
