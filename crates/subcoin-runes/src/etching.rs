use crate::{Rune, Terms};
use serde::{Deserialize, Serialize};

/// Creation of a new rune.
///
/// A missing `rune` asks the indexer to assign a reserved name.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Etching {
    pub divisibility: Option<u8>,
    pub premine: Option<u128>,
    pub rune: Option<Rune>,
    pub spacers: Option<u32>,
    pub symbol: Option<char>,
    pub terms: Option<Terms>,
    pub turbo: bool,
}

impl Etching {
    /// Maximum supply, `premine + cap * amount`, or `None` on overflow.
    pub fn supply(&self) -> Option<u128> {
        let premine = self.premine.unwrap_or_default();
        let cap = self.terms.and_then(|terms| terms.cap).unwrap_or_default();
        let amount = self.terms.and_then(|terms| terms.amount).unwrap_or_default();

        premine.checked_add(cap.checked_mul(amount)?)
    }
}
