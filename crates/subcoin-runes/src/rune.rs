//! Rune names.
//!
//! A rune is a `u128` whose string form is a bijective base-26 numeral over `A..=Z`, so `0` is
//! `A`, `25` is `Z` and `26` is `AA`.

use crate::constants::{SUBSIDY_HALVING_INTERVAL, first_rune_height};
use bitcoin::Network;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Rune parsing error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("invalid character `{0}`")]
    Character(char),
    #[error("name is empty")]
    Empty,
    #[error("name out of range")]
    Range,
}

/// First value of the range set aside for runes etched without a name, `AAAAAAAAAAAAAAAAAAAAAAAAAAA`.
pub const RESERVED: u128 = 6402364363415443603228541259936211926;

/// Value of the smallest rune of each length, `STEPS[n]` being the value of `n + 1` letters `A`.
const STEPS: [u128; 28] = [
    0,
    26,
    702,
    18278,
    475254,
    12356630,
    321272406,
    8353082582,
    217180147158,
    5646683826134,
    146813779479510,
    3817158266467286,
    99246114928149462,
    2580398988131886038,
    67090373691429037014,
    1744349715977154962390,
    45353092615406029022166,
    1179180408000556754576342,
    30658690608014475618984918,
    797125955808376366093607894,
    20725274851017785518433805270,
    538857146126462423479278937046,
    14010285799288023010461252363222,
    364267430781488598271992561443798,
    9470953200318703555071806597538774,
    246244783208286292431866971536008150,
    6402364363415443603228541259936211926,
    166461473448801533683942072758341510102,
];

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Rune(pub u128);

impl Rune {
    /// Returns the smallest rune that may be etched in a block at `height`.
    ///
    /// Before activation only names of at least 13 letters are open. After activation one letter
    /// unlocks every `SUBSIDY_HALVING_INTERVAL / 12` blocks, interpolating linearly in between,
    /// until every name is open at the next halving.
    pub fn minimum_at_height(network: Network, height: u32) -> Self {
        const INTERVAL: u32 = SUBSIDY_HALVING_INTERVAL / 12;

        let offset = height.saturating_add(1);
        let start = first_rune_height(network);
        let end = start + SUBSIDY_HALVING_INTERVAL;

        if offset < start {
            return Self(STEPS[12]);
        }

        if offset >= end {
            return Self(0);
        }

        let progress = offset - start;
        let length = 12 - progress / INTERVAL;

        let end = STEPS[length as usize - 1];
        let start = STEPS[length as usize];
        let remainder = u128::from(progress % INTERVAL);

        Self(start - ((start - end) * remainder / u128::from(INTERVAL)))
    }

    /// Returns the name assigned to an unnamed etching in transaction `tx` of block `block`.
    pub fn reserved(block: u64, tx: u32) -> Self {
        Self(RESERVED + ((u128::from(block) << 32) | u128::from(tx)))
    }

    pub fn is_reserved(self) -> bool {
        self.0 >= RESERVED
    }

    /// Bytes an etcher must push in a taproot witness to commit to this rune.
    ///
    /// Little-endian value with trailing zero bytes removed.
    pub fn commitment(self) -> Vec<u8> {
        let bytes = self.0.to_le_bytes();

        let mut end = bytes.len();
        while end > 0 && bytes[end - 1] == 0 {
            end -= 1;
        }

        bytes[..end].to_vec()
    }
}

impl fmt::Display for Rune {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut n = self.0;
        if n == u128::MAX {
            return write!(f, "BCGDENLQRQWDSLRUGSNLBTMFIJAV");
        }

        n += 1;
        let mut symbol = String::new();
        while n > 0 {
            symbol.push(char::from(b'A' + ((n - 1) % 26) as u8));
            n = (n - 1) / 26;
        }

        for c in symbol.chars().rev() {
            write!(f, "{c}")?;
        }

        Ok(())
    }
}

impl FromStr for Rune {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(Error::Empty);
        }

        let mut x = 0u128;
        for (i, c) in s.chars().enumerate() {
            if i > 0 {
                x = x.checked_add(1).ok_or(Error::Range)?;
            }
            x = x.checked_mul(26).ok_or(Error::Range)?;
            match c {
                'A'..='Z' => {
                    x = x.checked_add(c as u128 - 'A' as u128).ok_or(Error::Range)?;
                }
                _ => return Err(Error::Character(c)),
            }
        }

        Ok(Self(x))
    }
}

impl From<Rune> for String {
    fn from(rune: Rune) -> Self {
        rune.to_string()
    }
}

impl TryFrom<String> for Rune {
    type Error = Error;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}
