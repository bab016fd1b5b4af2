use crate::rune::{self, Rune};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Spaced rune parsing error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("invalid character `{0}`")]
    Character(char),
    #[error("double spacer")]
    DoubleSpacer,
    #[error("leading spacer")]
    LeadingSpacer,
    #[error("trailing spacer")]
    TrailingSpacer,
    #[error("invalid rune: {0}")]
    Rune(#[from] rune::Error),
}

/// A rune with display spacers.
///
/// Bit `i` of `spacers` places a `•` after letter `i`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct SpacedRune {
    pub rune: Rune,
    pub spacers: u32,
}

impl SpacedRune {
    pub fn new(rune: Rune, spacers: u32) -> Self {
        Self { rune, spacers }
    }
}

impl FromStr for SpacedRune {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut rune = String::new();
        let mut spacers = 0u32;

        for c in s.chars() {
            match c {
                'A'..='Z' => rune.push(c),
                '.' | '•' => {
                    if rune.is_empty() {
                        return Err(Error::LeadingSpacer);
                    }

                    let flag = u32::try_from(rune.len() - 1)
                        .ok()
                        .and_then(|shift| 1u32.checked_shl(shift))
                        .ok_or(Error::Rune(rune::Error::Range))?;

                    if spacers & flag != 0 {
                        return Err(Error::DoubleSpacer);
                    }

                    spacers |= flag;
                }
                _ => return Err(Error::Character(c)),
            }
        }

        if spacers != 0 && (32 - spacers.leading_zeros()) as usize >= rune.len() {
            return Err(Error::TrailingSpacer);
        }

        Ok(Self {
            rune: rune.parse()?,
            spacers,
        })
    }
}

impl fmt::Display for SpacedRune {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let rune = self.rune.to_string();

        for (i, c) in rune.chars().enumerate() {
            write!(f, "{c}")?;

            if i < rune.len() - 1 && self.spacers & (1 << i) != 0 {
                write!(f, "•")?;
            }
        }

        Ok(())
    }
}

impl From<SpacedRune> for String {
    fn from(spaced: SpacedRune) -> Self {
        spaced.to_string()
    }
}

impl TryFrom<String> for SpacedRune {
    type Error = Error;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}
