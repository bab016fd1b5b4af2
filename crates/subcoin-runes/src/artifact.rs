use crate::{Cenotaph, Rune, RuneId, Runestone};
use serde::{Deserialize, Serialize};

/// Outcome of deciphering a transaction that carries a runestone output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Artifact {
    Cenotaph(Cenotaph),
    Runestone(Runestone),
}

impl Artifact {
    pub fn mint(&self) -> Option<RuneId> {
        match self {
            Self::Cenotaph(cenotaph) => cenotaph.mint,
            Self::Runestone(runestone) => runestone.mint,
        }
    }

    /// Rune named by the etching, if the artifact etches one.
    ///
    /// `Some(None)` is an etching without a name. A cenotaph only etches when its name survived.
    pub fn etching(&self) -> Option<Option<Rune>> {
        match self {
            Self::Cenotaph(cenotaph) => cenotaph.rune.map(Some),
            Self::Runestone(runestone) => runestone.etching.map(|etching| etching.rune),
        }
    }
}
