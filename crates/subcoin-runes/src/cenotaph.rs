use crate::{Flaw, Rune, RuneId};
use serde::{Deserialize, Serialize};

/// A malformed runestone.
///
/// Runes sent to a cenotaph are burned. An etching is still recorded so its name cannot be
/// reused, and a mint still counts against the cap.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cenotaph {
    pub flaws: Vec<Flaw>,
    pub rune: Option<Rune>,
    pub mint: Option<RuneId>,
}
