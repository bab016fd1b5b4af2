//! Runestone construction from a user supplied description.
//!
//! Unlike [`Runestone::encipher`], building validates the description up front so that the
//! resulting script never deciphers as a cenotaph because of its etching.

use crate::constants::MAX_DIVISIBILITY;
use crate::spaced_rune;
use crate::{Edict, Etching, Rune, RuneId, Runestone, SpacedRune, Terms};
use bitcoin::ScriptBuf;
use serde::{Deserialize, Serialize};

/// Error building a runestone.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("symbol `{0}` must be exactly one code point")]
    Symbol(String),
    #[error("divisibility {0} exceeds maximum {max}", max = MAX_DIVISIBILITY)]
    Divisibility(u8),
    #[error("premine plus cap times amount overflows u128")]
    SupplyOverflow,
    #[error("invalid rune name: {0}")]
    Rune(#[from] spaced_rune::Error),
}

/// Inclusive start and exclusive end of a mint window.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RangeSpec {
    pub start: Option<u64>,
    pub end: Option<u64>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TermsSpec {
    pub amount: Option<u128>,
    pub cap: Option<u128>,
    pub height: Option<RangeSpec>,
    pub offset: Option<RangeSpec>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EtchingSpec {
    /// Rune name, `.` or `•` may be used as spacers.
    pub rune: Option<String>,
    pub divisibility: Option<u8>,
    pub premine: Option<u128>,
    pub symbol: Option<String>,
    pub terms: Option<TermsSpec>,
    pub turbo: bool,
}

/// Description of a runestone to encode.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunestoneSpec {
    pub mint: Option<RuneId>,
    pub pointer: Option<u32>,
    pub etching: Option<EtchingSpec>,
    pub edicts: Vec<Edict>,
}

/// An encoded runestone together with the commitment its etching requires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedRunestone {
    pub script: ScriptBuf,
    /// Bytes to push in the commit transaction's tapscript, present for named etchings.
    pub commitment: Option<Vec<u8>>,
}

impl EtchingSpec {
    fn to_etching(&self) -> Result<Etching, Error> {
        let spaced = self
            .rune
            .as_deref()
            .map(str::parse::<SpacedRune>)
            .transpose()?;

        let symbol = match &self.symbol {
            Some(symbol) => {
                let mut chars = symbol.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Some(c),
                    _ => return Err(Error::Symbol(symbol.clone())),
                }
            }
            None => None,
        };

        if let Some(divisibility) = self.divisibility.filter(|d| *d > MAX_DIVISIBILITY) {
            return Err(Error::Divisibility(divisibility));
        }

        let terms = self.terms.map(|terms| {
            let height = terms.height.unwrap_or_default();
            let offset = terms.offset.unwrap_or_default();
            Terms {
                amount: terms.amount,
                cap: terms.cap,
                height: (height.start, height.end),
                offset: (offset.start, offset.end),
            }
        });

        let etching = Etching {
            divisibility: self.divisibility,
            premine: self.premine,
            rune: spaced.map(|spaced| spaced.rune),
            spacers: spaced
                .map(|spaced| spaced.spacers)
                .filter(|spacers| *spacers != 0),
            symbol,
            terms,
            turbo: self.turbo,
        };

        if etching.supply().is_none() {
            return Err(Error::SupplyOverflow);
        }

        Ok(etching)
    }
}

impl RunestoneSpec {
    /// Validates the description and enciphers it.
    pub fn encode(&self) -> Result<EncodedRunestone, Error> {
        let etching = self
            .etching
            .as_ref()
            .map(EtchingSpec::to_etching)
            .transpose()?;

        let commitment = etching
            .and_then(|etching| etching.rune)
            .map(Rune::commitment);

        let runestone = Runestone {
            edicts: self.edicts.clone(),
            etching,
            mint: self.mint,
            pointer: self.pointer,
        };

        Ok(EncodedRunestone {
            script: runestone.encipher(),
            commitment,
        })
    }
}
