//! Runestone protocol primitives.
//!
//! This crate implements the binary codec for runestones embedded in `OP_RETURN` outputs:
//! - LEB128 varints and the tagged field layout
//! - Rune names, rune ids and spaced runes
//! - Deciphering a transaction into a [`Runestone`] or a [`Cenotaph`]
//! - Enciphering a [`Runestone`] back into a script, see also [`RunestoneSpec`]

mod artifact;
mod builder;
mod cenotaph;
mod constants;
mod edict;
mod etching;
mod flag;
mod flaw;
mod message;
pub mod rune;
pub mod rune_id;
mod runestone;
pub mod spaced_rune;
mod tag;
mod terms;
pub mod varint;

pub use artifact::Artifact;
pub use builder::{EncodedRunestone, EtchingSpec, RangeSpec, RunestoneSpec, TermsSpec};
pub use cenotaph::Cenotaph;
pub use constants::{
    COMMIT_CONFIRMATIONS, MAGIC_NUMBER, MAX_DIVISIBILITY, MAX_SCRIPT_ELEMENT_SIZE, MAX_SPACERS,
    SUBSIDY_HALVING_INTERVAL, first_rune_height,
};
pub use edict::Edict;
pub use etching::Etching;
pub use flag::Flags;
pub use flaw::Flaw;
pub use rune::Rune;
pub use rune_id::RuneId;
pub use runestone::Runestone;
pub use spaced_rune::SpacedRune;
pub use tag::Tag;
pub use terms::Terms;

/// Builder error, re-exported for callers of [`RunestoneSpec::encode`].
pub use builder::Error as BuilderError;
